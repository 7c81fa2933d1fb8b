//! Client-side persistence.
//!
//! The marketplace keeps a handful of string values in browser storage: the session in
//! `localStorage` and in-flight checkout data in `sessionStorage`. [`KeyValueStorage`]
//! abstracts over those so the stores also run natively on [`MemoryStorage`].

use futures::{channel::mpsc, Stream};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    pin::Pin,
    task::{Context, Poll},
};

mod memory;
#[cfg(target_family = "wasm")]
mod wasm_js;

pub use memory::MemoryStorage;
#[cfg(target_family = "wasm")]
pub use wasm_js::{LocalStorage, SessionStorage};

/// `localStorage` key holding the bearer token.
pub const KEY_AUTH_TOKEN: &str = "authToken";
/// `localStorage` key holding the signed-in user's role.
pub const KEY_USER_ROLE: &str = "userRole";
/// `localStorage` key holding the signed-in user as JSON.
pub const KEY_USER: &str = "user";
/// `sessionStorage` key holding a single-service booking awaiting payment.
pub const KEY_PENDING_BOOKING: &str = "pendingBooking";
/// `sessionStorage` key holding the id of the cart's payment intent.
pub const KEY_CART_PAYMENT_INTENT_ID: &str = "cartPaymentIntentId";

/// Errors raised by a storage backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The backend is missing or refused the operation (quota, privacy mode).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    /// A stored JSON value could not be (de)serialized.
    #[error("Stored value for {key:?} is malformed: {message}")]
    Malformed { key: String, message: String },
}

/// A string key-value store with browser `Storage` semantics.
pub trait KeyValueStorage: Send {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Reads a JSON value. A malformed value is reported, not silently dropped.
pub fn get_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Malformed {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Writes a value as JSON.
pub fn set_json<T: Serialize>(
    storage: &mut dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Malformed {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    storage.set(key, &raw)
}

/// A change made to shared storage by another tab.
///
/// Mirrors the DOM `StorageEvent`: `key` is `None` when the whole storage was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// Whether this event removed `key` (directly or by clearing storage).
    pub fn removes(&self, key: &str) -> bool {
        match &self.key {
            Some(changed) => changed == key && self.new_value.is_none(),
            None => true,
        }
    }
}

/// Stream of [`StorageEvent`]s raised by other tabs.
///
/// Dropping it unsubscribes.
pub struct StorageEvents {
    receiver: mpsc::UnboundedReceiver<StorageEvent>,
    #[cfg(target_family = "wasm")]
    _listener: Option<gloo_events::EventListener>,
}

impl StorageEvents {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<StorageEvent>) -> Self {
        Self {
            receiver,
            #[cfg(target_family = "wasm")]
            _listener: None,
        }
    }

    #[cfg(target_family = "wasm")]
    pub(crate) fn with_listener(
        receiver: mpsc::UnboundedReceiver<StorageEvent>,
        listener: gloo_events::EventListener,
    ) -> Self {
        Self {
            receiver,
            _listener: Some(listener),
        }
    }
}

impl std::fmt::Debug for StorageEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEvents").finish_non_exhaustive()
    }
}

impl Stream for StorageEvents {
    type Item = StorageEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
