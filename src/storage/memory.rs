//! In-memory storage shared between simulated tabs.

use super::{KeyValueStorage, StorageError, StorageEvent, StorageEvents};
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

#[derive(Debug, Default)]
struct Shared {
    entries: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<(u64, mpsc::UnboundedSender<StorageEvent>)>>,
    next_tab: AtomicU64,
}

/// Implementation of [`KeyValueStorage`] backed by a process-local map.
///
/// Clones are the same tab. [`MemoryStorage::new_tab`] opens another view onto the same
/// entries; writes made through one tab are delivered to every other tab's
/// [`MemoryStorage::events`] stream, the way browsers deliver `storage` events.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
    tab: u64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates empty storage with a single tab.
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        let tab = shared.next_tab.fetch_add(1, Ordering::SeqCst);
        Self { shared, tab }
    }

    /// Opens another tab onto the same entries.
    pub fn new_tab(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            tab: self.shared.next_tab.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Subscribes to changes made by other tabs.
    pub fn events(&self) -> StorageEvents {
        let (sender, receiver) = mpsc::unbounded();
        self.shared.subscribers.lock().push((self.tab, sender));
        StorageEvents::new(receiver)
    }

    /// Removes every entry, notifying other tabs with a `key: None` event.
    pub fn clear(&mut self) {
        self.shared.entries.lock().clear();
        self.notify(StorageEvent {
            key: None,
            old_value: None,
            new_value: None,
        });
    }

    fn notify(&self, event: StorageEvent) {
        self.shared.subscribers.lock().retain(|(tab, sender)| {
            if *tab == self.tab {
                return !sender.is_closed();
            }
            sender.unbounded_send(event.clone()).is_ok()
        });
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.shared.entries.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let old_value = self
            .shared
            .entries
            .lock()
            .insert(key.to_string(), value.to_string());
        if old_value.as_deref() != Some(value) {
            self.notify(StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: Some(value.to_string()),
            });
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let old_value = self.shared.entries.lock().remove(key);
        if old_value.is_some() {
            self.notify(StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: None,
            });
        }
        Ok(())
    }
}
