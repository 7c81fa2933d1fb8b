//! Browser `localStorage` and `sessionStorage` backends.

use super::{KeyValueStorage, StorageError, StorageEvent, StorageEvents};
use futures::channel::mpsc;
use gloo_events::EventListener;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Storage;

#[derive(Debug, Clone, Copy)]
enum Area {
    Local,
    Session,
}

impl Area {
    fn storage(self) -> Result<Storage, StorageError> {
        let window = gloo_utils::window();
        let storage = match self {
            Area::Local => window.local_storage(),
            Area::Session => window.session_storage(),
        };
        match storage {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(StorageError::Unavailable(format!("{self:?} storage is disabled"))),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Could not open {self:?} storage: {e:?}");
                Err(js_error(e))
            }
        }
    }

    fn get(self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(js_error)
    }

    fn set(self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(self, key: &str) -> Result<(), StorageError> {
        self.storage()?.remove_item(key).map_err(js_error)
    }

    /// Listens for `storage` events raised by other tabs on this area.
    fn events(self) -> StorageEvents {
        let (sender, receiver) = mpsc::unbounded();
        let target = self.storage().ok();
        let listener = EventListener::new(&gloo_utils::window(), "storage", move |event| {
            let Some(event) = event.dyn_ref::<web_sys::StorageEvent>() else {
                return;
            };
            // `storage` fires for both areas; keep the ones for ours.
            let same_area = match (&target, event.storage_area()) {
                (Some(target), Some(area)) => {
                    let target: &JsValue = target.as_ref();
                    let area: &JsValue = area.as_ref();
                    target == area
                }
                _ => true,
            };
            if same_area {
                let _ = sender.unbounded_send(StorageEvent {
                    key: event.key(),
                    old_value: event.old_value(),
                    new_value: event.new_value(),
                });
            }
        });
        StorageEvents::with_listener(receiver, listener)
    }
}

fn js_error(value: JsValue) -> StorageError {
    StorageError::Unavailable(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

/// Implementation of [`KeyValueStorage`] on `window.localStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    /// Subscribes to `localStorage` changes made by other tabs.
    pub fn events(&self) -> StorageEvents {
        Area::Local.events()
    }
}

impl KeyValueStorage for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Area::Local.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        Area::Local.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        Area::Local.remove(key)
    }
}

/// Implementation of [`KeyValueStorage`] on `window.sessionStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStorage;

impl SessionStorage {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStorage for SessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Area::Session.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        Area::Session.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        Area::Session.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_storage() {
        let mut storage = LocalStorage;
        storage.set("caicos-test", "value").unwrap();
        assert_eq!(storage.get("caicos-test").unwrap(), Some("value".to_string()));
        storage.remove("caicos-test").unwrap();
        assert_eq!(storage.get("caicos-test").unwrap(), None);
    }

    #[wasm_bindgen_test]
    fn test_session_storage_is_separate() {
        let mut local = LocalStorage;
        let mut session = SessionStorage;
        session.set("caicos-test", "session").unwrap();
        assert_eq!(local.get("caicos-test").unwrap(), None);
        session.remove("caicos-test").unwrap();
        local.remove("caicos-test").unwrap();
    }
}
