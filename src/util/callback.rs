//! Change listeners registered on the stores.

use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) type ListenerInner<T> = Box<dyn FnMut(&T) + Send>;

/// A callback executed with the new state every time a store changes.
///
/// # Usage
/// ```
/// use caicos_client::auth::{AuthState, OnChange};
///
/// let on_change = OnChange::<AuthState>::from(|state: &AuthState| {
///     // Re-render the header
///     let _ = state.is_authenticated;
/// });
/// ```
pub struct OnChange<T>(pub(crate) Arc<Mutex<ListenerInner<T>>>);

impl<T> Clone for OnChange<T> {
    fn clone(&self) -> Self {
        OnChange(self.0.clone())
    }
}

impl<T, F> From<F> for OnChange<T>
where
    F: FnMut(&T) + Send + 'static,
{
    fn from(f: F) -> Self {
        OnChange(Arc::new(Mutex::new(Box::new(f))))
    }
}

impl<T> OnChange<T> {
    pub(crate) fn call(&self, value: &T) {
        (self.0.lock())(value);
    }
}

/// The listeners of one store.
pub(crate) struct Listeners<T>(Mutex<Vec<OnChange<T>>>);

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Listeners(Mutex::new(Vec::new()))
    }
}

impl<T> Listeners<T> {
    pub(crate) fn push(&self, listener: OnChange<T>) {
        self.0.lock().push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Calls every listener. The list is snapshotted first, so a listener may register
    /// another without deadlocking.
    pub(crate) fn notify(&self, value: &T) {
        let listeners = self.0.lock().clone();
        for listener in listeners {
            listener.call(value);
        }
    }
}
