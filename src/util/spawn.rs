use std::future::Future;

/// Runs `future` on the current thread's executor.
///
/// # Panics
///
/// On native targets, when called outside a `tokio::task::LocalSet`.
pub(crate) fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(target_family = "wasm")]
    wasm_bindgen_futures::spawn_local(future);
    #[cfg(not(target_family = "wasm"))]
    {
        tokio::task::spawn_local(future);
    }
}
