use std::time::Duration;

/// Waits for `duration` without blocking the executor.
pub(crate) async fn sleep(duration: Duration) {
    #[cfg(target_family = "wasm")]
    gloo_timers::future::sleep(duration).await;
    #[cfg(not(target_family = "wasm"))]
    tokio::time::sleep(duration).await;
}
