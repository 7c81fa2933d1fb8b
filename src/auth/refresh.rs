use crate::util::{sleep::sleep, spawn::spawn_local};
use futures::future::{abortable, AbortHandle};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Periodic token-refresh task.
///
/// Runs `tick` every interval until the tick returns `false`, [`RefreshTimer::cancel`] is
/// called, or the timer is dropped.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    handle: Option<AbortHandle>,
    running: Arc<AtomicBool>,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the timer, replacing any previous run.
    ///
    /// # Panics
    ///
    /// On native targets, when called outside a `tokio::task::LocalSet`.
    pub fn start<F, Fut>(&mut self, interval: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.cancel();

        let running = Arc::new(AtomicBool::new(true));
        let running_task = running.clone();
        let (task, handle) = abortable(async move {
            loop {
                sleep(interval).await;
                if !tick().await {
                    break;
                }
            }
            running_task.store(false, Ordering::SeqCst);
        });

        self.handle = Some(handle);
        self.running = running;
        spawn_local(async move {
            let _ = task.await;
        });
    }

    /// Stops the timer. A tick already in flight is dropped at its next await point.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
