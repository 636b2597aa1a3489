//! Shutdown coordination for background tasks.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

/// Coordinates graceful termination across spawned tasks.
///
/// Tasks call `wait()` inside a `tokio::select!` arm; any holder may call
/// `shutdown()` to release all waiters. The terminated flag stays set so
/// late subscribers return immediately.
#[derive(Clone)]
pub struct Shutdown {
    notify: Arc<Notify>,
    terminated: Arc<AtomicBool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// signal all waiters to terminate
    pub fn shutdown(&self) {
        self.terminated.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// wait until shutdown is signalled
    pub async fn wait(&self) {
        if self.terminated.load(Ordering::Relaxed) {
            return;
        }
        self.notify.notified().await;
    }

    /// check if shutdown has been signalled
    #[allow(unused)]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Relaxed)
    }
}
