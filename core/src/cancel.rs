//! Run cancellation
//!
//! Cancellation is a level-triggered state rather than a one-shot message, so
//! a worker that subscribes after the signal was raised still observes it.
//! The state only escalates: `Running → StopAfterLevel → Abandon`.

use std::sync::Arc;
use tokio::sync::watch;

/// Requested cancellation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CancelMode {
    /// No cancellation requested
    #[default]
    Running,
    /// Let the current level drain, then skip the remaining levels
    StopAfterLevel,
    /// Abandon in-flight workers immediately
    Abandon,
}

/// Cancellation entry point shared between the orchestrator and its caller
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<CancelMode>>,
}

impl CancelHandle {
    /// Create a handle in the `Running` state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CancelMode::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Stop once the current level has drained
    pub fn stop_after_level(&self) {
        self.escalate(CancelMode::StopAfterLevel);
    }

    /// Abandon in-flight workers of the current level
    pub fn abandon(&self) {
        self.escalate(CancelMode::Abandon);
    }

    /// Current mode
    pub fn mode(&self) -> CancelMode {
        *self.tx.borrow()
    }

    /// Whether any cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.mode() != CancelMode::Running
    }

    /// Subscribe a worker or waiter
    pub fn subscribe(&self) -> CancelReceiver {
        CancelReceiver {
            rx: self.tx.subscribe(),
        }
    }

    fn escalate(&self, mode: CancelMode) {
        self.tx.send_if_modified(|current| {
            if mode > *current {
                *current = mode;
                true
            } else {
                false
            }
        });
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`CancelHandle`]
#[derive(Debug, Clone)]
pub struct CancelReceiver {
    rx: watch::Receiver<CancelMode>,
}

impl CancelReceiver {
    /// Current mode
    pub fn mode(&self) -> CancelMode {
        *self.rx.borrow()
    }

    /// Resolve once the mode reaches at least `mode`
    ///
    /// Never resolves if the handle is dropped first.
    pub async fn reached(&mut self, mode: CancelMode) {
        loop {
            if *self.rx.borrow_and_update() >= mode {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Resolve once in-flight work must be abandoned
    pub async fn abandoned(&mut self) {
        self.reached(CancelMode::Abandon).await;
    }

    /// Resolve once any cancellation is requested
    pub async fn cancelled(&mut self) {
        self.reached(CancelMode::StopAfterLevel).await;
    }
}
