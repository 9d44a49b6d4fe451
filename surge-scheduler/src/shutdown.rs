//! Stop signal shared between the dispatcher and its callers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cloneable handle that stops new iteration starts
///
/// In-flight iterations are never aborted; they run through their cleanup.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(4);
        Self {
            sender,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        // No receivers simply means the dispatcher is not running yet
        let _ = self.sender.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
