//! No-op key listener for platforms without a system capture backend.
//!
//! Exists so the crate (and binary) compile on targets other than macOS and
//! Windows without pulling in their platform dependencies. Never emits
//! symbols.

use crate::capture::types::Symbol;
use crate::capture::{CaptureError, CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A key listener that never emits events.
pub struct NoopKeyListener {
    sender: Sender<Symbol>,
    receiver: Receiver<Symbol>,
    running: Arc<AtomicBool>,
}

impl NoopKeyListener {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start "capturing". Marks the listener as running; no events follow.
    /// Idempotent.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop capturing. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for normalized symbols.
    pub fn receiver(&self) -> &Receiver<Symbol> {
        &self.receiver
    }

    /// Inject a symbol as if it had been captured. Test hook for exercising
    /// the downstream pipeline without a real OS listener.
    pub fn inject(&self, symbol: Symbol) {
        let _ = self.sender.try_send(symbol);
    }
}

impl Default for NoopKeyListener {
    fn default() -> Self {
        Self::new()
    }
}

/// No permission gate exists on this platform.
pub fn check_permission() -> bool {
    true
}

/// No authorization flow exists on this platform.
pub fn request_permission() {}
