//! Engine controller: capture lifecycle, permission state, and the wiring
//! from the key listener through the n-gram recorder into the counting store.
//!
//! Exactly one engine (and therefore one system listener) should exist per
//! process. The engine is an explicitly constructed, explicitly owned value;
//! collaborators observe it through a cloneable [`EngineStatus`] handle.

use crate::capture::{self, KeyListener};
use crate::ngram::NgramRecorder;
use crate::store::CountStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from engine lifecycle operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Monitoring cannot start without input-monitoring authorization.
    #[error("input monitoring permission not granted")]
    PermissionDenied,

    /// The capture backend failed to install its listener.
    #[error(transparent)]
    Capture(#[from] capture::CaptureError),
}

/// Observable engine state, safe to read from any thread.
///
/// Both fields are single atomics, so observers never see a torn update.
#[derive(Clone, Default)]
pub struct EngineStatus {
    inner: Arc<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    monitoring: AtomicBool,
    permission: AtomicBool,
}

impl EngineStatus {
    pub fn is_monitoring(&self) -> bool {
        self.inner.monitoring.load(Ordering::SeqCst)
    }

    pub fn has_permission(&self) -> bool {
        self.inner.permission.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            is_monitoring: self.is_monitoring(),
            has_permission: self.has_permission(),
        }
    }

    fn set_monitoring(&self, value: bool) {
        self.inner.monitoring.store(value, Ordering::SeqCst);
    }

    fn set_permission(&self, value: bool) {
        self.inner.permission.store(value, Ordering::SeqCst);
    }
}

/// Point-in-time view of the engine status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusSnapshot {
    pub is_monitoring: bool,
    pub has_permission: bool,
}

/// Interval at which the worker thread re-checks its stop flag.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The capture-and-aggregation engine.
pub struct Engine {
    store: Arc<CountStore>,
    listener: KeyListener,
    status: EngineStatus,
    worker_running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
}

impl Engine {
    /// Create an engine over the given store. Queries the current permission
    /// state eagerly; monitoring starts only on an explicit `start()`.
    pub fn new(store: Arc<CountStore>) -> Self {
        let engine = Self {
            store,
            listener: KeyListener::new(),
            status: EngineStatus::default(),
            worker_running: Arc::new(AtomicBool::new(false)),
            worker: None,
            started_at: None,
        };
        engine.check_permission();
        engine
    }

    /// Cloneable status handle for collaborators (UI, CLI output).
    pub fn status(&self) -> EngineStatus {
        self.status.clone()
    }

    pub fn store(&self) -> &Arc<CountStore> {
        &self.store
    }

    /// When the current monitoring session started, if active.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Re-query the environment's authorization state and publish it.
    pub fn check_permission(&self) -> bool {
        let granted = capture::check_permission();
        self.status.set_permission(granted);
        granted
    }

    /// Trigger the OS authorization flow. Does not change `has_permission`;
    /// call `check_permission` afterwards to observe the result.
    pub fn request_permission(&self) {
        capture::request_permission();
    }

    /// Start monitoring.
    ///
    /// No-op when already monitoring. Without permission, triggers the
    /// authorization flow and returns `PermissionDenied` while staying
    /// non-monitoring.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.status.is_monitoring() {
            return Ok(());
        }

        if !self.check_permission() {
            self.request_permission();
            return Err(EngineError::PermissionDenied);
        }

        self.listener.start()?;

        // Fresh recorder per session: the window never carries symbols
        // across a stop/start boundary.
        let mut recorder = NgramRecorder::new(self.store.clone());
        let receiver = self.listener.receiver().clone();
        let running = self.worker_running.clone();
        running.store(true, Ordering::SeqCst);

        let worker = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match receiver.recv_timeout(WORKER_POLL_INTERVAL) {
                    Ok(symbol) => recorder.observe(symbol),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            // Privacy guarantee: no residual keystroke data survives a stop.
            recorder.reset();
        });

        self.worker = Some(worker);
        self.started_at = Some(Utc::now());
        self.status.set_monitoring(true);
        tracing::info!("monitoring started");
        Ok(())
    }

    /// Stop monitoring. Idempotent and safe to call from any state.
    ///
    /// After this returns no further symbols are observed: the worker is
    /// stopped first (at most one in-flight observation lands, and the
    /// worker clears the window on exit), then the listener is torn down and
    /// any queued events are discarded.
    pub fn stop(&mut self) {
        self.worker_running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.listener.stop();

        // Discard events that were queued but never observed.
        while self.listener.receiver().try_recv().is_ok() {}

        if self.status.is_monitoring() {
            if let Err(e) = self.store.flush() {
                tracing::warn!(error = %e, "flush on stop failed");
            }
            tracing::info!("monitoring stopped");
        }
        self.started_at = None;
        self.status.set_monitoring(false);
    }

    /// Inject a symbol as if it had been captured. Only available where no
    /// real capture backend exists; used by integration tests and demos.
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    pub fn inject_symbol(&self, symbol: capture::Symbol) {
        self.listener.inject(symbol);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Process shutdown must always stop capture.
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_snapshot_starts_false() {
        let status = EngineStatus::default();
        let snap = status.snapshot();
        assert!(!snap.is_monitoring);
        assert!(!snap.has_permission);
    }

    #[test]
    fn test_status_handle_shares_state() {
        let status = EngineStatus::default();
        let observer = status.clone();
        status.set_monitoring(true);
        assert!(observer.is_monitoring());
        status.set_monitoring(false);
        assert!(!observer.is_monitoring());
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let store = Arc::new(CountStore::open_in_memory().unwrap());
        let mut engine = Engine::new(store);
        engine.stop();
        engine.stop();
        assert!(!engine.status().is_monitoring());
    }
}
