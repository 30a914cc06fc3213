//! System-wide key capture.
//!
//! Platform-specific listeners subscribe to the OS key-down stream, normalize
//! each event into a [`Symbol`], and deliver it over a bounded channel. The
//! listeners are listen-only: events pass through to the OS unmodified.

use thiserror::Error;

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

pub use types::{normalize_key_event, ControlKey, Symbol};

#[cfg(target_os = "macos")]
pub use macos::{check_permission, request_permission, MacOsKeyListener};

/// Platform-agnostic key listener type alias.
#[cfg(target_os = "macos")]
pub type KeyListener = MacOsKeyListener;

#[cfg(target_os = "windows")]
pub use windows::{check_permission, request_permission, WindowsKeyListener};

/// Platform-agnostic key listener type alias.
#[cfg(target_os = "windows")]
pub type KeyListener = WindowsKeyListener;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, request_permission, NoopKeyListener};

/// Platform-agnostic key listener type alias.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type KeyListener = NoopKeyListener;

/// Bounded capacity of the symbol delivery channel. Prevents unbounded memory
/// growth; symbols are dropped rather than blocking the event callback when
/// the consumer falls behind.
pub(crate) const CHANNEL_CAPACITY: usize = 10_000;

/// Errors that can occur when installing the system key listener.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Input monitoring authorization has not been granted.
    #[error("input monitoring permission not granted")]
    PermissionDenied,

    /// The OS refused to install the listener even with permission.
    #[error("failed to install system key listener: {0}")]
    InstallFailed(&'static str),
}
