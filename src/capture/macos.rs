//! macOS key capture using a CGEvent tap.
//!
//! Subscribes to session-level key-down events through the Core Graphics
//! event tap API. Requires Input Monitoring permission. The tap is created
//! listen-only, so captured events are never altered or swallowed.

use crate::capture::types::{normalize_key_event, ControlKey, Symbol};
use crate::capture::{CaptureError, CHANNEL_CAPACITY};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use foreign_types::ForeignType;
use std::os::raw::c_ulong;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

// Virtual key codes from Carbon's HIToolbox (kVK_*). Fixed table; any other
// key code falls through to unicode decoding.
const KEY_CODE_RETURN: i64 = 36;
const KEY_CODE_TAB: i64 = 48;
const KEY_CODE_SPACE: i64 = 49;
const KEY_CODE_DELETE: i64 = 51;
const KEY_CODE_ESCAPE: i64 = 53;
const KEY_CODE_FORWARD_DELETE: i64 = 117;

fn control_key_for(key_code: i64) -> Option<ControlKey> {
    match key_code {
        KEY_CODE_SPACE => Some(ControlKey::Space),
        KEY_CODE_RETURN => Some(ControlKey::Enter),
        KEY_CODE_TAB => Some(ControlKey::Tab),
        KEY_CODE_DELETE => Some(ControlKey::Backspace),
        KEY_CODE_ESCAPE => Some(ControlKey::Escape),
        KEY_CODE_FORWARD_DELETE => Some(ControlKey::ForwardDelete),
        _ => None,
    }
}

// The safe core-graphics wrapper does not expose the keyboard unicode
// accessor, so bind it directly.
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventKeyboardGetUnicodeString(
        event: core_graphics::sys::CGEventRef,
        max_string_length: c_ulong,
        actual_string_length: *mut c_ulong,
        unicode_string: *mut u16,
    );
}

/// Maximum UTF-16 code units decoded from a single key event.
const MAX_DECODED_UNITS: usize = 4;

fn decoded_text(event: &core_graphics::event::CGEvent) -> String {
    let mut buf = [0u16; MAX_DECODED_UNITS];
    let mut len: c_ulong = 0;
    unsafe {
        CGEventKeyboardGetUnicodeString(
            event.as_ptr(),
            MAX_DECODED_UNITS as c_ulong,
            &mut len,
            buf.as_mut_ptr(),
        );
    }
    let len = (len as usize).min(MAX_DECODED_UNITS);
    String::from_utf16_lossy(&buf[..len])
}

/// Normalize a key-down CGEvent into a symbol, or drop it.
fn extract_symbol(event: &core_graphics::event::CGEvent) -> Option<Symbol> {
    let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
    let control = control_key_for(key_code);
    if control.is_some() {
        // Table match overrides decoded text; skip the decode entirely.
        return normalize_key_event(control, "");
    }
    normalize_key_event(None, &decoded_text(event))
}

/// The macOS key listener using a CGEvent tap on a dedicated thread.
pub struct MacOsKeyListener {
    sender: Sender<Symbol>,
    receiver: Receiver<Symbol>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOsKeyListener {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start capturing key-down events in a background thread.
    ///
    /// Idempotent: returns `Ok(())` if already running. Fails with
    /// `PermissionDenied` when Input Monitoring has not been granted; no
    /// listener is installed in that case.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !check_permission() {
            return Err(CaptureError::PermissionDenied);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone()) {
                tracing::error!(error = %e, "key event loop failed");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events. Idempotent; teardown is bounded by the run
    /// loop's 100 ms wakeup interval.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for normalized symbols.
    pub fn receiver(&self) -> &Receiver<Symbol> {
        &self.receiver
    }
}

impl Default for MacOsKeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MacOsKeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the Core Graphics event loop on the capture thread.
fn run_event_loop(sender: Sender<Symbol>, running: Arc<AtomicBool>) -> Result<(), CaptureError> {
    // The tap callback is an explicit closure owning the sender; it lives
    // exactly as long as the tap, which this thread owns.
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        move |_proxy, _event_type, event| {
            if let Some(symbol) = extract_symbol(event) {
                // Never block inside the event callback; drop when full.
                let _ = sender.try_send(symbol);
            }
            // Listen-only tap: the event continues to the OS untouched.
            CallbackResult::Keep
        },
    )
    .map_err(|_| CaptureError::InstallFailed("could not create CGEvent tap"))?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CaptureError::InstallFailed("could not create run loop source"))?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();

    // Wake periodically to honor stop requests; the tap drops (and uninstalls)
    // when this function returns.
    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

/// Check whether Input Monitoring permission has been granted.
///
/// macOS has no direct query for this; creating a throwaway listen-only tap
/// fails exactly when permission is missing.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}

/// Trigger the OS authorization flow.
///
/// Attempting a tap registers the app in the Input Monitoring list; opening
/// System Settings points the user at the right pane. Permission state is
/// only re-read by a subsequent `check_permission`.
pub fn request_permission() {
    let _ = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    let _ = std::process::Command::new("open")
        .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_ListenEvent")
        .spawn();
}
