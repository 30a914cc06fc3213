//! Windows key capture using a low-level keyboard hook.
//!
//! Installs a `WH_KEYBOARD_LL` hook (SetWindowsHookEx) on a dedicated thread
//! and normalizes key-down events into symbols. The hook always calls
//! `CallNextHookEx`, so events pass through to the rest of the system.

use crate::capture::types::{normalize_key_event, ControlKey, Symbol};
use crate::capture::{CaptureError, CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyboardState, ToUnicode};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT, WM_SYSKEYDOWN,
};

// Virtual-key codes for the fixed control table.
const VK_BACK: u32 = 0x08;
const VK_TAB: u32 = 0x09;
const VK_RETURN: u32 = 0x0D;
const VK_ESCAPE: u32 = 0x1B;
const VK_SPACE: u32 = 0x20;
const VK_DELETE: u32 = 0x2E;

fn control_key_for(vk_code: u32) -> Option<ControlKey> {
    match vk_code {
        VK_SPACE => Some(ControlKey::Space),
        VK_RETURN => Some(ControlKey::Enter),
        VK_TAB => Some(ControlKey::Tab),
        VK_BACK => Some(ControlKey::Backspace),
        VK_ESCAPE => Some(ControlKey::Escape),
        VK_DELETE => Some(ControlKey::ForwardDelete),
        _ => None,
    }
}

/// Maximum UTF-16 code units decoded from a single key event.
const MAX_DECODED_UNITS: usize = 4;

/// `ToUnicode` flag: do not update the shared keyboard state (Win 10 1607+).
/// Without it the translation consumes pending dead keys, breaking dead-key
/// composition in the focused application.
const TO_UNICODE_NO_STATE_CHANGE: u32 = 0x4;

/// Decode the typed text for a virtual key using the current keyboard state.
///
/// The translation is side-effect free: the no-state-change flag keeps the
/// shared dead-key state untouched, so the hooked event reaches the focused
/// application exactly as typed.
fn decoded_text(vk_code: u32, scan_code: u32) -> String {
    let mut key_state = [0u8; 256];
    if unsafe { GetKeyboardState(&mut key_state) }.is_err() {
        return String::new();
    }

    let mut buf = [0u16; MAX_DECODED_UNITS];
    let written = unsafe {
        ToUnicode(
            vk_code,
            scan_code,
            Some(&key_state),
            &mut buf,
            TO_UNICODE_NO_STATE_CHANGE,
        )
    };
    if written <= 0 {
        // Dead keys and non-character keys decode to zero length.
        return String::new();
    }
    let len = (written as usize).min(MAX_DECODED_UNITS);
    String::from_utf16_lossy(&buf[..len])
}

// The hook procedure cannot capture variables; the sender is parked in
// thread-local storage by the hook thread before installation.
thread_local! {
    static SYMBOL_SENDER: std::cell::RefCell<Option<Sender<Symbol>>> =
        const { std::cell::RefCell::new(None) };
}

/// Low-level keyboard hook callback. Key-down only.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let w_param_u32 = w_param.0 as u32;
        if matches!(w_param_u32, WM_KEYDOWN | WM_SYSKEYDOWN) {
            let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
            let control = control_key_for(kb_struct.vkCode);
            let decoded = if control.is_some() {
                String::new()
            } else {
                decoded_text(kb_struct.vkCode, kb_struct.scanCode)
            };

            if let Some(symbol) = normalize_key_event(control, &decoded) {
                SYMBOL_SENDER.with(|sender| {
                    if let Some(ref s) = *sender.borrow() {
                        // Never block inside the hook; drop when full.
                        let _ = s.try_send(symbol);
                    }
                });
            }
        }
    }

    // Pass the event to the next hook unchanged.
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// The Windows key listener using a low-level keyboard hook.
pub struct WindowsKeyListener {
    sender: Sender<Symbol>,
    receiver: Receiver<Symbol>,
    running: Arc<AtomicBool>,
    // Id of the hook thread, 0 while not running. Needed to wake its
    // message loop on stop.
    thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsKeyListener {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Start capturing key-down events in a background thread.
    ///
    /// Idempotent: returns `Ok(())` if already running.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let thread_id = self.thread_id.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, running.clone(), thread_id.clone()) {
                tracing::error!(error = %e, "keyboard hook loop failed");
            }
            thread_id.store(0, Ordering::SeqCst);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events. Idempotent.
    ///
    /// `GetMessageW` does not return for hook dispatches, only for posted
    /// messages, so the hook thread must be woken explicitly: posting
    /// `WM_QUIT` to it bounds teardown regardless of keyboard activity.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The hook thread publishes its id before installing the hook,
            // and its message queue only exists once it first calls
            // GetMessageW; retry the wakeup until it lands or the thread
            // has already exited.
            while !handle.is_finished() {
                let tid = self.thread_id.load(Ordering::SeqCst);
                if tid != 0 {
                    let posted =
                        unsafe { PostThreadMessageW(tid, WM_QUIT, WPARAM(0), LPARAM(0)) };
                    if posted.is_ok() {
                        break;
                    }
                }
                thread::sleep(std::time::Duration::from_millis(10));
            }
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

impl Default for WindowsKeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WindowsKeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the hook installation and message loop on the capture thread.
fn run_hook_loop(
    sender: Sender<Symbol>,
    running: Arc<AtomicBool>,
    thread_id: Arc<AtomicU32>,
) -> Result<(), CaptureError> {
    SYMBOL_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });

    // Publish this thread's id so stop() can post WM_QUIT at it.
    thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    unsafe {
        let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .map_err(|_| CaptureError::InstallFailed("could not install keyboard hook"))?;

        // Low-level hooks are serviced through this thread's message queue.
        // Hook invocations are dispatched inside GetMessageW without it
        // returning; the loop only comes back here for posted messages,
        // which in practice means the WM_QUIT from stop().
        let mut msg = MSG::default();
        while running.load(Ordering::SeqCst) {
            let result = GetMessageW(&mut msg, HWND::default(), 0, 0);
            if result.0 <= 0 {
                // WM_QUIT or error
                break;
            }
        }

        let _ = UnhookWindowsHookEx(hook);
    }

    Ok(())
}

/// Check whether key events can be captured.
///
/// Windows has no explicit input-monitoring grant; installing a temporary
/// hook verifies the process privileges allow it.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

/// No interactive authorization flow exists on Windows.
pub fn request_permission() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_starts_stopped() {
        let listener = WindowsKeyListener::new();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_control_key_table() {
        assert_eq!(control_key_for(VK_SPACE), Some(ControlKey::Space));
        assert_eq!(control_key_for(VK_RETURN), Some(ControlKey::Enter));
        assert_eq!(control_key_for(VK_DELETE), Some(ControlKey::ForwardDelete));
        // 'A' key is not in the control table.
        assert_eq!(control_key_for(0x41), None);
    }

    #[test]
    fn test_stop_returns_without_keyboard_activity() {
        // The hook thread parks in GetMessageW; stop() must wake it with a
        // posted WM_QUIT rather than waiting for a keystroke.
        let mut listener = WindowsKeyListener::new();
        if listener.start().is_ok() {
            assert!(listener.is_running());
        }
        listener.stop();
        assert!(!listener.is_running());
        assert_eq!(listener.thread_id.load(Ordering::SeqCst), 0);
    }
}
