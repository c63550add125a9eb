//! Windows keyboard hook (`WH_KEYBOARD_LL`) and foreground-window lookup.
//!
//! The hook runs on its own thread with a message loop. Stopping posts
//! `WM_QUIT` to that thread, which unhooks before returning. Only C, V, Control
//! and Windows-key transitions leave the hook procedure.

use crate::collector::keys::{KeyHook, KeyInput, ListenerError, TrackedKey};
use crate::collector::window::{FrontWindow, ObservationError};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetForegroundWindow, GetMessageW, GetWindowTextW, GetWindowThreadProcessId,
    PeekMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx, HHOOK,
    KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT,
    WM_SYSKEYDOWN, WM_SYSKEYUP,
};

// Virtual key codes
const VK_C: u32 = 0x43;
const VK_V: u32 = 0x56;
const VK_CONTROL: u32 = 0x11;
const VK_LCONTROL: u32 = 0xA2;
const VK_RCONTROL: u32 = 0xA3;
const VK_LWIN: u32 = 0x5B;
const VK_RWIN: u32 = 0x5C;

/// The Windows keyboard hook.
pub struct WindowsKeyHook {
    running: Arc<AtomicBool>,
    hook_thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsKeyHook {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            hook_thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Check if the hook is currently installed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for WindowsKeyHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHook for WindowsKeyHook {
    fn install(&mut self, sender: Sender<KeyInput>) -> Result<(), ListenerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let thread_id = self.hook_thread_id.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, thread_id, &ready_tx) {
                let _ = ready_tx.send(Err(e));
            }
            running.store(false, Ordering::SeqCst);
        });

        match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Ok(())) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.thread_handle = Some(handle);
                self.uninstall();
                Err(ListenerError::HookInstallationFailed)
            }
        }
    }

    fn uninstall(&mut self) {
        let thread_id = self.hook_thread_id.swap(0, Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for WindowsKeyHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

thread_local! {
    static KEY_SENDER: std::cell::RefCell<Option<Sender<KeyInput>>> = const { std::cell::RefCell::new(None) };
}

/// Map a virtual key code to a tracked key.
fn tracked_key(vk_code: u32) -> Option<TrackedKey> {
    match vk_code {
        VK_C => Some(TrackedKey::C),
        VK_V => Some(TrackedKey::V),
        VK_CONTROL | VK_LCONTROL => Some(TrackedKey::Control),
        VK_RCONTROL => Some(TrackedKey::RightControl),
        VK_LWIN => Some(TrackedKey::Command),
        VK_RWIN => Some(TrackedKey::RightCommand),
        _ => None,
    }
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        let kb_struct = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let message = w_param.0 as u32;

        if let Some(key) = tracked_key(kb_struct.vkCode) {
            let input = match message {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyInput::Pressed(key)),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyInput::Released(key)),
                _ => None,
            };

            if let Some(input) = input {
                KEY_SENDER.with(|sender| {
                    if let Some(ref s) = *sender.borrow() {
                        let _ = s.try_send(input);
                    }
                });
            }
        }
    }

    // Pass the event to the next hook
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook and pump messages until `WM_QUIT`.
fn run_hook_loop(
    sender: Sender<KeyInput>,
    thread_id: Arc<AtomicU32>,
    ready: &Sender<Result<(), ListenerError>>,
) -> Result<(), ListenerError> {
    KEY_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });

    unsafe {
        let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .map_err(|_| ListenerError::HookInstallationFailed)?;

        // Force creation of this thread's message queue so WM_QUIT can be posted
        let mut msg = MSG::default();
        let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);
        thread_id.store(GetCurrentThreadId(), Ordering::SeqCst);
        let _ = ready.send(Ok(()));

        // GetMessageW returns 0 on WM_QUIT and -1 on error
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(hook);
    }

    KEY_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });
    Ok(())
}

/// Check whether a low-level keyboard hook can be installed.
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

/// The foreground window's title and owning pid.
pub(crate) fn front_window() -> Result<FrontWindow, ObservationError> {
    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.0.is_null() {
            return Err(ObservationError::NoFocusedWindow);
        }

        let mut buffer = vec![0u16; 512];
        let len = GetWindowTextW(hwnd, &mut buffer);
        let title = if len > 0 {
            Some(String::from_utf16_lossy(&buffer[..len as usize]))
        } else {
            Some(String::new())
        };

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));

        Ok(FrontWindow {
            title,
            pid,
            owner: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_keys() {
        assert_eq!(tracked_key(VK_C), Some(TrackedKey::C));
        assert_eq!(tracked_key(VK_LCONTROL), Some(TrackedKey::Control));
        assert_eq!(tracked_key(VK_RCONTROL), Some(TrackedKey::RightControl));
        assert_eq!(tracked_key(VK_RWIN), Some(TrackedKey::RightCommand));
        assert_eq!(tracked_key(VK_LWIN), Some(TrackedKey::Command));
        // Letters other than C/V never leave the hook
        assert_eq!(tracked_key(0x41), None);
    }

    #[test]
    fn test_hook_creation() {
        let hook = WindowsKeyHook::new();
        assert!(!hook.is_running());
    }
}
