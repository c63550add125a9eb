//! macOS keyboard hook (CGEvent tap) and front-window lookup.
//!
//! The tap is listen-only and subscribes to key-down and flags-changed events.
//! It requires Input Monitoring permission. Only C, V, Control and Command
//! transitions are forwarded; every other key code is discarded in the callback.

#![allow(non_upper_case_globals)]

use crate::collector::keys::{KeyHook, KeyInput, ListenerError, TrackedKey};
use crate::collector::window::{FrontWindow, ObservationError};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Sender};
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Virtual key codes (ANSI layout)
const KEYCODE_C: i64 = 8;
const KEYCODE_V: i64 = 9;
const KEYCODE_COMMAND: i64 = 55;
const KEYCODE_RIGHT_COMMAND: i64 = 54;
const KEYCODE_CONTROL: i64 = 59;
const KEYCODE_RIGHT_CONTROL: i64 = 62;

// Device-dependent modifier bits (IOLLEvent.h); they tell the two sides apart.
const DEVICE_LEFT_CONTROL: u64 = 0x0000_0001;
const DEVICE_LEFT_COMMAND: u64 = 0x0000_0008;
const DEVICE_RIGHT_COMMAND: u64 = 0x0000_0010;
const DEVICE_RIGHT_CONTROL: u64 = 0x0000_2000;

/// The macOS keyboard hook using CGEvent tap.
pub struct MacOSKeyHook {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSKeyHook {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Check if the tap is currently installed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for MacOSKeyHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyHook for MacOSKeyHook {
    fn install(&mut self, sender: Sender<KeyInput>) -> Result<(), ListenerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::spawn(move || {
            let result = run_event_loop(sender, running.clone(), &ready_tx);
            if let Err(e) = result {
                // Install failed before the loop started
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
                self.running.store(false, Ordering::SeqCst);
                self.thread_handle = Some(handle);
                Err(ListenerError::HookInstallationFailed)
            }
        }
    }

    fn uninstall(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop notices the flag within 100ms and drops the tap
            let _ = handle.join();
        }
    }
}

impl Drop for MacOSKeyHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    sender: Sender<KeyInput>,
    running: Arc<AtomicBool>,
    ready: &Sender<Result<(), ListenerError>>,
) -> Result<(), ListenerError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        move |_proxy, event_type, event| {
            if let Some(input) = translate(event_type, event) {
                // Never block the tap; drop the input if the consumer lags
                let _ = sender.try_send(input);
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| ListenerError::PermissionDenied)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| ListenerError::HookInstallationFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    // Unregister before the thread exits
    unsafe {
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
    }
    drop(tap);
    Ok(())
}

/// Map a CGEvent to a tracked key transition.
fn translate(event_type: CGEventType, event: &CGEvent) -> Option<KeyInput> {
    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);

    match event_type {
        CGEventType::KeyDown => match keycode {
            KEYCODE_C => Some(KeyInput::Pressed(TrackedKey::C)),
            KEYCODE_V => Some(KeyInput::Pressed(TrackedKey::V)),
            _ => None,
        },
        CGEventType::KeyUp => match keycode {
            KEYCODE_C => Some(KeyInput::Released(TrackedKey::C)),
            KEYCODE_V => Some(KeyInput::Released(TrackedKey::V)),
            _ => None,
        },
        CGEventType::FlagsChanged => modifier_transition(keycode, event.get_flags().bits()),
        _ => None,
    }
}

/// Which side of which modifier changed, and whether it is now down.
fn modifier_transition(keycode: i64, flag_bits: u64) -> Option<KeyInput> {
    let (key, mask) = match keycode {
        KEYCODE_COMMAND => (TrackedKey::Command, DEVICE_LEFT_COMMAND),
        KEYCODE_RIGHT_COMMAND => (TrackedKey::RightCommand, DEVICE_RIGHT_COMMAND),
        KEYCODE_CONTROL => (TrackedKey::Control, DEVICE_LEFT_CONTROL),
        KEYCODE_RIGHT_CONTROL => (TrackedKey::RightControl, DEVICE_RIGHT_CONTROL),
        _ => return None,
    };
    Some(if flag_bits & mask != 0 {
        KeyInput::Pressed(key)
    } else {
        KeyInput::Released(key)
    })
}

/// Check if the application has Input Monitoring permission by creating a
/// throwaway passive tap.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}

// ---------------------------------------------------------------------------
// Front window (CGWindowList)
// ---------------------------------------------------------------------------

type CFIndex = isize;
type CFStringRef = *const c_void;
type CFArrayRef = *const c_void;
type CFDictionaryRef = *const c_void;
type CFTypeRef = *const c_void;

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFArrayGetCount(the_array: CFArrayRef) -> CFIndex;
    fn CFArrayGetValueAtIndex(the_array: CFArrayRef, idx: CFIndex) -> *const c_void;
    fn CFDictionaryGetValue(the_dict: CFDictionaryRef, key: CFTypeRef) -> *const c_void;
    fn CFStringGetCStringPtr(the_string: CFStringRef, encoding: u32) -> *const c_char;
    fn CFStringGetCString(
        the_string: CFStringRef,
        buffer: *mut c_char,
        buffer_size: CFIndex,
        encoding: u32,
    ) -> bool;
    fn CFNumberGetValue(number: CFTypeRef, the_type: i32, value_ptr: *mut i32) -> bool;
    fn CFRelease(cf: CFTypeRef);
}

const kCFStringEncodingUTF8: u32 = 0x0800_0100;
const kCFNumberSInt32Type: i32 = 3;
const kCGWindowListOptionOnScreenOnly: u32 = 1;
const kCGWindowListExcludeDesktopElements: u32 = 1 << 4;
const kCGNullWindowID: u32 = 0;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGWindowListCopyWindowInfo(options: u32, relative_to_window: u32) -> CFArrayRef;

    static kCGWindowOwnerPID: CFStringRef;
    static kCGWindowOwnerName: CFStringRef;
    static kCGWindowLayer: CFStringRef;
    static kCGWindowName: CFStringRef;
}

/// The topmost on-screen layer-0 window. The title needs Screen Recording
/// permission and is `None` without it.
pub(crate) fn front_window() -> Result<FrontWindow, ObservationError> {
    unsafe {
        let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
        let windows = CGWindowListCopyWindowInfo(options, kCGNullWindowID);
        if windows.is_null() {
            return Err(ObservationError::Platform(
                "CGWindowListCopyWindowInfo returned null".to_string(),
            ));
        }

        let mut front = None;
        for i in 0..CFArrayGetCount(windows) {
            let dict = CFArrayGetValueAtIndex(windows, i) as CFDictionaryRef;
            if dict.is_null() {
                continue;
            }
            if number_value(dict, kCGWindowLayer).unwrap_or(0) != 0 {
                continue;
            }
            let Some(pid) = number_value(dict, kCGWindowOwnerPID) else {
                continue;
            };

            front = Some(FrontWindow {
                title: string_value(dict, kCGWindowName),
                pid: pid.max(0) as u32,
                owner: string_value(dict, kCGWindowOwnerName),
            });
            break;
        }

        CFRelease(windows as CFTypeRef);
        front.ok_or(ObservationError::NoFocusedWindow)
    }
}

unsafe fn number_value(dict: CFDictionaryRef, key: CFStringRef) -> Option<i32> {
    let value = CFDictionaryGetValue(dict, key as CFTypeRef);
    if value.is_null() {
        return None;
    }
    let mut out = 0i32;
    if CFNumberGetValue(value as CFTypeRef, kCFNumberSInt32Type, &mut out) {
        Some(out)
    } else {
        None
    }
}

unsafe fn string_value(dict: CFDictionaryRef, key: CFStringRef) -> Option<String> {
    let value = CFDictionaryGetValue(dict, key as CFTypeRef) as CFStringRef;
    if value.is_null() {
        return None;
    }
    let ptr = CFStringGetCStringPtr(value, kCFStringEncodingUTF8);
    if !ptr.is_null() {
        return CStr::from_ptr(ptr).to_str().ok().map(str::to_string);
    }
    let mut buf = [0 as c_char; 4096];
    if CFStringGetCString(
        value,
        buf.as_mut_ptr(),
        buf.len() as CFIndex,
        kCFStringEncodingUTF8,
    ) {
        return CStr::from_ptr(buf.as_ptr()).to_str().ok().map(str::to_string);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_creation() {
        let hook = MacOSKeyHook::new();
        assert!(!hook.is_running());
    }

    #[test]
    fn test_modifier_sides() {
        // Right Command released while left Command is still down
        let bits = DEVICE_LEFT_COMMAND;
        assert_eq!(
            modifier_transition(KEYCODE_RIGHT_COMMAND, bits),
            Some(KeyInput::Released(TrackedKey::RightCommand))
        );
        assert_eq!(
            modifier_transition(KEYCODE_CONTROL, DEVICE_LEFT_CONTROL),
            Some(KeyInput::Pressed(TrackedKey::Control))
        );
        assert_eq!(modifier_transition(KEYCODE_C, bits), None);
    }
}
