//! Keyboard hook for platforms without a supported global hook.
//!
//! This exists so the crate (and binary) compile everywhere. Installing it
//! always fails, which disables copy/paste events while the polling samplers
//! keep running.

use crate::collector::keys::{KeyHook, KeyInput, ListenerError};
use crossbeam_channel::Sender;

/// A hook that can never be installed.
#[derive(Debug, Default)]
pub struct UnsupportedKeyHook;

impl UnsupportedKeyHook {
    pub fn new() -> Self {
        Self
    }
}

impl KeyHook for UnsupportedKeyHook {
    fn install(&mut self, _sender: Sender<KeyInput>) -> Result<(), ListenerError> {
        Err(ListenerError::Unsupported(std::env::consts::OS.to_string()))
    }

    fn uninstall(&mut self) {}
}

/// No global keyboard hook is available on this platform.
pub fn check_permission() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_install_reports_unsupported() {
        let (tx, _rx) = bounded(1);
        let mut hook = UnsupportedKeyHook::new();
        assert!(matches!(
            hook.install(tx),
            Err(ListenerError::Unsupported(_))
        ));
        hook.uninstall();
    }
}
