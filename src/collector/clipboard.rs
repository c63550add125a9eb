//! System clipboard access.

use crate::collector::window::ObservationError;

/// One-shot read of the clipboard's text.
///
/// `Ok(None)` means the clipboard is empty or holds no text. Errors are
/// transient (locked clipboard, no display) and never fatal.
pub trait ClipboardAccessor: Send + Sync {
    fn read_text(&self) -> Result<Option<String>, ObservationError>;
}

/// Clipboard backed by `arboard`. A fresh handle is opened on every read so
/// nothing platform-specific is held across threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardAccessor for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>, ObservationError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ObservationError::Clipboard(e.to_string()))?;

        match clipboard.get_text() {
            Ok(text) if text.is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ObservationError::Clipboard(e.to_string())),
        }
    }
}
