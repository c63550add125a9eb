//! Focused-window lookup.

use crate::collector::types::WindowContext;
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Errors from a one-shot OS query. Samplers never propagate these; they fall
/// back to [`WindowContext::unresolved`] or skip the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationError {
    NoFocusedWindow,
    Platform(String),
    Clipboard(String),
}

impl std::fmt::Display for ObservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationError::NoFocusedWindow => write!(f, "No focused window"),
            ObservationError::Platform(e) => write!(f, "Window query failed: {e}"),
            ObservationError::Clipboard(e) => write!(f, "Clipboard read failed: {e}"),
        }
    }
}

impl std::error::Error for ObservationError {}

/// One-shot query of the focused window. No retained state.
pub trait WindowInspector: Send + Sync {
    fn focused_window(&self) -> Result<WindowContext, ObservationError>;
}

/// Resolve the focused window, substituting the unresolved default on failure.
pub fn resolve_window(inspector: &dyn WindowInspector) -> WindowContext {
    match inspector.focused_window() {
        Ok(window) => window,
        Err(e) => {
            tracing::debug!("window lookup failed: {e}");
            WindowContext::unresolved()
        }
    }
}

/// What the platform layer reports about the front window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FrontWindow {
    pub title: Option<String>,
    pub pid: u32,
    /// Owner name when the platform hands it out directly
    pub owner: Option<String>,
}

/// The platform window inspector; process names are resolved through `sysinfo`.
pub struct SystemWindowInspector {
    system: Mutex<System>,
}

impl SystemWindowInspector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        if pid == 0 {
            return None;
        }
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| p.name().to_string_lossy().into_owned())
    }
}

impl Default for SystemWindowInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowInspector for SystemWindowInspector {
    fn focused_window(&self) -> Result<WindowContext, ObservationError> {
        let front = front_window()?;
        let process = front
            .owner
            .filter(|name| !name.is_empty())
            .or_else(|| self.process_name(front.pid))
            .unwrap_or_default();

        Ok(WindowContext {
            title: front.title,
            process,
            pid: front.pid,
        })
    }
}

#[cfg(target_os = "macos")]
fn front_window() -> Result<FrontWindow, ObservationError> {
    crate::collector::macos::front_window()
}

#[cfg(target_os = "windows")]
fn front_window() -> Result<FrontWindow, ObservationError> {
    crate::collector::windows::front_window()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn front_window() -> Result<FrontWindow, ObservationError> {
    let window = active_win_pos_rs::get_active_window()
        .map_err(|()| ObservationError::NoFocusedWindow)?;
    Ok(front_from_active(
        window.title,
        window.process_id,
        window.app_name,
    ))
}

/// Map what `active-win-pos-rs` reports; empty strings mean "not available".
#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
fn front_from_active(title: String, process_id: u64, app_name: String) -> FrontWindow {
    FrontWindow {
        title: Some(title).filter(|t| !t.is_empty()),
        pid: u32::try_from(process_id).unwrap_or(0),
        owner: Some(app_name).filter(|name| !name.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_from_active() {
        let front = front_from_active("notes - Editor".to_string(), 4242, "editor".to_string());
        assert_eq!(front.title.as_deref(), Some("notes - Editor"));
        assert_eq!(front.pid, 4242);
        assert_eq!(front.owner.as_deref(), Some("editor"));
    }

    #[test]
    fn test_front_from_active_blank_fields() {
        let front = front_from_active(String::new(), u64::MAX, String::new());
        assert_eq!(front, FrontWindow::default());
    }
}
