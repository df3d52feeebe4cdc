//! Application windows as seen through the window system collaborator.
//!
//! Windows are never owned here. A [`WindowId`] is a handle into the
//! collaborator's own table and is re-validated through
//! [`WindowSystem::window_state`] before each use.

mod identity;
mod matcher;
mod tracker;


use std::fmt;

use super::IconRef;

pub use identity::resolve_application;
pub use matcher::match_window;
pub use tracker::InstanceTracker;

/// Handle to a window owned by the window system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Identity of an installed or running application, usually its desktop id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(pub String);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notifications from the window system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window set of an application changed
    WindowsChanged(AppId),
    /// A window's focus changed
    FocusChanged(WindowId),
    /// A window is gone or about to be
    WindowRemoved(WindowId),
}

/// Read-only snapshot of one application window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCandidate {
    /// Handle used to address the window later
    pub id: WindowId,
    /// Process that owns the window
    pub pid: u32,
    /// Unique bus name of the toolkit connection behind the window
    pub unique_bus_name: Option<String>,
    /// Number at the end of the window's object path, if it exports one
    pub object_path_suffix: Option<u64>,
    /// Ordinary top level window (not a dialog, not hidden from the taskbar)
    pub normal_top_level: bool,
}

/// Live state of a window, read on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Whether the window currently appears focused
    pub has_focus: bool,
    /// Timestamp of the last user interaction with the window
    pub user_time: u64,
    /// Whether the window manager allows minimizing it
    pub can_minimize: bool,
}

/// Window and application registry of the desktop shell.
///
/// Change notifications (window set changed, focus changed, window
/// removed) are not part of this trait: the collaborator pushes them into
/// the engine through [`crate::services::mpris::EngineNotifier`].
pub trait WindowSystem: Send + Sync {
    /// Look up an application by exact desktop id, e.g. `vlc.desktop`.
    fn lookup_app(&self, desktop_id: &str) -> Option<AppId>;

    /// Look up an application by its startup WM class.
    fn lookup_startup_wm_class(&self, wm_class: &str) -> Option<AppId>;

    /// Applications that are currently running.
    fn running_apps(&self) -> Vec<AppId>;

    /// Display name of an application.
    fn app_name(&self, app: &AppId) -> Option<String>;

    /// Keyword search over installed applications.
    ///
    /// Each group holds desktop ids of equal relevance, best group first.
    fn search_apps(&self, keyword: &str) -> Vec<Vec<String>>;

    /// Full colour icon of an application.
    fn app_icon(&self, app: &AppId) -> Option<IconRef>;

    /// Windows of an application.
    fn list_windows(&self, app: &AppId) -> Vec<WindowCandidate>;

    /// Current state of a window, or `None` once it is gone.
    fn window_state(&self, window: WindowId) -> Option<WindowState>;

    /// Bring a window to the front and focus it.
    fn activate_window(&self, window: WindowId) -> bool;

    /// Minimize a window.
    fn minimize_window(&self, window: WindowId) -> bool;

    /// Activate an application as a whole, used when no window is known.
    fn activate_app(&self, app: &AppId) -> bool;
}

/// Window system that knows no applications.
///
/// Every player degrades to the no-window path: no focus boost, and
/// activation falls back to asking the player to raise itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessWindows;

impl WindowSystem for HeadlessWindows {
    fn lookup_app(&self, _desktop_id: &str) -> Option<AppId> {
        None
    }

    fn lookup_startup_wm_class(&self, _wm_class: &str) -> Option<AppId> {
        None
    }

    fn running_apps(&self) -> Vec<AppId> {
        Vec::new()
    }

    fn app_name(&self, _app: &AppId) -> Option<String> {
        None
    }

    fn search_apps(&self, _keyword: &str) -> Vec<Vec<String>> {
        Vec::new()
    }

    fn app_icon(&self, _app: &AppId) -> Option<IconRef> {
        None
    }

    fn list_windows(&self, _app: &AppId) -> Vec<WindowCandidate> {
        Vec::new()
    }

    fn window_state(&self, _window: WindowId) -> Option<WindowState> {
        None
    }

    fn activate_window(&self, _window: WindowId) -> bool {
        false
    }

    fn minimize_window(&self, _window: WindowId) -> bool {
        false
    }

    fn activate_app(&self, _app: &AppId) -> bool {
        false
    }
}
