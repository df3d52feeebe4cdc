use tracing::debug;

use super::{AppId, WindowId, WindowSystem, match_window};

/// Follows the window that belongs to one player instance.
///
/// Several instances of the same application look identical to the window
/// system, so the tracker remembers the instance hints (pid, unique bus
/// name, instance suffix) and re-runs [`match_window`] whenever the
/// application's window set changes.
///
/// Unbound until a window matches. While bound, focus and removal
/// notifications for that window are honoured and everything else is
/// ignored. `focused` is never true while unbound.
#[derive(Debug)]
pub struct InstanceTracker {
    app: AppId,
    pid: Option<u32>,
    unique_bus_name: Option<String>,
    instance_suffix: Option<u64>,
    window: Option<WindowId>,
    focused: bool,
    last_activated: u64,
}

impl InstanceTracker {
    /// Create a tracker and immediately look for a window.
    pub fn new(
        app: AppId,
        pid: Option<u32>,
        unique_bus_name: Option<String>,
        instance_suffix: Option<u64>,
        windows: &dyn WindowSystem,
    ) -> Self {
        let mut tracker = Self {
            app,
            pid,
            unique_bus_name,
            instance_suffix,
            window: None,
            focused: false,
            last_activated: 0,
        };
        tracker.on_windows_changed(windows);
        tracker
    }

    /// Application this tracker watches.
    pub fn app(&self) -> &AppId {
        &self.app
    }

    /// Window currently bound, if any.
    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    /// Whether the bound window has focus.
    pub fn focused(&self) -> bool {
        self.focused
    }

    /// User time of the bound window when focus last changed.
    pub fn last_activated(&self) -> u64 {
        self.last_activated
    }

    /// Re-evaluate which window belongs to this instance.
    ///
    /// Returns `true` when `focused` changed as a result.
    pub fn on_windows_changed(&mut self, windows: &dyn WindowSystem) -> bool {
        let candidates = windows.list_windows(&self.app);
        let best = match_window(
            &candidates,
            self.pid,
            self.unique_bus_name.as_deref(),
            self.instance_suffix,
        )
        .map(|candidate| candidate.id);

        if best == self.window {
            return false;
        }

        let was_focused = self.focused;
        self.detach();

        if let Some(window) = best {
            debug!(app = %self.app, %window, "Bound player instance to window");
            self.window = Some(window);
            self.refresh_focus(windows);
        }

        was_focused != self.focused
    }

    /// Handle a focus notification for `window`.
    ///
    /// Returns `true` when `focused` changed.
    pub fn on_focus_changed(&mut self, window: WindowId, windows: &dyn WindowSystem) -> bool {
        if self.window != Some(window) {
            return false;
        }
        self.refresh_focus(windows)
    }

    /// Handle removal of `window` by the window system.
    ///
    /// Returns `true` when `focused` changed.
    pub fn on_window_removed(&mut self, window: WindowId) -> bool {
        if self.window != Some(window) {
            return false;
        }
        let was_focused = self.focused;
        self.detach();
        was_focused
    }

    /// Focus the bound window, or minimize it when it already has focus.
    ///
    /// Without a bound window the application as a whole is activated.
    /// Returns whether anything was done.
    pub fn toggle_window(&self, allow_minimize: bool, windows: &dyn WindowSystem) -> bool {
        let state = self.window.and_then(|window| {
            windows
                .window_state(window)
                .map(|state| (window, state))
        });

        if !self.focused {
            return match state {
                Some((window, _)) => windows.activate_window(window),
                None => windows.activate_app(&self.app),
            };
        }

        match state {
            Some((window, state)) if allow_minimize && state.can_minimize => {
                windows.minimize_window(window)
            }
            _ => false,
        }
    }

    /// Drop the bound window. Safe to call when already unbound.
    pub fn detach(&mut self) {
        if let Some(window) = self.window.take() {
            debug!(app = %self.app, %window, "Released player window");
        }
        self.focused = false;
    }

    fn refresh_focus(&mut self, windows: &dyn WindowSystem) -> bool {
        let Some(window) = self.window else {
            return false;
        };

        let Some(state) = windows.window_state(window) else {
            let was_focused = self.focused;
            self.detach();
            return was_focused;
        };

        if state.has_focus == self.focused {
            return false;
        }

        self.focused = state.has_focus;
        self.last_activated = self.last_activated.max(state.user_time);
        true
    }
}

impl Drop for InstanceTracker {
    fn drop(&mut self) {
        self.detach();
    }
}
