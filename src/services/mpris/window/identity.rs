use tracing::debug;

use super::{AppId, WindowSystem};

/// Find the application behind a player, best effort.
///
/// Players frequently publish a desktop entry that does not match their
/// actual `.desktop` file (flatpaks and snaps especially), so several
/// lookups are tried in turn:
///
/// 1. exact desktop id `<desktop_entry>.desktop`
/// 2. startup WM class equal to the player identity
/// 3. a running application whose name equals the identity, ignoring case
/// 4. keyword search on the desktop entry, keeping the first hit whose name
///    equals the identity, ignoring case
///
/// `None` is a normal outcome; the player then simply has no window.
pub fn resolve_application(
    windows: &dyn WindowSystem,
    desktop_entry: &str,
    identity: &str,
) -> Option<AppId> {
    let identity_lower = identity.to_lowercase();
    let name_matches = |app: &AppId| {
        windows
            .app_name(app)
            .is_some_and(|name| name.to_lowercase() == identity_lower)
    };

    let by_desktop_id = || {
        (!desktop_entry.is_empty())
            .then(|| windows.lookup_app(&format!("{desktop_entry}.desktop")))
            .flatten()
    };
    let by_wm_class = || {
        (!identity.is_empty())
            .then(|| windows.lookup_startup_wm_class(identity))
            .flatten()
    };
    let by_running_name = || {
        (!identity.is_empty())
            .then(|| windows.running_apps().into_iter().find(|app| name_matches(app)))
            .flatten()
    };
    let by_search = || {
        if desktop_entry.is_empty() {
            return None;
        }
        windows
            .search_apps(desktop_entry)
            .into_iter()
            .filter_map(|group| group.into_iter().next())
            .filter_map(|desktop_id| windows.lookup_app(&desktop_id))
            .find(|app| name_matches(app))
    };

    let app = by_desktop_id()
        .or_else(by_wm_class)
        .or_else(by_running_name)
        .or_else(by_search);

    match &app {
        Some(app) => debug!(desktop_entry, identity, %app, "Resolved player application"),
        None => debug!(desktop_entry, identity, "No application found for player"),
    }

    app
}
