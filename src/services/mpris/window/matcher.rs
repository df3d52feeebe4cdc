use super::WindowCandidate;

/// Pick the window that most plausibly belongs to one player instance.
///
/// Only normal top level windows are eligible. Each candidate is judged by
/// the strongest hint it exposes, and the first candidate that passes wins:
///
/// 1. object path suffix, when both sides have one, must equal `instance_suffix`
/// 2. otherwise a unique bus name, when the window has one, must equal `unique_bus_name`
/// 3. otherwise the window's pid must equal `pid`
///
/// A window that exposes a stronger hint which does not match is rejected
/// outright rather than being compared on a weaker one. When nothing
/// matches, the first eligible window is returned.
pub fn match_window<'a>(
    candidates: &'a [WindowCandidate],
    pid: Option<u32>,
    unique_bus_name: Option<&str>,
    instance_suffix: Option<u64>,
) -> Option<&'a WindowCandidate> {
    let mut eligible = candidates.iter().filter(|w| w.normal_top_level).peekable();
    let first = eligible.peek().copied();

    eligible
        .find(|window| {
            if let (Some(wanted), Some(found)) = (instance_suffix, window.object_path_suffix) {
                wanted == found
            } else if let Some(bus_name) = window.unique_bus_name.as_deref() {
                unique_bus_name == Some(bus_name)
            } else {
                pid == Some(window.pid)
            }
        })
        .or(first)
}
