use std::{env, path::PathBuf};

use super::IconRef;

/// Icon theme lookups needed to choose player icons.
pub trait IconTheme: Send + Sync {
    /// Whether the current theme provides an icon called `name`.
    fn has_icon(&self, name: &str) -> bool;
}

/// Icon theme backed by the XDG icon directories on disk.
///
/// Only checks whether a file for the icon exists in one of a few common
/// locations; it does not parse theme index files.
#[derive(Debug, Clone)]
pub struct XdgIconTheme {
    roots: Vec<PathBuf>,
    themes: Vec<String>,
}

impl XdgIconTheme {
    const EXTENSIONS: [&'static str; 2] = ["svg", "png"];
    const SUBDIRS: [&'static str; 4] = [
        "symbolic/apps",
        "scalable/apps",
        "scalable/status",
        "scalable/mimetypes",
    ];

    /// Search the standard data directories for `theme` and `hicolor`.
    pub fn new(theme: impl Into<String>) -> Self {
        let mut roots = Vec::new();
        if let Ok(home) = env::var("HOME") {
            roots.push(PathBuf::from(&home).join(".local/share/icons"));
            roots.push(PathBuf::from(home).join(".icons"));
        }
        let data_dirs =
            env::var("XDG_DATA_DIRS").unwrap_or_else(|_| "/usr/local/share:/usr/share".to_string());
        roots.extend(
            data_dirs
                .split(':')
                .filter(|dir| !dir.is_empty())
                .map(|dir| PathBuf::from(dir).join("icons")),
        );

        Self {
            roots,
            themes: vec![theme.into(), "hicolor".to_string()],
        }
    }
}

impl Default for XdgIconTheme {
    fn default() -> Self {
        Self::new("Adwaita")
    }
}

impl IconTheme for XdgIconTheme {
    fn has_icon(&self, name: &str) -> bool {
        self.roots.iter().any(|root| {
            self.themes.iter().any(|theme| {
                Self::SUBDIRS.iter().any(|subdir| {
                    Self::EXTENSIONS.iter().any(|ext| {
                        root.join(theme)
                            .join(subdir)
                            .join(format!("{name}.{ext}"))
                            .is_file()
                    })
                })
            })
        })
    }
}

/// Symbolic icon for a player, derived from its desktop entry.
///
/// Spotify installs `spotify-client` icons while publishing `spotify` as
/// its desktop entry, so both spellings are tried for it.
pub fn symbolic_player_icon(theme: &dyn IconTheme, desktop_entry: &str) -> Option<IconRef> {
    if desktop_entry.is_empty() {
        return None;
    }

    let mut names = vec![format!("{desktop_entry}-symbolic")];
    if desktop_entry.eq_ignore_ascii_case("spotify") {
        names.push(format!("{desktop_entry}-client-symbolic"));
    }

    names
        .into_iter()
        .find(|name| theme.has_icon(name))
        .map(IconRef::symbolic)
}

/// Icon hinting at the media type of the current track.
pub fn mimetype_icon(hint: Option<&str>) -> IconRef {
    match hint {
        Some(name) if !name.is_empty() => IconRef::symbolic(name),
        _ => IconRef::generic_audio(),
    }
}
