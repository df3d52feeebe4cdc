use std::{fmt, path::PathBuf, sync::LazyLock};

use bitflags::bitflags;
use regex::Regex;
use serde::Serialize;

/// Well-known bus name prefix shared by every MPRIS player.
pub const MPRIS_BUS_PREFIX: &str = "org.mpris.MediaPlayer2.";

/// Identity of one player instance: the bus name it publishes.
///
/// Unique among concurrently live players. The same name may later be
/// re-used by a different process, but only after an owner change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Create a PlayerId from a D-Bus bus name
    pub fn from_bus_name(bus_name: &str) -> Self {
        Self(bus_name.to_string())
    }

    /// Get the D-Bus bus name
    pub fn bus_name(&self) -> &str {
        &self.0
    }

    /// Trailing instance number, e.g. `3` for `org.mpris.MediaPlayer2.vlc.instance3`.
    pub fn instance_suffix(&self) -> Option<u64> {
        trailing_number(&self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static TRAILING_DIGITS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[0-9]+$").ok());

/// Parse the run of digits at the very end of `value`, if any.
///
/// Used both for player bus names and for window object paths such as
/// `/io/github/GnomeMpv/window/1`.
pub fn trailing_number(value: &str) -> Option<u64> {
    let pattern = TRAILING_DIGITS.as_ref()?;
    pattern
        .find(value)
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Current playback state of a media player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is stopped, or reported something we do not understand
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Ordinal used for ranking: Playing > Paused > Stopped.
    pub fn rank(self) -> u8 {
        match self {
            Self::Playing => 2,
            Self::Paused => 1,
            Self::Stopped => 0,
        }
    }
}

impl From<&str> for PlaybackState {
    fn from(status: &str) -> Self {
        match status {
            "Playing" => Self::Playing,
            "Paused" => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

bitflags! {
    /// Transport commands a player currently accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        /// Skip to the previous track
        const PREVIOUS = 1;
        /// Toggle play/pause, or stop when pausing is not possible
        const PLAY_PAUSE_STOP = 1 << 1;
        /// Skip to the next track
        const NEXT = 1 << 2;
        /// Bring the player's own window to the front
        const RAISE = 1 << 3;
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        names.serialize(serializer)
    }
}

/// Reference to an icon the presentation layer knows how to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IconRef {
    /// Named icon resolved through the icon theme
    Themed {
        /// Icon name, e.g. `audio-x-generic-symbolic`
        name: String,
        /// Whether the icon is a monochrome symbolic icon
        symbolic: bool,
    },
    /// Icon loaded from a file, e.g. an application's full colour icon
    File(PathBuf),
}

impl IconRef {
    /// Name of the icon used when nothing better is known.
    pub const GENERIC_AUDIO: &'static str = "audio-x-generic-symbolic";

    /// A themed symbolic icon.
    pub fn symbolic(name: impl Into<String>) -> Self {
        Self::Themed {
            name: name.into(),
            symbolic: true,
        }
    }

    /// The last-resort generic audio icon.
    pub fn generic_audio() -> Self {
        Self::symbolic(Self::GENERIC_AUDIO)
    }

    /// Whether the icon is drawn as a symbolic glyph.
    pub fn is_symbolic(&self) -> bool {
        match self {
            Self::Themed { symbolic, .. } => *symbolic,
            Self::File(_) => false,
        }
    }
}

impl Default for IconRef {
    fn default() -> Self {
        Self::generic_audio()
    }
}
