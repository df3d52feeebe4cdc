use std::sync::atomic::{AtomicU64, Ordering};

use super::{Capabilities, PlaybackState, PlayerId};

/// Identity of one connection to a player, distinct from its bus name.
///
/// A bus name can be re-used by a new process after an owner change; the
/// key tells the engine whether a late notification came from the source
/// it currently holds or from one it already dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(u64);

impl SourceKey {
    /// Allocate a key never handed out before in this process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything the engine reads from a player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceState {
    /// Human readable player name, e.g. `VLC media player`
    pub identity: String,
    /// Desktop entry hint without the `.desktop` suffix
    pub desktop_entry: String,
    /// Current playback state
    pub playback: PlaybackState,
    /// Track artist, falling back to the player identity
    pub artist: String,
    /// Track title
    pub title: String,
    /// Cover art URI of the current track
    pub cover_uri: Option<String>,
    /// Symbolic icon hinting at the media type of the current track
    pub mimetype_icon: Option<String>,
    /// Transport commands currently accepted
    pub capabilities: Capabilities,
    /// Whether pausing is possible; when it is not, play/pause becomes stop
    pub can_pause: bool,
}

/// A change to one field of [`SourceState`], or the end of the source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange {
    /// Player identity changed
    Identity(String),
    /// Desktop entry hint changed
    DesktopEntry(String),
    /// Playback state changed
    Playback(PlaybackState),
    /// Track changed
    Track {
        /// New artist
        artist: String,
        /// New title
        title: String,
        /// New cover art URI
        cover_uri: Option<String>,
        /// New mimetype icon hint
        mimetype_icon: Option<String>,
    },
    /// Capability flags changed
    Capabilities {
        /// New capability flags
        capabilities: Capabilities,
        /// Whether pausing is possible
        can_pause: bool,
    },
    /// The source can no longer be used and its record must go away
    SelfDestruct,
}

/// Connection to one remote player.
///
/// Command methods do not wait for the player: they return `true` once the
/// command has been dispatched and `false` when it could not be sent at all.
/// Failures reported later by the player are logged and otherwise ignored.
///
/// Dropping a source must release everything it holds, including any
/// background task that forwards property changes.
pub trait PlayerSource: Send {
    /// Bus name of the player.
    fn id(&self) -> &PlayerId;

    /// Key identifying this particular connection.
    fn key(&self) -> SourceKey;

    /// Current snapshot of the player's properties.
    fn state(&self) -> SourceState;

    /// Skip to the previous track.
    fn previous(&self) -> bool;

    /// Toggle play/pause, or stop a player that cannot pause.
    fn play_pause_or_stop(&self) -> bool;

    /// Skip to the next track.
    fn next(&self) -> bool;

    /// Ask the player to show its own window.
    fn raise(&self) -> bool;
}

impl SourceState {
    /// Fold `change` into this snapshot.
    pub fn apply(&mut self, change: &SourceChange) {
        match change {
            SourceChange::Identity(identity) => {
                if self.artist == self.identity {
                    self.artist.clone_from(identity);
                }
                self.identity.clone_from(identity);
            }
            SourceChange::DesktopEntry(entry) => self.desktop_entry.clone_from(entry),
            SourceChange::Playback(playback) => self.playback = *playback,
            SourceChange::Track {
                artist,
                title,
                cover_uri,
                mimetype_icon,
            } => {
                self.artist.clone_from(artist);
                self.title.clone_from(title);
                self.cover_uri.clone_from(cover_uri);
                self.mimetype_icon.clone_from(mimetype_icon);
            }
            SourceChange::Capabilities {
                capabilities,
                can_pause,
            } => {
                self.capabilities = *capabilities;
                self.can_pause = *can_pause;
            }
            SourceChange::SelfDestruct => {}
        }
    }
}
