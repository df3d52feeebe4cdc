use std::sync::Arc;

use tracing::debug;

use super::{
    ActivityKey, Capabilities, CoverArt, EngineSender, IconRef, IconTheme, ImageLoader,
    PlaybackState, PlayerId, PlayerSource, SourceChange, SourceKey, SourceOrigin,
    icon::{mimetype_icon, symbolic_player_icon},
    window::{InstanceTracker, WindowEvent, WindowSystem, resolve_application},
};

/// What a source change touched, so the registry knows what to announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordUpdate {
    /// The player's icon changed
    pub icon_changed: bool,
    /// The record's [`ActivityKey`] changed
    pub ranking_changed: bool,
    /// The source asked to be destroyed
    pub destroyed: bool,
}

/// Shared collaborators a record needs while handling changes.
#[derive(Clone)]
pub struct RecordContext {
    /// Window and application registry
    pub windows: Arc<dyn WindowSystem>,
    /// Icon theme
    pub icons: Arc<dyn IconTheme>,
    /// Cover art transport
    pub loader: Arc<dyn ImageLoader>,
    /// Engine queue, for fetch completions
    pub events: EngineSender,
}

/// One live player: its remote state joined with its window.
pub struct PlayerRecord {
    source: Box<dyn PlayerSource>,
    id: PlayerId,
    key: SourceKey,
    origin: SourceOrigin,
    identity: String,
    desktop_entry: String,
    artist: String,
    title: String,
    cover_uri: Option<String>,
    mimetype_icon: Option<String>,
    playback: PlaybackState,
    status_changed_at: u64,
    capabilities: Capabilities,
    can_pause: bool,
    icon: IconRef,
    cover: CoverArt,
    tracker: Option<InstanceTracker>,
    // Activation time carried over from trackers this record has dropped.
    activated_before: u64,
}

impl PlayerRecord {
    /// Build a record from a freshly connected source.
    ///
    /// Mirrors the source's current state, resolves its application and
    /// starts fetching its cover art.
    pub fn new(
        source: Box<dyn PlayerSource>,
        origin: SourceOrigin,
        status_changed_at: u64,
        ctx: &RecordContext,
    ) -> Self {
        let id = source.id().clone();
        let key = source.key();
        let state = source.state();
        let cover = CoverArt::new(id.clone(), key, Arc::clone(&ctx.loader), ctx.events.clone());

        let mut record = Self {
            source,
            id,
            key,
            origin,
            identity: state.identity,
            desktop_entry: state.desktop_entry,
            artist: state.artist,
            title: state.title,
            cover_uri: state.cover_uri,
            mimetype_icon: state.mimetype_icon,
            playback: state.playback,
            status_changed_at,
            capabilities: state.capabilities,
            can_pause: state.can_pause,
            icon: IconRef::generic_audio(),
            cover,
            tracker: None,
            activated_before: 0,
        };

        record.resolve_application(ctx);
        record.refresh_icon(ctx);
        record.cover.set_target(record.cover_uri.as_deref());
        record
    }

    /// Bus name of the player.
    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// Connection this record was built from.
    pub fn key(&self) -> SourceKey {
        self.key
    }

    /// Process behind the player, when known.
    pub fn pid(&self) -> Option<u32> {
        self.origin.pid
    }

    /// Human readable player name.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Desktop entry hint published by the player.
    pub fn desktop_entry(&self) -> &str {
        &self.desktop_entry
    }

    /// Track artist.
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Track title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Playback state.
    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Ordinal of the playback state, higher is more relevant.
    pub fn playback_rank(&self) -> u8 {
        self.playback.rank()
    }

    /// Tick at which the playback state last changed.
    pub fn status_changed_at(&self) -> u64 {
        self.status_changed_at
    }

    /// Transport commands currently accepted.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Icon chosen by [`refresh_icon`](Self::refresh_icon).
    pub fn icon(&self) -> &IconRef {
        &self.icon
    }

    /// Cover slot of this player.
    pub fn cover(&self) -> &CoverArt {
        &self.cover
    }

    /// Whether this player's window has focus.
    pub fn focused(&self) -> bool {
        self.tracker.as_ref().is_some_and(InstanceTracker::focused)
    }

    /// User time of the player's window when focus last changed.
    ///
    /// Never decreases, even when the player moves to another application.
    pub fn last_activated(&self) -> u64 {
        self.tracker
            .as_ref()
            .map_or(0, InstanceTracker::last_activated)
            .max(self.activated_before)
    }

    /// Whether an application was found for this player.
    pub fn has_application(&self) -> bool {
        self.tracker.is_some()
    }

    /// Sort key used by the arbiter.
    pub fn activity_key(&self) -> ActivityKey {
        ActivityKey {
            focused: self.focused(),
            playback_rank: self.playback_rank(),
            last_activated: self.last_activated(),
            status_changed_at: self.status_changed_at,
        }
    }

    /// Icon for the play/pause button.
    pub fn play_pause_icon_name(&self) -> &'static str {
        match (self.playback, self.can_pause) {
            (PlaybackState::Playing, true) => "media-playback-pause-symbolic",
            (PlaybackState::Playing, false) => "media-playback-stop-symbolic",
            _ => "media-playback-start-symbolic",
        }
    }

    /// Whether a separate stop button makes sense.
    pub fn show_stop(&self) -> bool {
        self.playback == PlaybackState::Playing && self.can_pause
    }

    /// Accessible name for the row.
    ///
    /// Empty when the artist already fell back to the player's identity, so
    /// screen readers do not announce it twice.
    pub fn accessible_name(&self) -> &str {
        if self.artist == self.identity {
            ""
        } else {
            &self.identity
        }
    }

    /// Skip to the previous track. `false` when the player cannot.
    pub fn previous(&self) -> bool {
        self.capabilities.contains(Capabilities::PREVIOUS) && self.source.previous()
    }

    /// Toggle playback. `false` when the player cannot.
    pub fn play_pause_or_stop(&self) -> bool {
        self.capabilities.contains(Capabilities::PLAY_PAUSE_STOP)
            && self.source.play_pause_or_stop()
    }

    /// Skip to the next track. `false` when the player cannot.
    pub fn next(&self) -> bool {
        self.capabilities.contains(Capabilities::NEXT) && self.source.next()
    }

    /// Focus the player, or minimize it when it already has focus.
    ///
    /// Without a known application the player is asked to raise itself,
    /// if it can. Returns whether anything was done.
    pub fn activate_or_minimize(&self, allow_minimize: bool, windows: &dyn WindowSystem) -> bool {
        match &self.tracker {
            Some(tracker) => tracker.toggle_window(allow_minimize, windows),
            None => self.capabilities.contains(Capabilities::RAISE) && self.source.raise(),
        }
    }

    /// Recompute the icon: symbolic player icon, then the application's
    /// full colour icon, then the track's media type icon.
    ///
    /// Returns `true` only when the icon actually changed.
    pub fn refresh_icon(&mut self, ctx: &RecordContext) -> bool {
        let icon = symbolic_player_icon(ctx.icons.as_ref(), &self.desktop_entry)
            .or_else(|| {
                self.tracker
                    .as_ref()
                    .and_then(|tracker| ctx.windows.app_icon(tracker.app()))
            })
            .unwrap_or_else(|| mimetype_icon(self.mimetype_icon.as_deref()));

        if icon == self.icon {
            return false;
        }

        debug!(player = %self.id, ?icon, "Player icon changed");
        self.icon = icon.clone();
        self.cover.set_fallback_icon(icon);
        true
    }

    /// Mirror a change reported by the source.
    ///
    /// `tick` stamps a playback state change.
    pub fn apply(&mut self, change: SourceChange, tick: u64, ctx: &RecordContext) -> RecordUpdate {
        let mut update = RecordUpdate::default();
        let ranking = self.activity_key();

        match change {
            SourceChange::Identity(identity) => {
                if self.artist == self.identity {
                    self.artist.clone_from(&identity);
                }
                self.identity = identity;
            }
            SourceChange::DesktopEntry(entry) => {
                if entry != self.desktop_entry {
                    self.desktop_entry = entry;
                    self.resolve_application(ctx);
                    update.icon_changed = self.refresh_icon(ctx);
                }
            }
            SourceChange::Playback(playback) => {
                if playback != self.playback {
                    self.playback = playback;
                    self.status_changed_at = self.status_changed_at.max(tick);
                }
            }
            SourceChange::Track {
                artist,
                title,
                cover_uri,
                mimetype_icon,
            } => {
                self.artist = artist;
                self.title = title;
                if cover_uri != self.cover_uri {
                    self.cover.set_target(cover_uri.as_deref());
                    self.cover_uri = cover_uri;
                }
                if mimetype_icon != self.mimetype_icon {
                    self.mimetype_icon = mimetype_icon;
                    update.icon_changed = self.refresh_icon(ctx);
                }
            }
            SourceChange::Capabilities {
                capabilities,
                can_pause,
            } => {
                self.capabilities = capabilities;
                self.can_pause = can_pause;
            }
            SourceChange::SelfDestruct => {
                update.destroyed = true;
            }
        }

        update.ranking_changed = self.activity_key() != ranking;
        update
    }

    /// Route a window system notification to this record's tracker.
    ///
    /// Returns `true` when the player's focus changed.
    pub fn on_window_event(&mut self, event: &WindowEvent, windows: &dyn WindowSystem) -> bool {
        let Some(tracker) = self.tracker.as_mut() else {
            return false;
        };

        match event {
            WindowEvent::WindowsChanged(app) if app == tracker.app() => {
                tracker.on_windows_changed(windows)
            }
            WindowEvent::WindowsChanged(_) => false,
            WindowEvent::FocusChanged(window) => tracker.on_focus_changed(*window, windows),
            WindowEvent::WindowRemoved(window) => tracker.on_window_removed(*window),
        }
    }

    /// Forward row hover to the cover slot.
    pub fn on_hover(&mut self, hover: bool) {
        self.cover.on_parent_hover(hover);
    }

    /// Apply a finished cover fetch. Returns `true` when the cover changed.
    pub fn on_cover_loaded(
        &mut self,
        generation: u64,
        result: Result<Arc<[u8]>, super::FetchError>,
    ) -> bool {
        self.cover.complete(generation, result)
    }

    fn resolve_application(&mut self, ctx: &RecordContext) {
        if let Some(mut previous) = self.tracker.take() {
            self.activated_before = self.activated_before.max(previous.last_activated());
            previous.detach();
        }

        let Some(app) = resolve_application(
            ctx.windows.as_ref(),
            &self.desktop_entry,
            &self.identity,
        ) else {
            return;
        };

        self.tracker = Some(InstanceTracker::new(
            app,
            self.origin.pid,
            self.origin.owner.clone(),
            self.id.instance_suffix(),
            ctx.windows.as_ref(),
        ));
    }
}

impl Drop for PlayerRecord {
    fn drop(&mut self) {
        debug!(player = %self.id, "Releasing player record");
        self.cover.cancel();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.detach();
        }
    }
}

/// Read-only snapshot of a record for the presentation layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlayerView {
    /// Bus name of the player
    pub id: PlayerId,
    /// Human readable player name
    pub identity: String,
    /// Track artist
    pub artist: String,
    /// Track title
    pub title: String,
    /// Playback state
    pub playback: PlaybackState,
    /// Player icon
    pub icon: IconRef,
    /// Whether real cover art is showing
    pub has_cover_art: bool,
    /// Opacity of the cover slot
    pub cover_opacity: u8,
    /// Transport commands currently accepted
    pub capabilities: Capabilities,
    /// Icon for the play/pause button
    pub play_pause_icon: &'static str,
    /// Whether a separate stop button is shown
    pub show_stop: bool,
    /// Accessible name of the row
    pub accessible_name: String,
    /// Whether the player's window has focus
    pub focused: bool,
}

impl From<&PlayerRecord> for PlayerView {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            id: record.id.clone(),
            identity: record.identity.clone(),
            artist: record.artist.clone(),
            title: record.title.clone(),
            playback: record.playback,
            icon: record.icon.clone(),
            has_cover_art: matches!(record.cover.image(), super::CoverImage::Art(_)),
            cover_opacity: record.cover.opacity(),
            capabilities: record.capabilities,
            play_pause_icon: record.play_pause_icon_name(),
            show_stop: record.show_stop(),
            accessible_name: record.accessible_name().to_string(),
            focused: record.focused(),
        }
    }
}
