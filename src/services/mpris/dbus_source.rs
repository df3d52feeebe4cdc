use std::{collections::HashMap, future::Future};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use zbus::{Connection, names::OwnedBusName, zvariant::OwnedValue};

use crate::services::common::Property;

use super::{
    Capabilities, EngineEvent, EngineSender, MediaError, MediaPlayer2PlayerProxy,
    MediaPlayer2Proxy, PlaybackState, PlayerId, PlayerSource, SourceChange, SourceKey,
    SourceState, TrackMetadata,
};

/// MPRIS player reached over D-Bus.
///
/// A background task forwards property changes into the engine queue and
/// keeps a cached [`SourceState`] current for command decisions. The task is
/// aborted when the source is dropped.
pub struct MprisSource {
    id: PlayerId,
    key: SourceKey,
    state: Property<SourceState>,
    base: MediaPlayer2Proxy<'static>,
    player: MediaPlayer2PlayerProxy<'static>,
    monitor: JoinHandle<()>,
}

impl MprisSource {
    /// Connect to the player behind `id` and start forwarding its changes.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::DbusError` if the proxies cannot be built.
    #[instrument(skip(connection, events), fields(player = %id))]
    pub async fn connect(
        connection: &Connection,
        id: PlayerId,
        events: EngineSender,
    ) -> Result<Self, MediaError> {
        let bus_name = OwnedBusName::try_from(id.bus_name())
            .map_err(|e| MediaError::InitializationFailed(format!("Invalid bus name: {e}")))?;

        let base = MediaPlayer2Proxy::builder(connection)
            .destination(bus_name.clone())?
            .build()
            .await?;

        let player = MediaPlayer2PlayerProxy::builder(connection)
            .destination(bus_name)?
            .build()
            .await?;

        let state = Property::new(Self::read_state(&base, &player, &id).await);
        let key = SourceKey::next();

        let monitor = tokio::spawn(Self::monitor(
            id.clone(),
            key,
            base.clone(),
            player.clone(),
            state.clone(),
            events,
        ));

        Ok(Self {
            id,
            key,
            state,
            base,
            player,
            monitor,
        })
    }

    async fn read_state(
        base: &MediaPlayer2Proxy<'_>,
        player: &MediaPlayer2PlayerProxy<'_>,
        id: &PlayerId,
    ) -> SourceState {
        let identity = base
            .identity()
            .await
            .unwrap_or_else(|_| id.bus_name().to_string());
        let desktop_entry = base.desktop_entry().await.unwrap_or_default();
        let playback = player
            .playback_status()
            .await
            .map(|status| PlaybackState::from(status.as_str()))
            .unwrap_or_default();
        let metadata = player.metadata().await.unwrap_or_else(|err| {
            debug!(player = %id, "Failed to fetch metadata: {err}");
            HashMap::new()
        });
        let (capabilities, can_pause) = Self::read_capabilities(base, player).await;

        let mut state = SourceState {
            identity,
            desktop_entry,
            playback,
            capabilities,
            can_pause,
            ..SourceState::default()
        };
        state.apply(&TrackMetadata::from(&metadata).into_change(&state.identity));
        state
    }

    async fn read_capabilities(
        base: &MediaPlayer2Proxy<'_>,
        player: &MediaPlayer2PlayerProxy<'_>,
    ) -> (Capabilities, bool) {
        let can_raise = base.can_raise().await.unwrap_or(false);
        let can_control = player.can_control().await.unwrap_or(false);
        let can_play = player.can_play().await.unwrap_or(false);
        let can_pause = player.can_pause().await.unwrap_or(false);
        let can_go_next = player.can_go_next().await.unwrap_or(false);
        let can_go_previous = player.can_go_previous().await.unwrap_or(false);

        let mut capabilities = Capabilities::empty();
        capabilities.set(Capabilities::PREVIOUS, can_control && can_go_previous);
        capabilities.set(
            Capabilities::PLAY_PAUSE_STOP,
            can_control && (can_play || can_pause),
        );
        capabilities.set(Capabilities::NEXT, can_control && can_go_next);
        capabilities.set(Capabilities::RAISE, can_raise);
        (capabilities, can_pause)
    }

    #[allow(clippy::cognitive_complexity)]
    async fn monitor(
        id: PlayerId,
        key: SourceKey,
        base: MediaPlayer2Proxy<'static>,
        player: MediaPlayer2PlayerProxy<'static>,
        state: Property<SourceState>,
        events: EngineSender,
    ) {
        let mut identity_changes = base.receive_identity_changed().await;
        let mut desktop_entry_changes = base.receive_desktop_entry_changed().await;
        let mut playback_changes = player.receive_playback_status_changed().await;
        let mut metadata_changes = player.receive_metadata_changed().await;
        let mut can_next_changes = player.receive_can_go_next_changed().await;
        let mut can_previous_changes = player.receive_can_go_previous_changed().await;
        let mut can_play_changes = player.receive_can_play_changed().await;
        let mut can_pause_changes = player.receive_can_pause_changed().await;
        let mut can_raise_changes = base.receive_can_raise_changed().await;

        let emit = |change: SourceChange| {
            state.modify(|current| current.apply(&change));
            events
                .send(EngineEvent::Source {
                    id: id.clone(),
                    key,
                    change,
                })
                .is_ok()
        };

        loop {
            let change = tokio::select! {
                Some(signal) = identity_changes.next() => {
                    signal.get().await.ok().map(SourceChange::Identity)
                }
                Some(signal) = desktop_entry_changes.next() => {
                    signal.get().await.ok().map(SourceChange::DesktopEntry)
                }
                Some(signal) = playback_changes.next() => {
                    signal
                        .get()
                        .await
                        .ok()
                        .map(|status| SourceChange::Playback(PlaybackState::from(status.as_str())))
                }
                Some(signal) = metadata_changes.next() => {
                    signal
                        .get()
                        .await
                        .ok()
                        .map(|metadata: HashMap<String, OwnedValue>| {
                            TrackMetadata::from(&metadata).into_change(&state.get().identity)
                        })
                }
                Some(_) = can_next_changes.next() => Some(Self::capability_change(&base, &player).await),
                Some(_) = can_previous_changes.next() => Some(Self::capability_change(&base, &player).await),
                Some(_) = can_play_changes.next() => Some(Self::capability_change(&base, &player).await),
                Some(_) = can_pause_changes.next() => Some(Self::capability_change(&base, &player).await),
                Some(_) = can_raise_changes.next() => Some(Self::capability_change(&base, &player).await),
                else => {
                    debug!(player = %id, "Property streams ended");
                    Some(SourceChange::SelfDestruct)
                }
            };

            let Some(change) = change else {
                continue;
            };
            let finished = change == SourceChange::SelfDestruct;
            if !emit(change) || finished {
                break;
            }
        }
    }

    async fn capability_change(
        base: &MediaPlayer2Proxy<'_>,
        player: &MediaPlayer2PlayerProxy<'_>,
    ) -> SourceChange {
        let (capabilities, can_pause) = Self::read_capabilities(base, player).await;
        SourceChange::Capabilities {
            capabilities,
            can_pause,
        }
    }

    fn dispatch<F>(&self, command: &'static str, call: F) -> bool
    where
        F: Future<Output = zbus::Result<()>> + Send + 'static,
    {
        let id = self.id.clone();
        tokio::spawn(async move {
            if let Err(e) = call.await {
                warn!(player = %id, "{command} failed: {e}");
            }
        });
        true
    }
}

impl PlayerSource for MprisSource {
    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn key(&self) -> SourceKey {
        self.key
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    fn previous(&self) -> bool {
        let player = self.player.clone();
        self.dispatch("Previous", async move { player.previous().await })
    }

    fn play_pause_or_stop(&self) -> bool {
        let state = self.state.get();
        let player = self.player.clone();
        if state.playback == PlaybackState::Playing && !state.can_pause {
            self.dispatch("Stop", async move { player.stop().await })
        } else {
            self.dispatch("PlayPause", async move { player.play_pause().await })
        }
    }

    fn next(&self) -> bool {
        let player = self.player.clone();
        self.dispatch("Next", async move { player.next().await })
    }

    fn raise(&self) -> bool {
        if !self.state.get().capabilities.contains(Capabilities::RAISE) {
            return false;
        }
        let base = self.base.clone();
        self.dispatch("Raise", async move { base.raise().await })
    }
}

impl Drop for MprisSource {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}
