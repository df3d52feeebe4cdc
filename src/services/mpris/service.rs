use std::{sync::Arc, time::Duration};

use futures::Stream;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};
use zbus::Connection;

use crate::services::common::Property;

use super::{
    EngineEvent, EngineSender, IconRef, IconTheme, ImageLoader, IndicatorEvent, IndicatorInput,
    InputOutcome, MediaError, PlayerDiscovery, PlayerId, PlayerSource, PlayerView, RecordContext,
    RowInput, SourceChange, SourceKey, SourceLifecycle, SourceOrigin, UriLoader,
    registry::Registry,
    window::{AppId, WindowEvent, WindowId, WindowSystem},
};

const NOTIFICATION_CAPACITY: usize = 64;

/// Configuration for the indicator engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Patterns to ignore when discovering players
    pub ignored_players: Vec<String>,
    /// Allow `http(s)://` cover art
    pub remote_covers: bool,
    /// Upper bound on a single cover fetch
    pub cover_timeout: Duration,
    /// Secondary click may minimize a focused player
    pub allow_minimize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignored_players: Vec::new(),
            remote_covers: true,
            cover_timeout: Duration::from_millis(5000),
            allow_minimize: true,
        }
    }
}

/// Handle the external collaborators use to push notifications into the
/// engine.
///
/// Every method only queues; the engine applies queued notifications one at
/// a time in the order they were sent. All methods fail with
/// `MediaError::EngineStopped` once the engine is gone.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    events: EngineSender,
}

impl EngineNotifier {
    fn send(&self, event: EngineEvent) -> Result<(), MediaError> {
        self.events.send(event).map_err(|_| MediaError::EngineStopped)
    }

    /// A player published its bus name.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn source_appeared(
        &self,
        source: Box<dyn PlayerSource>,
        origin: SourceOrigin,
    ) -> Result<(), MediaError> {
        self.send(EngineEvent::Lifecycle(SourceLifecycle::Appeared {
            source,
            origin,
        }))
    }

    /// A player released its bus name.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn source_vanished(&self, id: PlayerId) -> Result<(), MediaError> {
        self.send(EngineEvent::Lifecycle(SourceLifecycle::Vanished(id)))
    }

    /// A bus name moved to a different process.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn owner_changed(
        &self,
        source: Box<dyn PlayerSource>,
        origin: SourceOrigin,
    ) -> Result<(), MediaError> {
        self.send(EngineEvent::Lifecycle(SourceLifecycle::OwnerChanged {
            source,
            origin,
        }))
    }

    /// A player's properties changed.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn source_changed(
        &self,
        id: PlayerId,
        key: SourceKey,
        change: SourceChange,
    ) -> Result<(), MediaError> {
        self.send(EngineEvent::Source { id, key, change })
    }

    /// The window set of an application changed.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn windows_changed(&self, app: AppId) -> Result<(), MediaError> {
        self.send(EngineEvent::Window(WindowEvent::WindowsChanged(app)))
    }

    /// A window gained or lost focus.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn focus_changed(&self, window: WindowId) -> Result<(), MediaError> {
        self.send(EngineEvent::Window(WindowEvent::FocusChanged(window)))
    }

    /// A window is being destroyed.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn window_removed(&self, window: WindowId) -> Result<(), MediaError> {
        self.send(EngineEvent::Window(WindowEvent::WindowRemoved(window)))
    }

    /// The icon theme changed.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn theme_changed(&self) -> Result<(), MediaError> {
        self.send(EngineEvent::ThemeChanged)
    }

    /// The pointer entered or left a player's row.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub fn row_hover(&self, id: PlayerId, hover: bool) -> Result<(), MediaError> {
        self.send(EngineEvent::RowHover { id, hover })
    }
}

/// Media indicator engine with reactive property-based outputs.
///
/// One task owns the player registry and applies queued notifications to
/// it strictly in order. After each one it republishes the player list,
/// the active player and the indicator icon, then broadcasts the
/// [`IndicatorEvent`]s it produced.
pub struct MprisIndicator {
    notifier: EngineNotifier,
    active_player: Property<Option<PlayerView>>,
    players: Property<Vec<PlayerView>>,
    indicator_icon: Property<Option<IconRef>>,
    notifications: broadcast::Sender<IndicatorEvent>,
    engine: JoinHandle<()>,
    discovery: Mutex<Option<JoinHandle<()>>>,
}

impl MprisIndicator {
    /// Start the engine and discover players on the session bus.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::InitializationFailed` if the D-Bus connection or
    /// player discovery fails
    #[instrument(skip(config, windows, icons))]
    pub async fn start(
        config: Config,
        windows: Arc<dyn WindowSystem>,
        icons: Arc<dyn IconTheme>,
    ) -> Result<Self, MediaError> {
        info!("Starting MPRIS indicator");

        let connection = Connection::session().await.map_err(|e| {
            MediaError::InitializationFailed(format!("D-Bus connection failed: {e}"))
        })?;

        let loader = Arc::new(UriLoader::new(config.remote_covers, config.cover_timeout));
        let ignored_players = config.ignored_players.clone();
        let mut indicator = Self::new(config, windows, icons, loader);

        let discovery = PlayerDiscovery::new(
            connection,
            indicator.notifier.events.clone(),
            ignored_players,
        );
        match discovery.start().await {
            Ok(task) => indicator.attach_discovery(task),
            Err(e) => {
                indicator.stop().await;
                return Err(e);
            }
        }

        Ok(indicator)
    }

    /// Start the engine without any protocol client attached.
    ///
    /// Players are fed in through [`notifier`](Self::notifier).
    pub fn new(
        config: Config,
        windows: Arc<dyn WindowSystem>,
        icons: Arc<dyn IconTheme>,
        loader: Arc<dyn ImageLoader>,
    ) -> Self {
        let (events, queue) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let ctx = RecordContext {
            windows,
            icons,
            loader,
            events: events.clone(),
        };

        let outputs = Outputs {
            active_player: Property::new(None),
            players: Property::new(Vec::new()),
            indicator_icon: Property::new(None),
            notifications: notifications.clone(),
        };

        let indicator = Self {
            notifier: EngineNotifier { events },
            active_player: outputs.active_player.clone(),
            players: outputs.players.clone(),
            indicator_icon: outputs.indicator_icon.clone(),
            notifications,
            engine: tokio::spawn(run_engine(
                Registry::new(ctx, config.allow_minimize),
                queue,
                outputs,
            )),
            discovery: Mutex::new(None),
        };

        debug!("Indicator engine running");
        indicator
    }

    /// Hand over the task that feeds player lifecycle into the engine.
    ///
    /// It is aborted by [`stop`](Self::stop) and on drop.
    pub(crate) fn attach_discovery(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.discovery.get_mut().replace(task) {
            previous.abort();
        }
    }

    /// Handle for pushing collaborator notifications.
    pub fn notifier(&self) -> EngineNotifier {
        self.notifier.clone()
    }

    /// Get the player that currently drives the indicator.
    pub fn active_player(&self) -> Option<PlayerView> {
        self.active_player.get()
    }

    /// Get a stream that emits whenever the active player or its state changes.
    pub fn active_player_monitored(&self) -> impl Stream<Item = Option<PlayerView>> + Send {
        self.active_player.watch()
    }

    /// Get all live players in the order they appeared.
    pub fn players(&self) -> Vec<PlayerView> {
        self.players.get()
    }

    /// Get a stream that emits the player list whenever it changes.
    pub fn players_monitored(&self) -> impl Stream<Item = Vec<PlayerView>> + Send {
        self.players.watch()
    }

    /// Get the indicator icon, `None` while the indicator is hidden.
    pub fn indicator_icon(&self) -> Option<IconRef> {
        self.indicator_icon.get()
    }

    /// Get a stream that emits the indicator icon whenever it changes.
    pub fn indicator_icon_monitored(&self) -> impl Stream<Item = Option<IconRef>> + Send {
        self.indicator_icon.watch()
    }

    /// Whether the indicator should be shown at all.
    pub fn is_visible(&self) -> bool {
        self.indicator_icon.get().is_some()
    }

    /// Get a stream of notifications for the presentation layer.
    ///
    /// Only notifications produced after subscribing are delivered.
    pub fn events(&self) -> impl Stream<Item = IndicatorEvent> + Send + use<> {
        let mut notifications = self.notifications.subscribe();
        async_stream::stream! {
            loop {
                match notifications.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Indicator event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Route raw input on the indicator button to the active player.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub async fn send_input(&self, input: IndicatorInput) -> Result<InputOutcome, MediaError> {
        let (reply, outcome) = oneshot::channel();
        self.notifier.send(EngineEvent::Input { input, reply })?;
        outcome.await.map_err(|_| MediaError::EngineStopped)
    }

    /// Route input on a player's row to that player.
    ///
    /// # Errors
    /// Returns `MediaError::EngineStopped` if the engine is no longer running
    pub async fn send_row_input(
        &self,
        id: PlayerId,
        input: RowInput,
    ) -> Result<InputOutcome, MediaError> {
        let (reply, outcome) = oneshot::channel();
        self.notifier
            .send(EngineEvent::RowInput { id, input, reply })?;
        outcome.await.map_err(|_| MediaError::EngineStopped)
    }

    /// Drop every player and end the engine.
    ///
    /// Returns once player discovery, all records, window observers and
    /// cover fetches have been released. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let discovery = self.discovery.lock().await.take();
        if let Some(discovery) = discovery {
            discovery.abort();
            let _ = discovery.await;
            debug!("Player discovery released");
        }

        let (ack, stopped) = oneshot::channel();
        if self.notifier.send(EngineEvent::Stop(ack)).is_err() {
            debug!("Indicator engine already stopped");
            return;
        }
        let _ = stopped.await;
        info!("MPRIS indicator stopped");
    }
}

impl Drop for MprisIndicator {
    fn drop(&mut self) {
        if let Some(discovery) = self.discovery.get_mut().take() {
            discovery.abort();
        }
        self.engine.abort();
    }
}

struct Outputs {
    active_player: Property<Option<PlayerView>>,
    players: Property<Vec<PlayerView>>,
    indicator_icon: Property<Option<IconRef>>,
    notifications: broadcast::Sender<IndicatorEvent>,
}

impl Outputs {
    fn publish(&self, registry: &mut Registry) {
        self.players.set(registry.views());
        self.active_player
            .set(registry.pick_active().map(PlayerView::from));
        self.indicator_icon.set(registry.indicator_icon());

        for event in registry.take_events() {
            let _ = self.notifications.send(event);
        }
    }
}

async fn run_engine(
    mut registry: Registry,
    mut queue: mpsc::UnboundedReceiver<EngineEvent>,
    outputs: Outputs,
) {
    while let Some(event) = queue.recv().await {
        match event {
            EngineEvent::Lifecycle(SourceLifecycle::Appeared { source, origin }) => {
                registry.source_appeared(source, origin);
            }
            EngineEvent::Lifecycle(SourceLifecycle::Vanished(id)) => {
                registry.source_vanished(&id);
            }
            EngineEvent::Lifecycle(SourceLifecycle::OwnerChanged { source, origin }) => {
                registry.owner_changed(source, origin);
            }
            EngineEvent::Source { id, key, change } => {
                registry.on_source_change(&id, key, change);
            }
            EngineEvent::Window(event) => registry.on_window_event(&event),
            EngineEvent::ThemeChanged => registry.on_theme_changed(),
            EngineEvent::CoverLoaded {
                id,
                key,
                generation,
                result,
            } => registry.on_cover_loaded(&id, key, generation, result),
            EngineEvent::RowHover { id, hover } => registry.on_row_hover(&id, hover),
            EngineEvent::Input { input, reply } => {
                let _ = reply.send(registry.on_input(input));
            }
            EngineEvent::RowInput { id, input, reply } => {
                let _ = reply.send(registry.on_row_input(&id, input));
            }
            EngineEvent::Stop(ack) => {
                registry.clear();
                outputs.publish(&mut registry);
                drop(registry);
                queue.close();
                let _ = ack.send(());
                return;
            }
        }

        outputs.publish(&mut registry);
    }
}
