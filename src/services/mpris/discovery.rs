use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use zbus::{Connection, fdo, names::BusName};

use super::{
    EngineEvent, EngineSender, MPRIS_BUS_PREFIX, MediaError, MprisSource, PlayerId,
    PlayerSource, SourceLifecycle, SourceOrigin,
};

/// What a `NameOwnerChanged` signal means for a tracked player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameChange {
    /// The name gained its first owner
    Appeared {
        /// Player behind the name
        id: PlayerId,
        /// Unique name of the new owner
        owner: String,
    },
    /// The name lost its owner
    Vanished(PlayerId),
    /// The name moved straight from one owner to another
    OwnerChanged {
        /// Player behind the name
        id: PlayerId,
        /// Unique name of the new owner
        owner: String,
    },
}

/// Whether `bus_name` is an MPRIS player not excluded by `ignored_players`.
///
/// Ignore patterns match anywhere in the bus name.
pub fn is_tracked(bus_name: &str, ignored_players: &[String]) -> bool {
    bus_name.starts_with(MPRIS_BUS_PREFIX)
        && !ignored_players
            .iter()
            .any(|pattern| bus_name.contains(pattern.as_str()))
}

/// Translate one `NameOwnerChanged` signal.
///
/// `None` for names that are not tracked and for signals with neither an
/// old nor a new owner.
pub fn classify_name_change(
    bus_name: &str,
    had_owner: bool,
    new_owner: Option<String>,
    ignored_players: &[String],
) -> Option<NameChange> {
    if !is_tracked(bus_name, ignored_players) {
        return None;
    }

    let id = PlayerId::from_bus_name(bus_name);
    match (had_owner, new_owner) {
        (true, None) => Some(NameChange::Vanished(id)),
        (false, Some(owner)) => Some(NameChange::Appeared { id, owner }),
        (true, Some(owner)) => Some(NameChange::OwnerChanged { id, owner }),
        (false, None) => None,
    }
}

/// Watches the session bus for MPRIS players coming and going.
///
/// Every lifecycle change is turned into a connected source before it is
/// queued, one name at a time, so the engine sees them in bus order.
#[derive(Clone)]
pub struct PlayerDiscovery {
    connection: Connection,
    events: EngineSender,
    ignored_players: Vec<String>,
}

impl PlayerDiscovery {
    /// Create a discovery handler feeding `events`.
    pub fn new(connection: Connection, events: EngineSender, ignored_players: Vec<String>) -> Self {
        Self {
            connection,
            events,
            ignored_players,
        }
    }

    /// Subscribe to name changes, then announce the players already on the bus.
    ///
    /// The returned task runs until aborted or until the engine goes away.
    ///
    /// # Errors
    /// Returns error if D-Bus proxy creation, signal subscription or name
    /// listing fails
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<JoinHandle<()>, MediaError> {
        info!("Starting MPRIS player discovery");
        let dbus_proxy = fdo::DBusProxy::new(&self.connection)
            .await
            .map_err(|e| MediaError::InitializationFailed(format!("DBus proxy failed: {e}")))?;

        let mut name_owner_changed =
            dbus_proxy.receive_name_owner_changed().await.map_err(|e| {
                MediaError::InitializationFailed(format!("Signal subscription failed: {e}"))
            })?;

        let existing = dbus_proxy
            .list_names()
            .await
            .map_err(|e| MediaError::DbusError(e.into()))?;

        let discovery = self.clone();
        let task = tokio::spawn(async move {
            for name in existing {
                if !discovery.is_tracked(name.as_str()) {
                    continue;
                }
                let id = PlayerId::from_bus_name(name.as_str());
                let owner = discovery.name_owner(&dbus_proxy, &id).await;
                if !discovery.announce_appeared(&dbus_proxy, id, owner, false).await {
                    return;
                }
            }
            debug!("Finished announcing existing players");

            while let Some(signal) = name_owner_changed.next().await {
                let Ok(args) = signal.args().map_err(MediaError::DbusError) else {
                    continue;
                };

                let change = classify_name_change(
                    args.name().as_str(),
                    (**args.old_owner()).is_some(),
                    (**args.new_owner()).as_ref().map(ToString::to_string),
                    &discovery.ignored_players,
                );

                let delivered = match change {
                    Some(NameChange::Vanished(id)) => discovery
                        .events
                        .send(EngineEvent::Lifecycle(SourceLifecycle::Vanished(id)))
                        .is_ok(),
                    Some(NameChange::Appeared { id, owner }) => {
                        discovery
                            .announce_appeared(&dbus_proxy, id, Some(owner), false)
                            .await
                    }
                    Some(NameChange::OwnerChanged { id, owner }) => {
                        discovery
                            .announce_appeared(&dbus_proxy, id, Some(owner), true)
                            .await
                    }
                    None => true,
                };

                if !delivered {
                    break;
                }
            }
            debug!("Player discovery stopped");
        });

        info!("MPRIS player discovery started");
        Ok(task)
    }

    /// Whether `bus_name` is an MPRIS player not excluded by configuration.
    pub fn is_tracked(&self, bus_name: &str) -> bool {
        is_tracked(bus_name, &self.ignored_players)
    }

    /// Connect to the player and queue it. Returns `false` once the engine
    /// is gone.
    #[instrument(skip(self, dbus_proxy), fields(player = %id))]
    async fn announce_appeared(
        &self,
        dbus_proxy: &fdo::DBusProxy<'_>,
        id: PlayerId,
        owner: Option<String>,
        replaced: bool,
    ) -> bool {
        let pid = self.process_id(dbus_proxy, &id).await;
        let connected = MprisSource::connect(&self.connection, id, self.events.clone()).await;
        let source: Box<dyn PlayerSource> = match connected {
            Ok(source) => Box::new(source),
            Err(e) => {
                warn!("Failed to connect to player: {e}");
                return true;
            }
        };

        let origin = SourceOrigin { pid, owner };
        let lifecycle = if replaced {
            SourceLifecycle::OwnerChanged { source, origin }
        } else {
            SourceLifecycle::Appeared { source, origin }
        };
        self.events.send(EngineEvent::Lifecycle(lifecycle)).is_ok()
    }

    async fn process_id(&self, dbus_proxy: &fdo::DBusProxy<'_>, id: &PlayerId) -> Option<u32> {
        let name = BusName::try_from(id.bus_name()).ok()?;
        match dbus_proxy.get_connection_unix_process_id(name).await {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(player = %id, "No process id for player: {e}");
                None
            }
        }
    }

    async fn name_owner(&self, dbus_proxy: &fdo::DBusProxy<'_>, id: &PlayerId) -> Option<String> {
        let name = BusName::try_from(id.bus_name()).ok()?;
        dbus_proxy
            .get_name_owner(name)
            .await
            .ok()
            .map(|owner| owner.to_string())
    }
}
