use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use super::{
    FetchError, IconRef, IndicatorEvent, IndicatorInput, InputOutcome, Key, PlayerId,
    PlayerRecord, PlayerSource, PlayerView, PointerButton, RecordContext, RowInput,
    ScrollDirection, SourceChange, SourceKey, SourceOrigin, window::WindowEvent,
};

/// Sort key of the arbiter, compared field by field in declaration order.
///
/// Larger wins: a focused player beats an unfocused one, then playing beats
/// paused beats stopped, then the most recently activated window wins, then
/// the most recent playback state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ActivityKey {
    /// Player window has focus
    pub focused: bool,
    /// [`super::PlaybackState::rank`]
    pub playback_rank: u8,
    /// User time of the player window at its last focus change
    pub last_activated: u64,
    /// Tick of the last playback state change
    pub status_changed_at: u64,
}

/// First item under the arbiter's ordering.
///
/// The sort is stable, so among items with identical keys the earliest in
/// `items` wins.
pub fn pick_by_activity<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    key: impl Fn(&T) -> ActivityKey,
) -> Option<&'a T>
where
    T: 'a,
{
    let mut ranked: Vec<&T> = items.into_iter().collect();
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.into_iter().next()
}

/// Live players keyed by bus name, and the arbiter that picks the active one.
///
/// Every handler runs to completion and leaves the registry consistent.
/// Notifications for the presentation layer accumulate until
/// [`take_events`](Self::take_events) is called.
pub struct Registry {
    records: HashMap<PlayerId, PlayerRecord>,
    order: Vec<PlayerId>,
    ctx: RecordContext,
    allow_minimize: bool,
    tick: u64,
    active: Option<PlayerId>,
    pending: Vec<IndicatorEvent>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(ctx: RecordContext, allow_minimize: bool) -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            ctx,
            allow_minimize,
            tick: 0,
            active: None,
            pending: Vec::new(),
        }
    }

    /// Number of live players.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no live players.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for `id`.
    pub fn get(&self, id: &PlayerId) -> Option<&PlayerRecord> {
        self.records.get(id)
    }

    /// Records in the order their players appeared.
    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Snapshots of all records in appearance order.
    pub fn views(&self) -> Vec<PlayerView> {
        self.players().map(PlayerView::from).collect()
    }

    /// The player that should drive the indicator, if any.
    pub fn pick_active(&self) -> Option<&PlayerRecord> {
        pick_by_activity(self.players(), PlayerRecord::activity_key)
    }

    /// Icon for the indicator, `None` while it should be hidden.
    pub fn indicator_icon(&self) -> Option<IconRef> {
        self.pick_active().map(|record| record.icon().clone())
    }

    /// Drain notifications produced since the last call.
    pub fn take_events(&mut self) -> Vec<IndicatorEvent> {
        std::mem::take(&mut self.pending)
    }

    /// A player published its bus name.
    pub fn source_appeared(&mut self, source: Box<dyn PlayerSource>, origin: SourceOrigin) {
        let id = source.id().clone();
        if self.records.contains_key(&id) {
            debug!(player = %id, "Player re-appeared, replacing record");
            self.remove(&id);
        }
        self.insert(source, origin);
        self.settle();
    }

    /// A player released its bus name, or its source gave up.
    pub fn source_vanished(&mut self, id: &PlayerId) {
        if self.remove(id) {
            self.settle();
        }
    }

    /// A bus name moved to another process: replace the record in one step.
    pub fn owner_changed(&mut self, source: Box<dyn PlayerSource>, origin: SourceOrigin) {
        let id = source.id().clone();
        info!(player = %id, pid = ?origin.pid, "Player owner changed");
        self.remove(&id);
        self.insert(source, origin);
        self.settle();
    }

    /// Mirror a property change into the record it belongs to.
    ///
    /// Changes from a source the registry no longer holds are dropped.
    pub fn on_source_change(&mut self, id: &PlayerId, key: SourceKey, change: SourceChange) {
        let tick = match change {
            SourceChange::Playback(_) => self.next_tick(),
            _ => self.tick,
        };

        let Some(record) = self.records.get_mut(id).filter(|record| record.key() == key) else {
            debug!(player = %id, "Dropping change from stale source");
            return;
        };

        let update = record.apply(change, tick, &self.ctx);

        if update.destroyed {
            info!(player = %id, "Player source self-destructed");
            self.source_vanished(id);
            return;
        }
        if update.icon_changed {
            self.pending.push(IndicatorEvent::IconChanged(id.clone()));
        }
        if update.ranking_changed {
            self.settle();
        }
    }

    /// Route a window system notification to every record.
    pub fn on_window_event(&mut self, event: &WindowEvent) {
        let windows = Arc::clone(&self.ctx.windows);
        let mut focus_changed = false;
        for record in self.records.values_mut() {
            focus_changed |= record.on_window_event(event, windows.as_ref());
        }
        if focus_changed {
            self.settle();
        }
    }

    /// Re-run icon selection for every record after a theme change.
    pub fn on_theme_changed(&mut self) {
        for id in &self.order {
            if let Some(record) = self.records.get_mut(id) {
                if record.refresh_icon(&self.ctx) {
                    self.pending.push(IndicatorEvent::IconChanged(id.clone()));
                }
            }
        }
        self.settle();
    }

    /// Apply a finished cover fetch.
    pub fn on_cover_loaded(
        &mut self,
        id: &PlayerId,
        key: SourceKey,
        generation: u64,
        result: Result<Arc<[u8]>, FetchError>,
    ) {
        let Some(record) = self.records.get_mut(id).filter(|record| record.key() == key) else {
            return;
        };
        if record.on_cover_loaded(generation, result) {
            self.pending.push(IndicatorEvent::IconChanged(id.clone()));
        }
    }

    /// Pointer entered or left a row.
    pub fn on_row_hover(&mut self, id: &PlayerId, hover: bool) {
        if let Some(record) = self.records.get_mut(id) {
            record.on_hover(hover);
        }
    }

    /// Route input on the indicator button to the active player.
    pub fn on_input(&self, input: IndicatorInput) -> InputOutcome {
        let Some(active) = self.pick_active() else {
            return InputOutcome::PROPAGATE;
        };

        match input {
            IndicatorInput::Button(PointerButton::Middle) => {
                InputOutcome::consumed(active.play_pause_or_stop())
            }
            IndicatorInput::Button(PointerButton::Secondary) => {
                let was_focused = active.focused();
                if active.activate_or_minimize(self.allow_minimize, self.ctx.windows.as_ref()) {
                    InputOutcome {
                        consumed: true,
                        close_menu: !was_focused,
                    }
                } else {
                    InputOutcome::PROPAGATE
                }
            }
            IndicatorInput::Button(PointerButton::Primary) => InputOutcome::PROPAGATE,
            IndicatorInput::Scroll(ScrollDirection::Up) => InputOutcome::consumed(active.previous()),
            IndicatorInput::Scroll(ScrollDirection::Down) => InputOutcome::consumed(active.next()),
            IndicatorInput::Scroll(_) => InputOutcome::PROPAGATE,
            IndicatorInput::KeyPress { key, ctrl } => Self::media_key(active, key, ctrl),
        }
    }

    /// Route input on a player's row to that player.
    pub fn on_row_input(&self, id: &PlayerId, input: RowInput) -> InputOutcome {
        let Some(record) = self.records.get(id) else {
            return InputOutcome::PROPAGATE;
        };

        match input {
            RowInput::Activate => {
                record.activate_or_minimize(false, self.ctx.windows.as_ref());
                InputOutcome {
                    consumed: true,
                    close_menu: true,
                }
            }
            RowInput::Previous => InputOutcome::consumed(record.previous()),
            RowInput::PlayPauseStop => InputOutcome::consumed(record.play_pause_or_stop()),
            RowInput::Next => InputOutcome::consumed(record.next()),
            RowInput::KeyPress { key, ctrl } => Self::media_key(record, key, ctrl),
        }
    }

    /// Drop every record and release everything they hold.
    pub fn clear(&mut self) {
        let ids: Vec<PlayerId> = self.order.clone();
        for id in &ids {
            self.remove(id);
        }
        self.settle();
    }

    fn media_key(record: &PlayerRecord, key: Key, ctrl: bool) -> InputOutcome {
        if !ctrl {
            return InputOutcome::PROPAGATE;
        }
        match key {
            Key::Space => InputOutcome::consumed(record.play_pause_or_stop()),
            Key::Left => InputOutcome::consumed(record.previous()),
            Key::Right => InputOutcome::consumed(record.next()),
            Key::Other => InputOutcome::PROPAGATE,
        }
    }

    fn insert(&mut self, source: Box<dyn PlayerSource>, origin: SourceOrigin) {
        let tick = self.next_tick();
        let record = PlayerRecord::new(source, origin, tick, &self.ctx);
        let id = record.id().clone();
        info!(player = %id, identity = record.identity(), "Player added");

        self.records.insert(id.clone(), record);
        self.order.push(id.clone());
        self.pending.push(IndicatorEvent::PlayerAdded(id));
    }

    fn remove(&mut self, id: &PlayerId) -> bool {
        let Some(record) = self.records.remove(id) else {
            return false;
        };
        self.order.retain(|other| other != id);
        drop(record);

        info!(player = %id, "Player removed");
        self.pending.push(IndicatorEvent::PlayerRemoved(id.clone()));
        true
    }

    fn settle(&mut self) {
        let active = self.pick_active().map(|record| record.id().clone());
        if active != self.active {
            debug!(?active, "Active player changed");
            self.active.clone_from(&active);
            self.pending.push(IndicatorEvent::ActiveChanged(active));
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
