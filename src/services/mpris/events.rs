use std::{fmt, sync::Arc};

use tokio::sync::{mpsc, oneshot};

use super::{
    FetchError, PlayerId, PlayerSource, SourceChange, SourceKey,
    window::WindowEvent,
};

/// Sender half of the engine's event queue.
pub type EngineSender = mpsc::UnboundedSender<EngineEvent>;

/// Where a newly appeared player came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOrigin {
    /// Process owning the bus name, when it could be determined
    pub pid: Option<u32>,
    /// Unique connection name currently owning the bus name
    pub owner: Option<String>,
}

/// Player lifecycle as reported by discovery.
pub enum SourceLifecycle {
    /// A player published its bus name
    Appeared {
        /// Connection to the new player
        source: Box<dyn PlayerSource>,
        /// Process and connection behind it
        origin: SourceOrigin,
    },
    /// A player released its bus name
    Vanished(PlayerId),
    /// A bus name moved to a different process
    OwnerChanged {
        /// Connection to the new owner
        source: Box<dyn PlayerSource>,
        /// Process and connection behind it
        origin: SourceOrigin,
    },
}

impl fmt::Debug for SourceLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Appeared { source, origin } => f
                .debug_struct("Appeared")
                .field("id", source.id())
                .field("origin", origin)
                .finish(),
            Self::Vanished(id) => f.debug_tuple("Vanished").field(id).finish(),
            Self::OwnerChanged { source, origin } => f
                .debug_struct("OwnerChanged")
                .field("id", source.id())
                .field("origin", origin)
                .finish(),
        }
    }
}

/// Pointer buttons the indicator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Usually the left button
    Primary,
    /// Usually the wheel button
    Middle,
    /// Usually the right button
    Secondary,
}

/// Scroll directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Scroll up
    Up,
    /// Scroll down
    Down,
    /// Scroll left
    Left,
    /// Scroll right
    Right,
}

/// Keys with a media binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Space bar
    Space,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Anything else
    Other,
}

/// Raw input on the indicator button itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorInput {
    /// A pointer button was pressed
    Button(PointerButton),
    /// The pointer scrolled
    Scroll(ScrollDirection),
    /// A key was pressed
    KeyPress {
        /// Key pressed
        key: Key,
        /// Whether Control was the only modifier held
        ctrl: bool,
    },
}

/// Input on one player's row in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowInput {
    /// The row was clicked or activated from the keyboard
    Activate,
    /// The previous button was clicked
    Previous,
    /// The play/pause button was clicked
    PlayPauseStop,
    /// The next button was clicked
    Next,
    /// A key was pressed while the row had focus
    KeyPress {
        /// Key pressed
        key: Key,
        /// Whether Control was the only modifier held
        ctrl: bool,
    },
}

/// Outcome of routing an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputOutcome {
    /// Stop propagation; the shell must not apply its default behaviour
    pub consumed: bool,
    /// The popup menu should close
    pub close_menu: bool,
}

impl InputOutcome {
    /// Let the shell handle the input.
    pub const PROPAGATE: Self = Self {
        consumed: false,
        close_menu: false,
    };

    pub(crate) fn consumed(consumed: bool) -> Self {
        Self {
            consumed,
            close_menu: false,
        }
    }
}

/// Everything the engine loop reacts to.
#[derive(Debug)]
pub enum EngineEvent {
    /// Player appeared, vanished or changed owner
    Lifecycle(SourceLifecycle),
    /// Property change reported by a player
    Source {
        /// Player the change belongs to
        id: PlayerId,
        /// Connection that reported it
        key: SourceKey,
        /// The change itself
        change: SourceChange,
    },
    /// Window system notification
    Window(WindowEvent),
    /// Icon theme changed
    ThemeChanged,
    /// Cover art fetch finished
    CoverLoaded {
        /// Player the fetch belongs to
        id: PlayerId,
        /// Connection the record held when the fetch started
        key: SourceKey,
        /// Fetch generation
        generation: u64,
        /// Fetched bytes or the reason there are none
        result: Result<Arc<[u8]>, FetchError>,
    },
    /// Pointer entered or left a player's row
    RowHover {
        /// Player whose row it is
        id: PlayerId,
        /// Whether the pointer is over the row
        hover: bool,
    },
    /// Input on the indicator button
    Input {
        /// The input
        input: IndicatorInput,
        /// Where to send the outcome
        reply: oneshot::Sender<InputOutcome>,
    },
    /// Input on a player's row
    RowInput {
        /// Player whose row it is
        id: PlayerId,
        /// The input
        input: RowInput,
        /// Where to send the outcome
        reply: oneshot::Sender<InputOutcome>,
    },
    /// Release everything and end the loop
    Stop(oneshot::Sender<()>),
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorEvent {
    /// A row should be added for this player
    PlayerAdded(PlayerId),
    /// The row for this player should be removed
    PlayerRemoved(PlayerId),
    /// The active player changed; repaint the indicator icon
    ActiveChanged(Option<PlayerId>),
    /// A player's icon changed; repaint its row, and the indicator if it is active
    IconChanged(PlayerId),
}
