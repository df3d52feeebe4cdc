//! Multi-player media indicator engine.
//!
//! Reconciles every live MPRIS player with its application window and
//! continuously picks the one player that should drive the indicator.

/// Cover art fetching and icon fallback
pub mod cover;
/// zbus-backed player source
pub mod dbus_source;
/// Player discovery on the session bus
pub mod discovery;
/// Media player error types
pub mod error;
/// Engine queue and presentation events
pub mod events;
/// Icon theme lookups and the player icon chain
pub mod icon;
/// Track metadata parsing
pub mod metadata;
/// D-Bus proxy trait definitions
pub mod proxy;
/// Per-player record
pub mod record;
/// Player registry and active player arbitration
pub mod registry;
/// Indicator engine service
pub mod service;
/// Player source collaborator
pub mod source;
/// Player types and capabilities
pub mod types;
/// Window matching and tracking
pub mod window;

#[cfg(test)]
mod tests;

pub use cover::*;
pub use dbus_source::*;
pub use discovery::*;
pub use error::*;
pub use events::*;
pub use icon::{IconTheme, XdgIconTheme};
pub use metadata::*;
pub use proxy::*;
pub use record::*;
pub use registry::{ActivityKey, Registry, pick_by_activity};
pub use service::*;
pub use source::*;
pub use types::*;
