//! MPRIS media indicator engine.
//!
//! Tracks every MPRIS player on the session bus, ties each one to its
//! application window and picks the single player the indicator shows.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mpris_indicator::services::mpris::{
//!     Config, MprisIndicator, XdgIconTheme, window::HeadlessWindows,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let indicator = MprisIndicator::start(
//!     Config::default(),
//!     Arc::new(HeadlessWindows),
//!     Arc::new(XdgIconTheme::default()),
//! )
//! .await?;
//!
//! if let Some(player) = indicator.active_player() {
//!     println!("{} - {}", player.artist, player.title);
//! }
//! indicator.stop().await;
//! # Ok(())
//! # }
//! ```

/// Configuration schema, loading and validation.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Reactive services for system integration.
pub mod services;

/// Logging setup.
pub mod tracing_config;

pub use core::{IndicatorError, Result};
