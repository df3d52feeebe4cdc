use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::mpris;

/// Media engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MediaConfig {
    /// List of player bus name patterns to ignore during discovery
    pub ignored_players: Vec<String>,

    /// Whether cover art may be fetched over http(s).
    pub remote_covers: bool,

    /// Upper bound for a single cover art fetch, in milliseconds.
    pub cover_timeout_ms: u64,

    /// Whether a secondary click on the indicator may minimize a focused player.
    pub allow_minimize: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ignored_players: Vec::new(),
            remote_covers: true,
            cover_timeout_ms: 5000,
            allow_minimize: true,
        }
    }
}

impl From<&MediaConfig> for mpris::Config {
    fn from(config: &MediaConfig) -> Self {
        Self {
            ignored_players: config.ignored_players.clone(),
            remote_covers: config.remote_covers,
            cover_timeout: Duration::from_millis(config.cover_timeout_ms),
            allow_minimize: config.allow_minimize,
        }
    }
}
