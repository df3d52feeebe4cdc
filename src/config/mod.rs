//! Configuration schema definitions and validation.
//!
//! Defines the configuration structure for the indicator: general settings
//! and media engine settings. All configurations are serializable to/from
//! TOML format.

mod general;
mod loading;
mod media;
mod paths;


pub use general::{GeneralConfig, LogLevel};
pub use media::MediaConfig;
pub use paths::ConfigPaths;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// Represents the complete configuration schema that can be loaded
/// from TOML files. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Media engine settings.
    #[serde(default)]
    pub media: MediaConfig,
}
