mod log_level;

pub use log_level::LogLevel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// General configuration settings.
///
/// Contains global settings that affect the overall behavior of the application,
/// such as logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Logging level for the application.
    pub log_level: LogLevel,

    /// Also write logs to a daily rotated file in the log directory.
    pub log_to_file: bool,
}
