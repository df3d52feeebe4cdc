use std::{fs, io::ErrorKind, path::Path};

use tracing::{debug, instrument};

use super::{Config, ConfigPaths};
use crate::{IndicatorError, Result};

impl Config {
    /// Load the configuration from the default location.
    ///
    /// # Errors
    /// Returns error if the config directory is unknown, or the file exists
    /// but cannot be read, parsed or validated
    pub fn load() -> Result<Config> {
        Self::load_from(&ConfigPaths::main_config()?)
    }

    /// Load and validate the configuration at `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or fails
    /// validation
    #[instrument]
    pub fn load_from(path: &Path) -> Result<Config> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config =
            toml::from_str(&content).map_err(|e| IndicatorError::toml_parse(e, Some(path)))?;
        config.validate()?;
        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or fails validation
    pub fn parse(content: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| IndicatorError::toml_parse(e, None))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    /// Returns `IndicatorError::InvalidConfigField` for the first bad value
    pub fn validate(&self) -> Result<()> {
        if self.media.cover_timeout_ms == 0 {
            return Err(IndicatorError::invalid_field(
                "media.cover_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
