//! Configuration management for implantpass.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::codec::{RenderOptions, DEFAULT_APP_NAME, DEFAULT_FALLBACK_MESSAGE, QR_BYTE_CAPACITY};
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "implantpass";

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "IMPLANTPASS_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `IMPLANTPASS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/implantpass/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// QR rendering options per code kind.
    pub render: RenderConfig,
    /// Payload options.
    pub codec: CodecConfig,
    /// Hardware scanner options.
    pub scanner: ScannerConfig,
}

/// Rendering options for each kind of code the encoder produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Single-procedure codes.
    pub single: RenderOptions,
    /// Collection codes.
    pub collection: RenderOptions,
    /// The fallback error code.
    pub fallback: RenderOptions,
}

/// Payload-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Written as `appName` in collection envelopes.
    pub app_name: String,
    /// Text carried by the fallback code.
    pub fallback_message: String,
    /// Payloads longer than this are replaced by the fallback code.
    pub max_payload_bytes: usize,
}

/// Keyboard-wedge scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Idle gap after which buffered keys are flushed as a scan.
    pub timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            single: RenderOptions::single(),
            collection: RenderOptions::collection(),
            fallback: RenderOptions::fallback(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            max_payload_bytes: QR_BYTE_CAPACITY,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self { timeout_ms: 100 }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `IMPLANTPASS_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (section, options) in [
            ("render.single", &self.render.single),
            ("render.collection", &self.render.collection),
            ("render.fallback", &self.render.fallback),
        ] {
            options.validate().map_err(|e| match e {
                Error::ConfigValidation { message } => {
                    Error::config_validation(format!("{section}: {message}"))
                }
                other => other,
            })?;
        }

        if self.codec.fallback_message.trim().is_empty() {
            return Err(Error::config_validation(
                "fallback_message must not be empty",
            ));
        }

        if self.codec.max_payload_bytes == 0 || self.codec.max_payload_bytes > QR_BYTE_CAPACITY {
            return Err(Error::ConfigValidation {
                message: format!(
                    "max_payload_bytes ({}) must be between 1 and {QR_BYTE_CAPACITY}",
                    self.codec.max_payload_bytes
                ),
            });
        }

        if self.scanner.timeout_ms == 0 {
            return Err(Error::config_validation(
                "timeout_ms must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Get the scanner idle timeout as a Duration.
    #[must_use]
    pub fn scanner_timeout(&self) -> Duration {
        Duration::from_millis(self.scanner.timeout_ms)
    }
}
