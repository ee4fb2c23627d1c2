//! Defines all configuration structures for the SCEEW engine.
//!
//! These structs are deserialized from an optional TOML file layered under
//! `SCEEW__*` environment variables using the `config` crate. Every field has a
//! default, so an empty configuration yields a working client pointed at the
//! public Sichuan EEW feed.

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::common::GeoPoint;

/// The file name (without extension) looked up in the working directory when
/// no explicit path is given.
pub const DEFAULT_CONFIG_NAME: &str = "sceew";

/// The top-level configuration for the `SceewEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SceewConfig {
    /// Connection settings for the push feed.
    pub feed: FeedConfig,

    /// The initial observer. Falls back to central Chengdu with every
    /// switch on when the section is absent.
    pub observer: ObserverConfig,

    /// Console and error-file logging.
    pub logging: LoggingConfig,
}

impl SceewConfig {
    /// Loads the configuration.
    ///
    /// With `path`, that file must exist. Without it, `sceew.toml` in the
    /// working directory is used if present. Environment variables such as
    /// `SCEEW__FEED__URL` override file values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("SCEEW").separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Settings for the `FeedConnector`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// WebSocket endpoint of the push feed.
    pub url: String,

    /// The request sent after connecting and after every observer save.
    pub resync_message: String,

    /// The timezone `OriginTime` values are expressed in. Uses IANA names
    /// (e.g., "Asia/Shanghai").
    pub timezone: Tz,

    /// Fixed pause between a connection failure and the next attempt.
    pub reconnect_delay_ms: u64,

    /// Upper bound on the WebSocket handshake.
    pub connect_timeout_secs: u64,

    /// A connection that delivers no frame for this long is treated as dead.
    pub stall_timeout_secs: u64,
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws-api.wolfx.jp/sc_eew".to_string(),
            resync_message: "query_sceew".to_string(),
            timezone: default_timezone(),
            reconnect_delay_ms: 1000,
            connect_timeout_secs: 10,
            stall_timeout_secs: 90,
        }
    }
}

/// The observer location plus the per-user alert switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Display name used in countdown text.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Play the EEW clip and the countdown beeps.
    pub audio_enabled: bool,
    /// Raise the main window when an alert triggers.
    pub auto_window: bool,
    /// Deliver an OS notification when an alert triggers.
    pub notifications: bool,
}

impl ObserverConfig {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            name: "成都市青羊区".to_string(),
            latitude: 30.68,
            longitude: 104.05,
            audio_enabled: true,
            auto_window: true,
            notifications: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Plain-text file receiving WARN and above. Truncated at startup.
    /// An empty string disables it.
    pub error_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            error_file: "errors.log".to_string(),
        }
    }
}

// --- Default value functions for serde ---

fn default_timezone() -> Tz {
    Tz::Asia__Shanghai
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_configuration_uses_public_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::File::create(&path).unwrap();

        let config = SceewConfig::load(Some(&path)).unwrap();
        assert_eq!(config.feed.url, "wss://ws-api.wolfx.jp/sc_eew");
        assert_eq!(config.feed.resync_message, "query_sceew");
        assert_eq!(config.feed.timezone, Tz::Asia__Shanghai);
        assert_eq!(config.feed.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.observer, ObserverConfig::default());
        assert_eq!(config.observer.name, "成都市青羊区");
        assert!(config.observer.audio_enabled && config.observer.auto_window && config.observer.notifications);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sceew.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[feed]
url = "ws://127.0.0.1:9000/sc_eew"
stall_timeout_secs = 30
timezone = "Asia/Tokyo"

[observer]
name = "Ya'an"
latitude = 29.98
longitude = 103.01
notifications = false

[logging]
error_file = ""
"#
        )
        .unwrap();

        let config = SceewConfig::load(Some(&path)).unwrap();
        assert_eq!(config.feed.url, "ws://127.0.0.1:9000/sc_eew");
        assert_eq!(config.feed.stall_timeout(), Duration::from_secs(30));
        assert_eq!(config.feed.timezone, Tz::Asia__Tokyo);
        assert_eq!(config.feed.connect_timeout(), Duration::from_secs(10));

        let observer = config.observer;
        assert_eq!(observer.name, "Ya'an");
        assert_eq!(observer.location(), GeoPoint::new(29.98, 103.01));
        assert!(observer.audio_enabled);
        assert!(!observer.notifications);
        assert!(config.logging.error_file.is_empty());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(SceewConfig::load(Some(&path)).is_err());
    }
}
