// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module
//!
//! Two layers live here:
//! - [`Settings`]: process configuration (broker, cadence, domain), fixed at startup
//! - [`ConfigStore`]: the hot-reloaded simulation file describing greenhouses and sensors

mod schema;
mod store;

pub use schema::{Config, SensorMetadata, SensorTypeParams, Topology, DEFAULT_UNITS};
pub use store::{ConfigError, ConfigStore, Refresh};

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted publish interval (one day)
pub const MAX_PUBLISH_INTERVAL_SECS: f64 = 86_400.0;

/// Errors raised when process settings are unusable
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("broker port must be non-zero")]
    InvalidPort,

    #[error("publish interval must be above 0 and at most 86400 seconds, got {0}")]
    InvalidInterval(f64),

    #[error("keep-alive must be at least 5 seconds, got {0}")]
    InvalidKeepAlive(u64),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("domain must be non-empty and must not contain '/': {0:?}")]
    InvalidDomain(String),

    #[error("client id must not be empty")]
    EmptyClientId,
}

/// Process-level settings
#[derive(Clone)]
pub struct Settings {
    /// MQTT broker host
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,

    /// MQTT keep-alive in seconds
    pub keep_alive_secs: u64,

    /// Fixed delay between connection attempts
    pub reconnect_delay_secs: u64,

    pub connect_timeout_secs: u64,
    pub publish_timeout_secs: u64,

    /// Nominal publish cadence; each cycle is jittered by ±20%
    pub publish_interval_secs: f64,

    /// Leading topic segment
    pub domain: String,

    /// Simulation file watched for changes
    pub config_file: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt_host: "mosquitto".to_string(),
            mqtt_port: 1883,
            mqtt_username: Some("admin".to_string()),
            mqtt_password: Some("admin".to_string()),
            mqtt_client_id: "greenhouse-sensor-simulator".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_secs: 5,
            connect_timeout_secs: 10,
            publish_timeout_secs: 5,
            publish_interval_secs: 5.0,
            domain: "agriculture".to_string(),
            config_file: PathBuf::from("/app/config/config.yaml"),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Check the settings before anything connects
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mqtt_port == 0 {
            return Err(SettingsError::InvalidPort);
        }
        let interval = self.publish_interval_secs;
        if !interval.is_finite() || interval <= 0.0 || interval > MAX_PUBLISH_INTERVAL_SECS {
            return Err(SettingsError::InvalidInterval(self.publish_interval_secs));
        }
        if self.keep_alive_secs < 5 {
            return Err(SettingsError::InvalidKeepAlive(self.keep_alive_secs));
        }
        if self.reconnect_delay_secs == 0 {
            return Err(SettingsError::ZeroDuration("reconnect delay"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(SettingsError::ZeroDuration("connect timeout"));
        }
        if self.publish_timeout_secs == 0 {
            return Err(SettingsError::ZeroDuration("publish timeout"));
        }
        if self.domain.is_empty() || self.domain.contains('/') {
            return Err(SettingsError::InvalidDomain(self.domain.clone()));
        }
        if self.mqtt_client_id.is_empty() {
            return Err(SettingsError::EmptyClientId);
        }
        Ok(())
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs_f64(self.publish_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

// Keeps the password out of debug logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("mqtt_host", &self.mqtt_host)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_username", &self.mqtt_username)
            .field("mqtt_password", &self.mqtt_password.as_ref().map(|_| "***"))
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("publish_interval_secs", &self.publish_interval_secs)
            .field("domain", &self.domain)
            .field("config_file", &self.config_file)
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.mqtt_port, 1883);
        assert_eq!(settings.domain, "agriculture");
        assert_eq!(settings.publish_interval(), Duration::from_secs(5));
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.publish_interval_secs = 0.0;
        assert_eq!(settings.validate(), Err(SettingsError::InvalidInterval(0.0)));

        let mut settings = Settings::default();
        settings.domain = "farm/north".to_string();
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidDomain(_))));

        let mut settings = Settings::default();
        settings.mqtt_port = 0;
        assert_eq!(settings.validate(), Err(SettingsError::InvalidPort));

        let mut settings = Settings::default();
        settings.keep_alive_secs = 2;
        assert_eq!(settings.validate(), Err(SettingsError::InvalidKeepAlive(2)));
    }

    #[test]
    fn test_interval_upper_bound() {
        let mut settings = Settings::default();
        settings.publish_interval_secs = MAX_PUBLISH_INTERVAL_SECS;
        assert!(settings.validate().is_ok());

        settings.publish_interval_secs = 1e300;
        assert_eq!(settings.validate(), Err(SettingsError::InvalidInterval(1e300)));

        settings.publish_interval_secs = f64::INFINITY;
        assert!(matches!(settings.validate(), Err(SettingsError::InvalidInterval(_))));
    }

    #[test]
    fn test_debug_hides_password() {
        let mut settings = Settings::default();
        settings.mqtt_password = Some("hunter2".to_string());
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
