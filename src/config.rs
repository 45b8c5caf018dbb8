//! # Configuration Management
//!
//! Centralized configuration for the synchronization layer.
//!
//! This module provides structured configuration for the session controller,
//! the reconciliation engine, snapshot production and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides (`NETPHYS_*`)
//!
//! ## Tuning Notes
//! - The outbound ceilings (10 frames, 100 KB per tick) keep a burst of game
//!   events from starving the transport or the receiver
//! - Interpolation defaults (scale 30, angle scale 10, cap 30 steps) correct a
//!   one-unit positional error in at most half a second at 60 ticks per second

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Size of the frame header: one tag byte and an eight byte sender tick
pub const FRAME_HEADER_LEN: usize = 1 + 8;

/// Hard ceiling on concurrently registered event kinds (one tag byte)
pub const MAX_EVENT_KINDS: usize = 256;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetConfig {
    /// Session controller configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Reconciliation blend configuration
    #[serde(default)]
    pub interpolation: InterpolationConfig,

    /// Outbound snapshot configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| SyncError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| SyncError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("NETPHYS_MAX_OUTBOUND_MESSAGES") {
            if let Ok(val) = value.parse::<usize>() {
                config.session.max_outbound_messages = val;
            }
        }

        if let Ok(value) = std::env::var("NETPHYS_MAX_OUTBOUND_BYTES") {
            if let Ok(val) = value.parse::<usize>() {
                config.session.max_outbound_bytes = val;
            }
        }

        if let Ok(value) = std::env::var("NETPHYS_MAX_STEPS") {
            if let Ok(val) = value.parse::<u32>() {
                config.interpolation.max_steps = val;
            }
        }

        if let Ok(value) = std::env::var("NETPHYS_SNAPSHOT_MODE") {
            config.snapshot.mode = match value.to_ascii_lowercase().as_str() {
                "host" => SnapshotMode::Host,
                "all" => SnapshotMode::All,
                "off" => SnapshotMode::Off,
                other => {
                    return Err(SyncError::Config(format!(
                        "Invalid NETPHYS_SNAPSHOT_MODE: '{other}' (expected host, all or off)"
                    )))
                }
            };
        }

        if let Ok(value) = std::env::var("NETPHYS_LOG_LEVEL") {
            config.logging.log_level = value
                .parse::<Level>()
                .map_err(|_| SyncError::Config(format!("Invalid NETPHYS_LOG_LEVEL: {value}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| SyncError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.session.validate());
        errors.extend(self.interpolation.validate());
        errors.extend(self.snapshot.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Session controller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum number of frames sent per tick
    pub max_outbound_messages: usize,

    /// Maximum cumulative frame bytes sent per tick
    pub max_outbound_bytes: usize,

    /// Maximum number of events held for the application before the oldest is dropped
    pub max_inbound_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_outbound_messages: 10,
            max_outbound_bytes: 100_000,
            max_inbound_queue: 4096,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_outbound_messages == 0 {
            errors.push("Outbound message limit must be greater than 0".to_string());
        } else if self.max_outbound_messages > 10_000 {
            errors.push(format!(
                "Outbound message limit too high: {} (maximum: 10000)",
                self.max_outbound_messages
            ));
        }

        if self.max_outbound_bytes < 1024 {
            errors.push(format!(
                "Outbound byte limit too small: {} bytes (minimum: 1 KB)",
                self.max_outbound_bytes
            ));
        } else if self.max_outbound_bytes > 16 * 1024 * 1024 {
            errors.push(format!(
                "Outbound byte limit too large: {} bytes (maximum: 16 MB)",
                self.max_outbound_bytes
            ));
        }

        if self.max_inbound_queue == 0 {
            errors.push("Inbound queue limit must be greater than 0".to_string());
        }

        errors
    }
}

/// Reconciliation blend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpolationConfig {
    /// Steps per unit of positional discrepancy
    pub position_scale: f32,

    /// Factor making angular discrepancy commensurate with position
    pub angle_scale: f32,

    /// Upper bound on the number of blend steps for one correction
    pub max_steps: u32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            position_scale: 30.0,
            angle_scale: 10.0,
            max_steps: 30,
        }
    }
}

impl InterpolationConfig {
    /// Validate interpolation configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.position_scale.is_finite() || self.position_scale < 0.0 {
            errors.push(format!(
                "Position scale must be a non-negative number, got {}",
                self.position_scale
            ));
        }

        if !self.angle_scale.is_finite() || self.angle_scale < 0.0 {
            errors.push(format!(
                "Angle scale must be a non-negative number, got {}",
                self.angle_scale
            ));
        }

        if self.max_steps == 0 {
            errors.push("Max interpolation steps must be at least 1".to_string());
        } else if self.max_steps > 600 {
            errors.push(format!(
                "Max interpolation steps too high: {} (maximum: 600)",
                self.max_steps
            ));
        }

        errors
    }
}

/// Which peers produce outbound snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Only the host sends snapshots
    #[default]
    Host,
    /// Every peer sends snapshots of the objects it knows
    All,
    /// No snapshots are produced
    Off,
}

/// Outbound snapshot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// Which peers produce snapshots
    pub mode: SnapshotMode,

    /// Number of objects taken from the round-robin window per snapshot
    pub rotation_window: usize,

    /// Number of fastest-moving objects added to every snapshot
    pub fast_objects: usize,

    /// Ticks between two snapshots
    pub interval_ticks: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            mode: SnapshotMode::Host,
            rotation_window: 16,
            fast_objects: 8,
            interval_ticks: 1,
        }
    }
}

impl SnapshotConfig {
    /// Validate snapshot configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.mode != SnapshotMode::Off && self.rotation_window == 0 && self.fast_objects == 0 {
            errors.push(
                "Snapshots are enabled but both rotation_window and fast_objects are 0".to_string(),
            );
        }

        if self.interval_ticks == 0 {
            errors.push("Snapshot interval must be at least 1 tick".to_string());
        }

        // 32 bytes per entry must fit under the default byte ceiling
        let per_snapshot = self.rotation_window + self.fast_objects;
        if per_snapshot > 2048 {
            errors.push(format!(
                "Snapshot working set too large: {per_snapshot} objects (maximum: 2048)"
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("netphys"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
