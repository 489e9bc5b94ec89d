//! Configuration management for crabsense
//!
//! Settings file carrying the device setup, the depth range used for
//! color-to-depth mapping, recording options and the log level.

use crate::device_config::DeviceConfig;
use crate::errors::SenseError;
use crate::geometry::DepthRange;
use crate::recording::{RecordingConfig, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenseConfig {
    pub device: DeviceConfig,
    pub mapping: MappingConfig,
    pub recording: RecordingSettings,
    pub logging: LoggingConfig,
}

/// Depth search range for color-to-depth mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Nearest depth considered, meters
    pub depth_min: f32,
    /// Farthest depth considered, meters
    pub depth_max: f32,
}

/// Recording output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_directory: String,
    /// Frames buffered before the writer falls behind and drops
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter used when the variable is unset
    pub level: String,
}

impl Default for SenseConfig {
    fn default() -> Self {
        let range = DepthRange::default();
        Self {
            device: DeviceConfig::default_streams(),
            mapping: MappingConfig {
                depth_min: range.min,
                depth_max: range.max,
            },
            recording: RecordingSettings {
                output_directory: "./recordings".to_string(),
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
            logging: LoggingConfig {
                level: "crabsense=info".to_string(),
            },
        }
    }
}

impl SenseConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SenseError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            SenseError::configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: SenseConfig = toml::from_str(&contents).map_err(|e| {
            SenseError::configuration(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SenseError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SenseError::configuration(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            SenseError::Serialization(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabsense.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let (min, max) = (self.mapping.depth_min, self.mapping.depth_max);
        if min.is_nan() || min <= 0.0 {
            return Err("Minimum depth must be positive".to_string());
        }
        if max.is_nan() || max <= min {
            return Err("Maximum depth must exceed minimum depth".to_string());
        }

        if self.recording.queue_capacity == 0 {
            return Err("Recording queue capacity must be at least 1".to_string());
        }
        if self.recording.output_directory.trim().is_empty() {
            return Err("Recording output directory must not be empty".to_string());
        }

        for profile in &self.device.profiles {
            if profile.width < 0 || profile.height < 0 || profile.frame_rate < 0 {
                return Err(format!(
                    "Invalid {} stream request: negative resolution or frame rate",
                    profile.kind
                ));
            }
        }

        Ok(())
    }

    pub fn depth_range(&self) -> DepthRange {
        DepthRange {
            min: self.mapping.depth_min,
            max: self.mapping.depth_max,
        }
    }

    /// Recording options rooted at `output_directory`.
    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig::new(&self.recording.output_directory)
            .with_queue_capacity(self.recording.queue_capacity)
    }
}
