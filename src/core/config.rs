//! Configuration system for the tile loop pipeline
//!
//! Every component receives its settings from a [`LoopConfig`] at
//! construction time. Presets are available through [`LoopProfile`], and the
//! whole structure can be loaded from JSON with missing fields falling back
//! to the defaults.

use crate::{LoopError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum LoopProfile {
    Balanced,
    LowBandwidth,
    HighDetail,
    Custom(LoopConfig),
}

impl LoopProfile {
    pub fn resolve(&self) -> LoopConfig {
        match self {
            Self::Balanced => LoopConfig::default(),
            Self::LowBandwidth => LoopConfig {
                frame_count: 4,
                max_concurrent_downloads: 2,
                loop_zoom_offset: 1,
                cache_capacity: 256,
                request_timeout_ms: 45_000,
                ..LoopConfig::default()
            },
            Self::HighDetail => LoopConfig {
                frame_count: 10,
                max_concurrent_downloads: 8,
                frame_interval_ms: 300,
                cache_capacity: 4096,
                ..LoopConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for LoopProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Number of most recent frames kept on the time axis
    pub frame_count: usize,
    /// Parallel tile downloads per overlay
    pub max_concurrent_downloads: usize,
    /// Delay between animation ticks
    pub frame_interval_ms: u64,
    /// Ticks the newest frame is held before looping back
    pub dwell_count: u32,
    /// Delay between valid-times polls
    pub poll_interval_ms: u64,
    /// How long a failed tile URL stays blocked
    pub error_expiry_ms: u64,
    /// Cadence of the sweep removing expired error entries
    pub error_sweep_interval_ms: u64,
    /// Zoom levels subtracted when prefetching composited frames
    pub loop_zoom_offset: u8,
    /// Tile edge in pixels of composited frames
    pub tile_size: u32,
    /// Maximum number of entries in the shared tile cache
    pub cache_capacity: usize,
    pub request_timeout_ms: u64,
    /// Alpha of the neutral fill drawn for missing tiles
    pub placeholder_alpha: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_count: 6,
            max_concurrent_downloads: 4,
            frame_interval_ms: 400,
            dwell_count: 3,
            poll_interval_ms: 60_000,
            error_expiry_ms: 45_000,
            error_sweep_interval_ms: 30_000,
            loop_zoom_offset: 0,
            tile_size: crate::core::constants::TILE_SIZE,
            cache_capacity: 1024,
            request_timeout_ms: 30_000,
            placeholder_alpha: 0.1,
        }
    }
}

impl LoopConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LoopError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| LoopError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Rejects settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let zero_field = [
            ("frame_count", self.frame_count == 0),
            ("max_concurrent_downloads", self.max_concurrent_downloads == 0),
            ("frame_interval_ms", self.frame_interval_ms == 0),
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("error_sweep_interval_ms", self.error_sweep_interval_ms == 0),
            ("tile_size", self.tile_size == 0),
            ("cache_capacity", self.cache_capacity == 0),
        ]
        .into_iter()
        .find(|(_, is_zero)| *is_zero);

        match zero_field {
            Some((name, _)) => Err(LoopError::Config(format!("{} must be greater than zero", name))),
            None => Ok(()),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_expiry(&self) -> Duration {
        Duration::from_millis(self.error_expiry_ms)
    }

    pub fn error_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.error_sweep_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
