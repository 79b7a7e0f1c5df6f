//! Capture configuration

use crate::{Result, SnapKitError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tuning knobs for surface location and frame acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Both canvas dimensions must exceed this to qualify as a surface
    pub min_surface_size: u32,

    /// Canvases larger than this in both dimensions qualify even without
    /// a reported 3D context
    pub fallback_surface_size: u32,

    /// Retries after the immediate snapshot
    pub max_attempts: u32,

    /// Delay between the refresh signal and sampling, in milliseconds
    pub settle_delay_ms: u64,

    /// Refresh cycles to wait after hiding UI before sampling
    pub settle_frames: u32,

    /// Data URLs shorter than this many characters are treated as blank.
    /// Content-independent approximation.
    pub blank_threshold: usize,

    /// Interval of the display refresh signal, in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_surface_size: 100,
            fallback_surface_size: 500,
            max_attempts: 10,
            settle_delay_ms: 50,
            settle_frames: 2,
            blank_threshold: 5000,
            frame_interval_ms: 16,
        }
    }
}

impl CaptureConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SnapKitError::config_with_source(format!("cannot read {}", path.display()), e)
        })?;
        let config = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded capture config");
        Ok(config)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SnapKitError::config_with_source("invalid config JSON", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SNAPKIT_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| SnapKitError::config(format!("{key}: invalid value {value:?}")))
        }

        if let Some(v) = lookup("SNAPKIT_BLANK_THRESHOLD") {
            self.blank_threshold = parse("SNAPKIT_BLANK_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("SNAPKIT_MAX_ATTEMPTS") {
            self.max_attempts = parse("SNAPKIT_MAX_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("SNAPKIT_SETTLE_DELAY_MS") {
            self.settle_delay_ms = parse("SNAPKIT_SETTLE_DELAY_MS", v)?;
        }
        if let Some(v) = lookup("SNAPKIT_FRAME_INTERVAL_MS") {
            self.frame_interval_ms = parse("SNAPKIT_FRAME_INTERVAL_MS", v)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject configurations the capture pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.fallback_surface_size < self.min_surface_size {
            return Err(SnapKitError::config(format!(
                "fallback_surface_size ({}) must not be below min_surface_size ({})",
                self.fallback_surface_size, self.min_surface_size
            )));
        }
        if self.frame_interval_ms == 0 {
            return Err(SnapKitError::config("frame_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
