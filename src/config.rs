// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::Resolution;
use crate::constants::{self, camera};
use crate::errors::{AppError, AppResult};
use crate::frame_processor::{DecodeHints, FrameRegion, Symbology};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "pos-scanner";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Current config format version
pub const CONFIG_VERSION: u32 = 1;

/// Scanner configuration
///
/// Missing fields take their default, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Config format version
    pub version: u32,
    /// Minimum spacing between two accepted camera detections
    pub cooldown_ms: u64,
    /// Window in which a repeat delivery of the same code is dropped
    pub duplicate_guard_ms: u64,
    /// Symbologies to decode (EAN-13 is always enabled)
    pub symbologies: Vec<Symbology>,
    /// Spend more effort per frame
    pub try_harder: bool,
    /// Ideal capture resolution requested from the camera
    pub ideal_resolution: Resolution,
    /// Close the scanner after the first accepted detection
    pub auto_close_on_detect: bool,
    /// Restrict decoding to part of the frame
    pub region_of_interest: Option<FrameRegion>,
    /// Frames larger than this are downscaled before decoding
    pub max_decode_dimension: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            cooldown_ms: constants::DETECTED_COOLDOWN.as_millis() as u64,
            duplicate_guard_ms: constants::SCAN_DUPLICATE_GUARD.as_millis() as u64,
            symbologies: vec![Symbology::Ean13],
            try_harder: false,
            ideal_resolution: camera::IDEAL_RESOLUTION,
            auto_close_on_detect: false,
            region_of_interest: None,
            max_decode_dimension: constants::DEFAULT_MAX_DECODE_DIMENSION,
        }
    }
}

impl ScannerConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded scanner config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved scanner config");
        Ok(())
    }

    /// Reject values the scanner cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.version > CONFIG_VERSION {
            return Err(AppError::Config(format!(
                "config version {} is newer than supported version {}",
                self.version, CONFIG_VERSION
            )));
        }
        if self.cooldown_ms == 0 {
            return Err(AppError::Config("cooldown_ms must be positive".into()));
        }
        if self.ideal_resolution.width == 0 || self.ideal_resolution.height == 0 {
            return Err(AppError::Config(format!(
                "ideal_resolution {} is empty",
                self.ideal_resolution
            )));
        }
        if self.max_decode_dimension < 64 {
            return Err(AppError::Config(format!(
                "max_decode_dimension {} is below 64",
                self.max_decode_dimension
            )));
        }
        if let Some(region) = &self.region_of_interest
            && !region.is_valid()
        {
            return Err(AppError::Config(format!(
                "region_of_interest {:?} is outside the frame",
                region
            )));
        }
        Ok(())
    }

    /// Cooldown between accepted detections
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Duplicate delivery guard window
    pub fn duplicate_guard(&self) -> Duration {
        Duration::from_millis(self.duplicate_guard_ms)
    }

    /// Decode hints derived from this config
    pub fn decode_hints(&self) -> DecodeHints {
        DecodeHints {
            try_harder: self.try_harder,
            region_of_interest: self.region_of_interest,
            max_dimension: self.max_decode_dimension,
            ..DecodeHints::with_symbologies(&self.symbologies)
        }
    }
}
