// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame processing results
//!
//! The decode adapter speaks in explicit tags: every processed frame yields a
//! [`DecodeResult`], and the engine reports misses as [`EngineError`] variants
//! instead of distinguishable error types.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
/// This allows easy transformation to pixel coordinates regardless of the
/// actual frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// The whole frame
    pub const FULL: FrameRegion = FrameRegion {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Convert to pixel coordinates `(x, y, width, height)`, clamped to the
    /// frame and at least one pixel in each dimension
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let x0 = (clamp(self.x) * frame_width as f32) as u32;
        let y0 = (clamp(self.y) * frame_height as f32) as u32;
        let x1 = (clamp(self.x + self.width) * frame_width as f32).ceil() as u32;
        let y1 = (clamp(self.y + self.height) * frame_height as f32).ceil() as u32;

        let x0 = x0.min(frame_width.saturating_sub(1));
        let y0 = y0.min(frame_height.saturating_sub(1));
        let width = x1.saturating_sub(x0).max(1).min(frame_width - x0);
        let height = y1.saturating_sub(y0).max(1).min(frame_height - y0);
        (x0, y0, width, height)
    }

    /// Whether the region has a usable, in-range extent
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }
}

/// Barcode symbologies the scanner can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symbology {
    /// EAN-13 (and UPC-A, reported with a leading zero)
    Ean13,
    /// EAN-8
    Ean8,
    /// Code 128
    Code128,
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbology::Ean13 => write!(f, "EAN-13"),
            Symbology::Ean8 => write!(f, "EAN-8"),
            Symbology::Code128 => write!(f, "Code 128"),
        }
    }
}

/// Hint configuration for the decode engine
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeHints {
    /// Symbologies to look for; EAN-13 is always included
    pub symbologies: Vec<Symbology>,
    /// Spend more effort per frame (more scan rows, both directions)
    pub try_harder: bool,
    /// Restrict decoding to this part of the frame
    pub region_of_interest: Option<FrameRegion>,
    /// Frames wider than this are downscaled before decoding
    pub max_dimension: u32,
}

impl Default for DecodeHints {
    fn default() -> Self {
        Self {
            symbologies: vec![Symbology::Ean13],
            try_harder: false,
            region_of_interest: None,
            max_dimension: crate::constants::DEFAULT_MAX_DECODE_DIMENSION,
        }
    }
}

impl DecodeHints {
    /// Hints restricted to the given symbologies (EAN-13 is added if missing)
    pub fn with_symbologies(symbologies: &[Symbology]) -> Self {
        let mut hints = Self::default();
        for symbology in symbologies {
            if !hints.symbologies.contains(symbology) {
                hints.symbologies.push(*symbology);
            }
        }
        hints
    }

    /// Whether the given symbology is enabled
    pub fn allows(&self, symbology: Symbology) -> bool {
        self.symbologies.contains(&symbology)
    }
}

/// A successfully decoded symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Raw text as read from the symbol
    pub text: String,
    /// Symbology the text was read from
    pub symbology: Symbology,
}

/// Why an engine produced no symbol for a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No symbol in view
    NotFound,
    /// A symbol was read but its check digit did not match
    Checksum,
    /// Symbol structure was found but could not be read
    Format,
    /// Engine failure unrelated to frame content
    Internal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound => write!(f, "No barcode found"),
            EngineError::Checksum => write!(f, "Checksum mismatch"),
            EngineError::Format => write!(f, "Malformed barcode"),
            EngineError::Internal(msg) => write!(f, "Engine failure: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A symbol was read
    Matched(Decoded),
    /// Routine miss (nothing in view, checksum or format miss)
    NotFound,
    /// Unexpected decoder failure
    DecodeError(String),
}

impl DecodeResult {
    /// Collapse an engine outcome into a frame result
    ///
    /// Checksum and format misses are routine and map to `NotFound`.
    pub fn from_engine(outcome: Result<Decoded, EngineError>) -> Self {
        match outcome {
            Ok(decoded) => DecodeResult::Matched(decoded),
            Err(EngineError::NotFound | EngineError::Checksum | EngineError::Format) => {
                DecodeResult::NotFound
            }
            Err(EngineError::Internal(cause)) => DecodeResult::DecodeError(cause),
        }
    }
}

/// A decode result tagged with the frame it came from
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Frame sequence number within the stream
    pub sequence: u64,
    /// When the frame was captured
    pub captured_at: Instant,
    /// What the decoder made of it
    pub result: DecodeResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_misses_collapse_to_not_found() {
        assert_eq!(
            DecodeResult::from_engine(Err(EngineError::NotFound)),
            DecodeResult::NotFound
        );
        assert_eq!(
            DecodeResult::from_engine(Err(EngineError::Checksum)),
            DecodeResult::NotFound
        );
        assert_eq!(
            DecodeResult::from_engine(Err(EngineError::Format)),
            DecodeResult::NotFound
        );
        assert_eq!(
            DecodeResult::from_engine(Err(EngineError::Internal("oom".into()))),
            DecodeResult::DecodeError("oom".into())
        );
    }

    #[test]
    fn test_region_to_pixels() {
        let region = FrameRegion {
            x: 0.25,
            y: 0.5,
            width: 0.5,
            height: 0.25,
        };
        assert_eq!(region.to_pixels(400, 200), (100, 100, 200, 50));
        assert_eq!(FrameRegion::FULL.to_pixels(640, 480), (0, 0, 640, 480));
    }

    #[test]
    fn test_region_to_pixels_clamps() {
        let region = FrameRegion {
            x: 0.9,
            y: 0.9,
            width: 0.5,
            height: 0.5,
        };
        let (x, y, w, h) = region.to_pixels(100, 100);
        assert_eq!((x, y), (90, 90));
        assert_eq!((w, h), (10, 10));
        assert!(!region.is_valid());
    }

    #[test]
    fn test_hints_always_include_ean13() {
        let hints = DecodeHints::with_symbologies(&[Symbology::Ean8]);
        assert!(hints.allows(Symbology::Ean13));
        assert!(hints.allows(Symbology::Ean8));
        assert!(!hints.allows(Symbology::Code128));
    }
}
