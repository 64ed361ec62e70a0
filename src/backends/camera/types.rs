// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// A media device as reported by `enumerate_devices`
///
/// Labels may be empty until camera permission has been granted on some
/// platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

impl MediaDeviceInfo {
    /// Create a video input device
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::VideoInput,
            label: label.into(),
        }
    }

    /// Whether this device is a camera
    pub fn is_video_input(&self) -> bool {
        self.kind == DeviceKind::VideoInput
    }
}

/// Which way a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera (pointing away from the user)
    #[default]
    Environment,
    /// Front camera (selfie)
    User,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
        }
    }
}

/// Requested resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video track constraints passed to `get_user_media`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoConstraints {
    /// Exact device id, when a specific camera was picked
    pub device_id: Option<String>,
    /// Ideal facing mode
    pub facing_mode: Option<FacingMode>,
    /// Ideal resolution
    pub ideal_resolution: Option<Resolution>,
}

/// Constraints for one `get_user_media` request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::RGBA => 4,
            Self::RGB24 => 3,
            Self::Gray8 => 1,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, `stride` bytes per row
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Monotonic frame counter within a stream
    pub sequence: u64,
    /// Timestamp when the frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Create a tightly packed grayscale frame
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// Same pixels, new sequence number and capture time
    pub fn restamped(&self, sequence: u64, captured_at: Instant) -> Self {
        Self {
            data: Arc::clone(&self.data),
            sequence,
            captured_at,
            ..*self
        }
    }
}

/// Frame receiver type for preview streams
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Frame sender type for preview streams
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

/// Result type for media operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Errors raised at the media device boundary
///
/// Variants mirror the error names a media device API reports, so platform
/// adapters can map their failures one to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Access denied by the user or by policy
    NotAllowed(String),
    /// Access refused because the context is not secure
    Security(String),
    /// No device satisfies the request
    NotFound(String),
    /// Constraints cannot be satisfied
    OverConstrained(String),
    /// Device exists but cannot be opened (usually in use)
    NotReadable(String),
    /// Request aborted before completing
    Aborted,
    /// Other errors
    Other(String),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraError::NotAllowed(msg) => write!(f, "Not allowed: {}", msg),
            CameraError::Security(msg) => write!(f, "Security error: {}", msg),
            CameraError::NotFound(msg) => write!(f, "Device not found: {}", msg),
            CameraError::OverConstrained(msg) => write!(f, "Over-constrained: {}", msg),
            CameraError::NotReadable(msg) => write!(f, "Device not readable: {}", msg),
            CameraError::Aborted => write!(f, "Request aborted"),
            CameraError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}
