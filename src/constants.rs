// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Minimum spacing between two accepted camera detections
pub const DETECTED_COOLDOWN: Duration = Duration::from_millis(700);

/// Window in which the host drops a repeat delivery of the same code
pub const SCAN_DUPLICATE_GUARD: Duration = Duration::from_millis(1200);

/// Frames larger than this (either side) are downscaled before decoding
pub const DEFAULT_MAX_DECODE_DIMENSION: u32 = 640;

/// Camera selection and stream constraints
pub mod camera {
    use super::Duration;
    use crate::backends::camera::types::Resolution;

    /// Ideal capture resolution requested from the camera
    pub const IDEAL_RESOLUTION: Resolution = Resolution::new(1280, 720);

    /// Label keywords identifying a rear-facing camera (matched case-insensitively)
    pub const BACK_CAMERA_KEYWORDS: &[&str] = &["back", "rear", "environment"];

    /// Check whether a device label names a rear-facing camera
    pub fn is_back_camera_label(label: &str) -> bool {
        let label = label.to_lowercase();
        BACK_CAMERA_KEYWORDS.iter().any(|k| label.contains(k))
    }

    /// Upper bound on the permission request that unlocks device labels
    pub const PRIMING_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Frame delivery
pub mod latency {
    /// Frames buffered between a stream and its sink; extra frames are dropped
    pub const FRAME_CHANNEL_CAPACITY: usize = 2;
}

/// Supported file formats for still-image decoding
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Virtual camera defaults
pub mod virtual_camera {
    /// Default frame rate of the virtual camera
    pub const DEFAULT_FPS: u32 = 30;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_camera_labels() {
        assert!(camera::is_back_camera_label("Back Camera"));
        assert!(camera::is_back_camera_label("camera2 0, facing REAR"));
        assert!(camera::is_back_camera_label("Environment-facing lens"));
        assert!(!camera::is_back_camera_label("FaceTime HD Camera"));
        assert!(!camera::is_back_camera_label(""));
    }

    #[test]
    fn test_guard_outlasts_cooldown() {
        assert!(SCAN_DUPLICATE_GUARD > DETECTED_COOLDOWN);
    }
}
