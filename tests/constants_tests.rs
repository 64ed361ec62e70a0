// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use pos_scanner::constants::{self, camera, file_formats, virtual_camera};
use std::time::Duration;

#[test]
fn test_timing_windows() {
    assert_eq!(constants::DETECTED_COOLDOWN, Duration::from_millis(700));
    assert_eq!(constants::SCAN_DUPLICATE_GUARD, Duration::from_millis(1200));
}

#[test]
fn test_ideal_resolution_is_hd() {
    assert_eq!(camera::IDEAL_RESOLUTION.width, 1280);
    assert_eq!(camera::IDEAL_RESOLUTION.height, 720);
}

#[test]
fn test_back_camera_keywords_are_lowercase() {
    for keyword in camera::BACK_CAMERA_KEYWORDS {
        assert_eq!(*keyword, keyword.to_lowercase());
    }
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("PNG"));
    assert!(file_formats::is_image_extension("jpeg"));
    assert!(!file_formats::is_image_extension("mp4"));
}

#[test]
fn test_virtual_camera_default_fps() {
    assert_eq!(virtual_camera::DEFAULT_FPS, 30);
}

#[test]
fn test_priming_is_bounded() {
    assert!(camera::PRIMING_TIMEOUT > Duration::ZERO);
    assert!(camera::PRIMING_TIMEOUT <= Duration::from_secs(10));
}

#[test]
fn test_version_is_set() {
    assert!(!constants::app_info::version().is_empty());
}
