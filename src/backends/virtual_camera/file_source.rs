// SPDX-License-Identifier: GPL-3.0-only

//! File source for the virtual camera
//!
//! Loads still images as camera frames, both for the `decode` command and
//! for feeding a recorded shelf photo to the virtual camera.

use crate::backends::camera::types::{CameraError, CameraFrame, CameraResult, PixelFormat};
use crate::constants::file_formats;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Load an image file and convert it to a CameraFrame
///
/// Supports common image formats: PNG, JPEG, GIF, BMP, WebP
pub fn load_image_as_frame(path: &Path) -> CameraResult<CameraFrame> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(file_formats::is_image_extension);
    if !supported {
        return Err(CameraError::Other(format!(
            "Unsupported image format: '{}'",
            path.display()
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CameraError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    let data: Vec<u8> = rgba.into_raw();

    info!(width, height, "Image loaded successfully");

    Ok(CameraFrame {
        data: Arc::from(data.into_boxed_slice()),
        width,
        height,
        stride: width * 4,
        format: PixelFormat::RGBA,
        sequence: 0,
        captured_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::synthetic::{SymbolLayout, render_symbol};

    #[test]
    fn test_png_roundtrip_keeps_pixels() {
        let frame = render_symbol("4006381333931", &SymbolLayout::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symbol.png");
        image::GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .unwrap()
            .save(&path)
            .unwrap();

        let loaded = load_image_as_frame(&path).unwrap();
        assert_eq!(loaded.format, PixelFormat::RGBA);
        assert_eq!((loaded.width, loaded.height), (frame.width, frame.height));
        assert_eq!(loaded.data[0], frame.data[0]);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = load_image_as_frame(Path::new("/tmp/clip.mp4")).unwrap_err();
        assert!(matches!(err, CameraError::Other(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_image_as_frame(Path::new("/nonexistent/shelf.png")).is_err());
    }
}
