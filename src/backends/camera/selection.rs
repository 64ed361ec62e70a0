// SPDX-License-Identifier: GPL-3.0-only

//! Camera selection
//!
//! Scanning works best with the rear camera. Devices are picked by label,
//! which platforms leave empty until camera permission has been granted; in
//! that case a short generic request primes the labels before enumerating
//! again.

use super::types::*;
use super::MediaDevices;
use crate::constants::camera::{IDEAL_RESOLUTION, PRIMING_TIMEOUT, is_back_camera_label};
use tracing::{debug, info, warn};

/// Pick the camera to scan with
///
/// Prefers a device whose label names a rear camera, otherwise the first
/// device. `None` when the list is empty.
pub fn pick_back_camera(devices: &[MediaDeviceInfo]) -> Option<&MediaDeviceInfo> {
    devices
        .iter()
        .find(|d| is_back_camera_label(&d.label))
        .or_else(|| devices.first())
}

/// Build stream constraints for the chosen device
///
/// With a device the id is requested exactly; without one the request falls
/// back to the environment-facing camera. Audio is never requested.
pub fn build_constraints(device: Option<&MediaDeviceInfo>, ideal: Resolution) -> MediaConstraints {
    MediaConstraints {
        video: VideoConstraints {
            device_id: device.map(|d| d.device_id.clone()),
            facing_mode: Some(FacingMode::Environment),
            ideal_resolution: Some(ideal),
        },
        audio: false,
    }
}

/// Constraints for the permission-priming request
pub fn generic_constraints() -> MediaConstraints {
    build_constraints(None, IDEAL_RESOLUTION)
}

/// List video inputs; enumeration failures count as "no devices"
pub async fn enumerate_video_inputs(media: &dyn MediaDevices) -> Vec<MediaDeviceInfo> {
    match media.enumerate_devices().await {
        Ok(devices) => devices.into_iter().filter(|d| d.is_video_input()).collect(),
        Err(e) => {
            warn!(error = %e, "Device enumeration failed");
            Vec::new()
        }
    }
}

/// Enumerate video inputs, priming labels first if none are visible
pub async fn discover_cameras(media: &dyn MediaDevices) -> Vec<MediaDeviceInfo> {
    let devices = enumerate_video_inputs(media).await;
    if devices.is_empty() || devices.iter().any(|d| !d.label.is_empty()) {
        return devices;
    }

    debug!(count = devices.len(), "Device labels hidden, priming camera permission");
    if !prime_labels(media).await {
        return devices;
    }

    let primed = enumerate_video_inputs(media).await;
    if primed.is_empty() { devices } else { primed }
}

/// Resolve the constraints for a new stream
pub async fn select_constraints(media: &dyn MediaDevices, ideal: Resolution) -> MediaConstraints {
    let devices = discover_cameras(media).await;
    let picked = pick_back_camera(&devices);
    match picked {
        Some(device) => info!(device = %device.device_id, label = %device.label, "Selected camera"),
        None => info!("No camera listed, requesting environment-facing camera"),
    }
    build_constraints(picked, ideal)
}

/// Short generic request whose tracks are stopped immediately
async fn prime_labels(media: &dyn MediaDevices) -> bool {
    match tokio::time::timeout(PRIMING_TIMEOUT, media.get_user_media(generic_constraints())).await {
        Ok(Ok(stream)) => {
            stream.tracks().stop_all();
            true
        }
        Ok(Err(e)) => {
            debug!(error = %e, "Priming request failed");
            false
        }
        Err(_) => {
            debug!("Priming request timed out");
            false
        }
    }
}
