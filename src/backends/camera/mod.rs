// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner never talks to camera hardware directly. The host supplies a
//! [`MediaDevices`] implementation (platform camera access) and a
//! [`VideoSink`] (the surface the stream is attached to and played on), and
//! the session manager drives both.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ Scan Event Controller│
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraSessionManager│  ← Acquisition, visibility, teardown
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌────────────┐ ┌──────────┐
//! │MediaDevices│ │ VideoSink│  ← Host-provided
//! └────────────┘ └──────────┘
//! ```

pub mod frame_loop;
pub mod manager;
pub mod selection;
pub mod types;
pub mod video_sink;

pub use frame_loop::{ScannerControls, StopSignal};
pub use manager::{CameraSessionManager, SessionPhase};
pub use types::*;
pub use video_sink::VideoElement;

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

/// Platform camera access
///
/// Mirrors a media device API: device enumeration and stream acquisition.
/// Both operations are asynchronous; acquisition may take a long time while
/// the platform shows a permission prompt.
pub trait MediaDevices: Send + Sync {
    /// Enumerate media devices. Labels may be empty before permission is granted.
    fn enumerate_devices(&self) -> BoxFuture<'_, CameraResult<Vec<MediaDeviceInfo>>>;

    /// Request a media stream satisfying the constraints
    fn get_user_media(&self, constraints: MediaConstraints) -> BoxFuture<'_, CameraResult<MediaStream>>;

    /// Whether camera access happens in a secure (HTTPS) context
    fn is_secure_context(&self) -> bool {
        true
    }
}

/// One track of a media stream
pub trait MediaTrack: Send + Sync {
    /// Device label of the track source
    fn label(&self) -> &str;

    /// Stop the track and release the underlying device
    fn stop(&self) -> CameraResult<()>;

    /// Whether the track is still delivering data
    fn is_live(&self) -> bool;
}

/// A rendering surface a live stream is attached to
///
/// The decode loop reads frames from the sink, never from the stream
/// directly, so clearing the sink's source ends decoding.
pub trait VideoSink: Send + Sync {
    /// Attach a stream's frames as the sink source, replacing any previous one
    fn attach(&self, stream_id: &str, frames: FrameReceiver) -> CameraResult<()>;

    /// Start playback of the attached source
    fn play(&self) -> BoxFuture<'_, CameraResult<()>>;

    /// Detach the source
    fn clear_source(&self) -> CameraResult<()>;

    /// Whether a source is attached
    fn has_source(&self) -> bool;

    /// Wait for the next frame; `None` once the source ends or is cleared
    fn next_frame(&self) -> BoxFuture<'_, Option<CameraFrame>>;
}

/// The tracks of an acquired stream
///
/// Cheap to clone; kept by the session so it can stop the tracks after the
/// frames have been handed to the sink.
#[derive(Clone)]
pub struct TrackSet {
    stream_id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl TrackSet {
    /// Stream the tracks belong to
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// The tracks
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Stop every track, continuing past failures
    ///
    /// Returns the errors of the tracks that failed to stop.
    pub fn stop_all(&self) -> Vec<CameraError> {
        let mut failures = Vec::new();
        for track in &self.tracks {
            match track.stop() {
                Ok(()) => debug!(stream = %self.stream_id, label = %track.label(), "Track stopped"),
                Err(e) => {
                    warn!(stream = %self.stream_id, label = %track.label(), error = %e, "Failed to stop track");
                    failures.push(e);
                }
            }
        }
        failures
    }

    /// Whether any track is still live
    pub fn any_live(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }
}

impl std::fmt::Debug for TrackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSet")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// An acquired media stream: tracks plus the frames they produce
pub struct MediaStream {
    tracks: TrackSet,
    frames: FrameReceiver,
}

impl MediaStream {
    /// Create a stream from its tracks and frame receiver
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>, frames: FrameReceiver) -> Self {
        Self {
            tracks: TrackSet {
                stream_id: id.into(),
                tracks,
            },
            frames,
        }
    }

    /// Stream identifier
    pub fn id(&self) -> &str {
        &self.tracks.stream_id
    }

    /// The stream's tracks
    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    /// Split into the track handles and the frame receiver
    pub fn split(self) -> (TrackSet, FrameReceiver) {
        (self.tracks, self.frames)
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("tracks", &self.tracks)
            .finish()
    }
}
