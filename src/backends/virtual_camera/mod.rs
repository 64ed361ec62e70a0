// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! An in-process [`MediaDevices`] implementation that streams prepared
//! frames (synthetic symbols or loaded images) instead of camera output.
//! Used by the `simulate` command and by tests. Failure modes of a real
//! platform can be scripted: denied permission, slow acquisition, hidden
//! device labels, tracks that fail to stop.
//!
//! # Architecture
//!
//! ```text
//! Prepared frames (cycled)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ Producer task    │  ← paced at the configured fps, or as fast as
//! │ (per stream)     │    the consumer reads
//! └──────────────────┘
//!        │ FrameSender
//!        ▼
//!   VideoSink / decode loop
//! ```

mod file_source;
pub mod synthetic;

pub use file_source::load_image_as_frame;
pub use synthetic::{SymbolLayout, blank_frame, render_symbol};

use crate::backends::camera::types::*;
use crate::backends::camera::{MediaDevices, MediaStream, MediaTrack};
use crate::constants::{latency, virtual_camera as vc_timing};
use futures::SinkExt;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How the producer delivers frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One frame per interval in wall-clock time; frames are dropped when
    /// the consumer falls behind
    Realtime,
    /// Every frame is delivered as soon as the consumer takes it; capture
    /// instants still advance by one frame interval per frame
    Immediate,
}

/// Counters shared by the virtual camera and its streams
#[derive(Debug, Default)]
pub struct VirtualCameraStats {
    acquisitions: AtomicUsize,
    tracks_started: AtomicUsize,
    tracks_stopped: AtomicUsize,
    overlapping_requests: AtomicUsize,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

impl VirtualCameraStats {
    /// Successful `get_user_media` calls (priming requests included)
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Tracks whose `stop()` has been called
    pub fn tracks_stopped(&self) -> usize {
        self.tracks_stopped.load(Ordering::SeqCst)
    }

    /// Tracks handed out and not stopped yet
    pub fn live_tracks(&self) -> usize {
        self.tracks_started
            .load(Ordering::SeqCst)
            .saturating_sub(self.tracks_stopped())
    }

    /// Stream requests that arrived while an earlier track was still live
    pub fn overlapping_requests(&self) -> usize {
        self.overlapping_requests.load(Ordering::SeqCst)
    }

    /// Frames delivered to consumers
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::SeqCst)
    }

    /// Frames dropped because the consumer was behind
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::SeqCst)
    }
}

/// Virtual camera
pub struct VirtualCamera {
    devices: Vec<MediaDeviceInfo>,
    frames: Arc<[CameraFrame]>,
    fps: u32,
    pacing: Pacing,
    frame_limit: Option<u64>,
    acquire_delay: Duration,
    failure: Option<CameraError>,
    secure_context: bool,
    hide_labels_until_granted: bool,
    fail_track_stop: bool,
    track_stop_delay: Duration,
    granted: AtomicBool,
    next_stream: AtomicU64,
    stats: Arc<VirtualCameraStats>,
}

impl VirtualCamera {
    /// Create a virtual camera cycling through `frames`
    ///
    /// Lists a single rear-facing device by default.
    pub fn new(frames: Vec<CameraFrame>) -> Self {
        Self {
            devices: vec![MediaDeviceInfo::video("virtual-0", "Virtual Back Camera")],
            frames: Arc::from(frames.into_boxed_slice()),
            fps: vc_timing::DEFAULT_FPS,
            pacing: Pacing::Realtime,
            frame_limit: None,
            acquire_delay: Duration::ZERO,
            failure: None,
            secure_context: true,
            hide_labels_until_granted: false,
            fail_track_stop: false,
            track_stop_delay: Duration::ZERO,
            granted: AtomicBool::new(false),
            next_stream: AtomicU64::new(0),
            stats: Arc::new(VirtualCameraStats::default()),
        }
    }

    /// Replace the listed devices
    pub fn with_devices(mut self, devices: Vec<MediaDeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Frames per second
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Frame delivery mode
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// End each stream after `limit` frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Delay before `get_user_media` resolves (a permission prompt)
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Make every `get_user_media` call fail with `error`
    pub fn failing_with(mut self, error: CameraError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Pretend to run outside a secure context
    pub fn insecure(mut self) -> Self {
        self.secure_context = false;
        self
    }

    /// Report empty labels until a stream has been granted once
    pub fn hiding_labels_until_granted(mut self) -> Self {
        self.hide_labels_until_granted = true;
        self
    }

    /// Make `MediaTrack::stop` report an error
    pub fn with_failing_track_stop(mut self) -> Self {
        self.fail_track_stop = true;
        self
    }

    /// Make `MediaTrack::stop` block for `delay` before the device is released
    pub fn with_track_stop_delay(mut self, delay: Duration) -> Self {
        self.track_stop_delay = delay;
        self
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<VirtualCameraStats> {
        Arc::clone(&self.stats)
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }

    fn open_stream(&self, constraints: &MediaConstraints) -> CameraResult<MediaStream> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if constraints.audio {
            return Err(CameraError::NotFound("virtual camera has no microphone".into()));
        }
        let device = match &constraints.video.device_id {
            Some(id) => self
                .devices
                .iter()
                .find(|d| &d.device_id == id)
                .ok_or_else(|| CameraError::OverConstrained(format!("no device with id '{}'", id)))?,
            None => self
                .devices
                .first()
                .ok_or_else(|| CameraError::NotFound("no video input".into()))?,
        };
        if self.frames.is_empty() {
            return Err(CameraError::NotReadable("virtual camera has no frames".into()));
        }

        let stream_id = format!(
            "virtual-stream-{}",
            self.next_stream.fetch_add(1, Ordering::SeqCst)
        );
        let label = if device.label.is_empty() {
            "Virtual Camera".to_string()
        } else {
            device.label.clone()
        };
        let track = Arc::new(VirtualTrack {
            label,
            live: Arc::new(AtomicBool::new(true)),
            fail_stop: self.fail_track_stop,
            stop_delay: self.track_stop_delay,
            stats: Arc::clone(&self.stats),
        });

        let (tx, rx) = mpsc::channel(latency::FRAME_CHANNEL_CAPACITY);
        let producer = Producer {
            frames: Arc::clone(&self.frames),
            interval: self.frame_interval(),
            pacing: self.pacing,
            limit: self.frame_limit,
            live: Arc::clone(&track.live),
            stats: Arc::clone(&self.stats),
        };
        tokio::spawn(producer.run(stream_id.clone(), tx));

        self.granted.store(true, Ordering::SeqCst);
        self.stats.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.stats.tracks_started.fetch_add(1, Ordering::SeqCst);
        info!(stream = %stream_id, device = %device.device_id, "Virtual camera stream started");

        Ok(MediaStream::new(stream_id, vec![track as Arc<dyn MediaTrack>], rx))
    }
}

impl MediaDevices for VirtualCamera {
    fn enumerate_devices(&self) -> BoxFuture<'_, CameraResult<Vec<MediaDeviceInfo>>> {
        Box::pin(async move {
            let hide = self.hide_labels_until_granted && !self.granted.load(Ordering::SeqCst);
            Ok(self
                .devices
                .iter()
                .map(|d| MediaDeviceInfo {
                    label: if hide { String::new() } else { d.label.clone() },
                    ..d.clone()
                })
                .collect())
        })
    }

    fn get_user_media(&self, constraints: MediaConstraints) -> BoxFuture<'_, CameraResult<MediaStream>> {
        Box::pin(async move {
            let live = self.stats.live_tracks();
            if live > 0 {
                debug!(live, "Stream requested while a track is still live");
                self.stats.overlapping_requests.fetch_add(1, Ordering::SeqCst);
            }
            if !self.acquire_delay.is_zero() {
                tokio::time::sleep(self.acquire_delay).await;
            }
            self.open_stream(&constraints)
        })
    }

    fn is_secure_context(&self) -> bool {
        self.secure_context
    }
}

struct VirtualTrack {
    label: String,
    live: Arc<AtomicBool>,
    fail_stop: bool,
    stop_delay: Duration,
    stats: Arc<VirtualCameraStats>,
}

impl MediaTrack for VirtualTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) -> CameraResult<()> {
        if !self.stop_delay.is_zero() && self.is_live() {
            std::thread::sleep(self.stop_delay);
        }
        if self.live.swap(false, Ordering::SeqCst) {
            self.stats.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_stop {
            return Err(CameraError::Other(format!("track '{}' refused to stop", self.label)));
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

struct Producer {
    frames: Arc<[CameraFrame]>,
    interval: Duration,
    pacing: Pacing,
    limit: Option<u64>,
    live: Arc<AtomicBool>,
    stats: Arc<VirtualCameraStats>,
}

impl Producer {
    async fn run(self, stream_id: String, mut tx: FrameSender) {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        let mut sequence: u64 = 0;

        while self.live.load(Ordering::SeqCst) {
            if self.limit.is_some_and(|limit| sequence >= limit) {
                break;
            }
            let template = &self.frames[(sequence % self.frames.len() as u64) as usize];

            match self.pacing {
                Pacing::Realtime => {
                    ticker.tick().await;
                    if !self.live.load(Ordering::SeqCst) {
                        break;
                    }
                    let frame = template.restamped(sequence, Instant::now());
                    match tx.try_send(frame) {
                        Ok(()) => {
                            self.stats.frames_sent.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) if e.is_full() => {
                            self.stats.frames_dropped.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(_) => break,
                    }
                }
                Pacing::Immediate => {
                    let captured_at = start + self.interval * sequence as u32;
                    if tx.send(template.restamped(sequence, captured_at)).await.is_err() {
                        break;
                    }
                    self.stats.frames_sent.fetch_add(1, Ordering::SeqCst);
                }
            }
            sequence += 1;
        }

        debug!(stream = %stream_id, frames = sequence, "Virtual camera producer finished");
    }
}
