// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle manager
//!
//! The manager provides:
//! - Stream acquisition with camera selection and error classification
//! - A single `ensure_scanning` path used on open and on resume
//! - Visibility handling (pause decoding while hidden, keep the stream)
//! - Teardown that runs every step even if one of them fails
//! - Cancellation of a pending setup by `close()`
//!
//! Cancellation is epoch based: every `open()` and `close()` advances the
//! epoch, and setup checks it again after each await. A stream that resolves
//! for a stale epoch is released and never attached.

use super::selection;
use super::types::*;
use super::{MediaDevices, ScannerControls, TrackSet, VideoSink};
use crate::constants::camera::IDEAL_RESOLUTION;
use crate::errors::{ScannerError, ScannerResult};
use crate::frame_processor::{FrameDecoder, FrameResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Callback receiving every processed frame
pub type FrameHandler = Arc<dyn Fn(FrameResult) + Send + Sync>;

/// Lifecycle phase of the camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Never opened, or the last open failed
    Idle,
    /// Waiting for a stream
    Acquiring,
    /// Stream attached and decode loop running
    Scanning,
    /// Stream attached, decoding paused while hidden
    Paused,
    /// Torn down
    Closed,
}

struct SessionState {
    phase: SessionPhase,
    session_id: Option<Uuid>,
    hidden: bool,
    tracks: Option<TrackSet>,
    controls: Option<ScannerControls>,
}

/// Camera session manager
///
/// Owns the stream tracks and the decode controls of at most one session.
/// Thread-safe and can be shared across tasks.
pub struct CameraSessionManager {
    media: Arc<dyn MediaDevices>,
    sink: Arc<dyn VideoSink>,
    decoder: FrameDecoder,
    on_frame: FrameHandler,
    ideal_resolution: Resolution,
    state: Mutex<SessionState>,
    epoch: AtomicU64,
}

impl CameraSessionManager {
    /// Create a manager
    ///
    /// # Arguments
    /// * `media` - Platform camera access
    /// * `sink` - Surface the stream is attached to
    /// * `decoder` - Decoder run over the sink's frames
    /// * `on_frame` - Receives one result per processed frame
    pub fn new(
        media: Arc<dyn MediaDevices>,
        sink: Arc<dyn VideoSink>,
        decoder: FrameDecoder,
        on_frame: FrameHandler,
    ) -> Self {
        Self {
            media,
            sink,
            decoder,
            on_frame,
            ideal_resolution: IDEAL_RESOLUTION,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                session_id: None,
                hidden: false,
                tracks: None,
                controls: None,
            }),
            epoch: AtomicU64::new(0),
        }
    }

    /// Override the ideal capture resolution
    pub fn with_ideal_resolution(mut self, resolution: Resolution) -> Self {
        self.ideal_resolution = resolution;
        self
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase
    }

    /// Id of the current session, if one is open
    pub fn session_id(&self) -> Option<Uuid> {
        self.lock_state().session_id
    }

    /// Whether a decode loop is attached
    pub fn has_active_controls(&self) -> bool {
        self.lock_state().controls.is_some()
    }

    /// Tracks of the current stream
    pub fn tracks(&self) -> Option<TrackSet> {
        self.lock_state().tracks.clone()
    }

    /// Open a session: acquire a stream and start decoding
    ///
    /// Returns [`ScannerError::Cancelled`] when `close()` ran while setup was
    /// pending.
    pub async fn open(&self) -> ScannerResult<()> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = Uuid::new_v4();
        {
            let mut state = self.lock_state();
            state.phase = SessionPhase::Acquiring;
            state.session_id = Some(session_id);
        }

        let span = info_span!("scanner_session", id = %session_id);
        async {
            info!("Opening scanner session");
            let result = self.ensure_scanning_at(epoch).await;
            if let Err(ref e) = result
                && *e != ScannerError::Cancelled
            {
                warn!(error = %e, "Scanner session failed to start");
                let mut state = self.lock_state();
                if self.epoch.load(Ordering::SeqCst) == epoch {
                    state.phase = SessionPhase::Idle;
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Make sure frames are being decoded
    ///
    /// No-op when a decode loop is already attached. Re-acquires a stream
    /// (picking the back camera again) when the sink has lost its source.
    pub async fn ensure_scanning(&self) -> ScannerResult<()> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if matches!(self.phase(), SessionPhase::Closed | SessionPhase::Idle) {
            return Err(ScannerError::Cancelled);
        }
        self.ensure_scanning_at(epoch).await
    }

    /// Pause decoding while hidden, resume when visible again
    ///
    /// Hiding stops the decode loop but keeps the stream.
    pub async fn set_visibility(&self, visible: bool) -> ScannerResult<()> {
        if !visible {
            let controls = {
                let mut state = self.lock_state();
                state.hidden = true;
                if state.phase == SessionPhase::Scanning {
                    state.phase = SessionPhase::Paused;
                }
                state.controls.take()
            };
            if let Some(controls) = controls {
                controls.stop_and_wait().await;
                debug!("Decoding paused while hidden");
            }
            return Ok(());
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let resume = {
            let mut state = self.lock_state();
            state.hidden = false;
            state.phase == SessionPhase::Paused && state.controls.is_none()
        };
        if !resume {
            return Ok(());
        }
        debug!("Visible again, resuming decoding");
        self.ensure_scanning_at(epoch).await
    }

    /// Cancel any pending setup and tear the session down
    ///
    /// Returns the failures of individual teardown steps; every step runs
    /// regardless.
    pub async fn close(&self) -> Vec<CameraError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let failures = self.teardown().await;
        let mut state = self.lock_state();
        if let Some(id) = state.session_id.take() {
            info!(id = %id, failures = failures.len(), "Scanner session closed");
        }
        state.phase = SessionPhase::Closed;
        state.hidden = false;
        failures
    }

    /// Stop decode controls, stop every track, clear the sink source
    async fn teardown(&self) -> Vec<CameraError> {
        let (controls, failures) = self.release();
        if let Some(controls) = controls {
            controls.stop_and_wait().await;
        }
        failures
    }

    /// Synchronous part of teardown
    ///
    /// The stopped controls are returned so the caller can wait for the
    /// loop task to finish.
    fn release(&self) -> (Option<ScannerControls>, Vec<CameraError>) {
        let (controls, tracks) = {
            let mut state = self.lock_state();
            (state.controls.take(), state.tracks.take())
        };

        let mut failures = Vec::new();
        if let Some(controls) = &controls {
            controls.stop();
        }
        if let Some(tracks) = tracks {
            failures.extend(tracks.stop_all());
        }
        if let Err(e) = self.sink.clear_source() {
            warn!(error = %e, "Failed to clear video sink source");
            failures.push(e);
        }
        (controls, failures)
    }

    async fn ensure_scanning_at(&self, epoch: u64) -> ScannerResult<()> {
        if self.has_active_controls() {
            return Ok(());
        }
        if !self.sink.has_source() {
            self.acquire(epoch).await?;
        }

        let handler = Arc::clone(&self.on_frame);
        let mut state = self.lock_state();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(ScannerError::Cancelled);
        }
        if state.controls.is_some() {
            return Ok(());
        }
        if state.hidden {
            state.phase = SessionPhase::Paused;
            debug!("Stream ready while hidden, decoding deferred");
            return Ok(());
        }
        state.controls = Some(self.decoder.start(Arc::clone(&self.sink), move |result| handler(result)));
        state.phase = SessionPhase::Scanning;
        info!("Scanning started");
        Ok(())
    }

    async fn acquire(&self, epoch: u64) -> ScannerResult<()> {
        let constraints = selection::select_constraints(self.media.as_ref(), self.ideal_resolution).await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(ScannerError::Cancelled);
        }

        debug!(?constraints, "Requesting camera stream");
        let outcome = self.media.get_user_media(constraints).await;
        let stale = self.epoch.load(Ordering::SeqCst) != epoch;
        let stream = match outcome {
            Ok(stream) => stream,
            Err(_) if stale => return Err(ScannerError::Cancelled),
            Err(e) => return Err(self.classify(e)),
        };

        let (tracks, frames) = stream.split();
        if stale {
            info!(stream = %tracks.stream_id(), "Stream resolved after cancellation, releasing it");
            tracks.stop_all();
            return Err(ScannerError::Cancelled);
        }

        if let Err(e) = self.sink.attach(tracks.stream_id(), frames) {
            tracks.stop_all();
            return Err(e.into());
        }

        {
            let mut state = self.lock_state();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                drop(state);
                info!(stream = %tracks.stream_id(), "Session closed during attach, releasing stream");
                tracks.stop_all();
                if let Err(e) = self.sink.clear_source() {
                    warn!(error = %e, "Failed to clear video sink source");
                }
                return Err(ScannerError::Cancelled);
            }
            if let Some(previous) = state.tracks.replace(tracks) {
                previous.stop_all();
            }
        }

        if let Err(e) = self.sink.play().await {
            warn!(error = %e, "Video sink refused to play");
            for failure in self.teardown().await {
                warn!(error = %failure, "Teardown step failed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Map a media error to the scanner taxonomy
    ///
    /// Insecure contexts are reported as such unless the user explicitly
    /// denied access.
    fn classify(&self, error: CameraError) -> ScannerError {
        match error {
            CameraError::NotAllowed(_) => ScannerError::PermissionDenied,
            _ if !self.media.is_secure_context() => ScannerError::InsecureContext,
            other => other.into(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        let open = {
            let state = self.lock_state();
            state.controls.is_some() || state.tracks.is_some()
        };
        if open {
            debug!("CameraSessionManager dropped, releasing camera");
            let (_controls, failures) = self.release();
            for failure in failures {
                warn!(error = %failure, "Teardown step failed");
            }
        }
    }
}

impl std::fmt::Debug for CameraSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionManager")
            .field("phase", &self.phase())
            .field("decoder", &self.decoder)
            .finish()
    }
}
