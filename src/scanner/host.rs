// SPDX-License-Identifier: GPL-3.0-only

//! Scanner host
//!
//! The owner of the scanner view. Holds the open/closed flag, wires the
//! camera session to the scan event controller and forwards visibility
//! changes. Only one session runs at a time; reopening waits for a pending
//! teardown to finish first.

use super::controller::{ControllerPolicy, DetectionHandler, FrameOutcome, ScanEventController};
use super::status::ScannerStatus;
use crate::backends::camera::manager::FrameHandler;
use crate::backends::camera::{CameraError, CameraSessionManager, MediaDevices, SessionPhase, VideoSink};
use crate::config::ScannerConfig;
use crate::errors::{ScannerError, ScannerResult};
use crate::frame_processor::{DecodeEngine, FrameDecoder, FrameResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct HostInner {
    manager: CameraSessionManager,
    controller: Mutex<ScanEventController>,
    handler: Arc<dyn DetectionHandler>,
    open: AtomicBool,
    teardown: tokio::sync::Mutex<()>,
}

impl HostInner {
    fn lock_controller(&self) -> MutexGuard<'_, ScanEventController> {
        self.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle_frame(self: &Arc<Self>, result: FrameResult) {
        let outcome = self.lock_controller().on_frame(result);
        match outcome {
            FrameOutcome::Ignored => {}
            FrameOutcome::Failed(e) => debug!(error = %e, "Frame failed, scanning continues"),
            FrameOutcome::Detected { code, close } => {
                self.handler.on_detected(&code);
                if close {
                    info!(code = %code, "Closing scanner after detection");
                    let inner = Arc::clone(self);
                    tokio::spawn(async move {
                        inner.close().await;
                    });
                }
            }
        }
    }

    async fn close(&self) -> Vec<CameraError> {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Closing scanner");
        }
        self.lock_controller().close();
        let _teardown = self.teardown.lock().await;
        let failures = self.manager.close().await;
        for failure in &failures {
            warn!(error = %failure, "Teardown step failed");
        }
        failures
    }
}

/// Host of one scanner view
#[derive(Clone)]
pub struct ScannerHost {
    inner: Arc<HostInner>,
}

impl ScannerHost {
    /// Create a host
    ///
    /// # Arguments
    /// * `media` - Platform camera access
    /// * `sink` - Surface the stream is shown on
    /// * `engine` - Decode engine
    /// * `config` - Cooldown, hints, resolution and close policy
    /// * `handler` - Receives accepted codes
    pub fn new(
        media: Arc<dyn MediaDevices>,
        sink: Arc<dyn VideoSink>,
        engine: Arc<dyn DecodeEngine>,
        config: &ScannerConfig,
        handler: Arc<dyn DetectionHandler>,
    ) -> Self {
        let decoder = FrameDecoder::new(engine, config.decode_hints());
        let policy = ControllerPolicy {
            cooldown: config.cooldown(),
            auto_close_on_detect: config.auto_close_on_detect,
        };
        let resolution = config.ideal_resolution;

        let inner = Arc::new_cyclic(|weak: &Weak<HostInner>| {
            let weak = weak.clone();
            let on_frame: FrameHandler = Arc::new(move |result| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_frame(result);
                }
            });
            HostInner {
                manager: CameraSessionManager::new(media, sink, decoder, on_frame)
                    .with_ideal_resolution(resolution),
                controller: Mutex::new(ScanEventController::new(policy)),
                handler,
                open: AtomicBool::new(false),
                teardown: tokio::sync::Mutex::new(()),
            }
        });
        Self { inner }
    }

    /// Open the scanner
    ///
    /// No-op while already open. Errors are also reflected in the status.
    pub async fn open(&self) -> ScannerResult<()> {
        if self.inner.open.swap(true, Ordering::SeqCst) {
            debug!("Scanner already open");
            return Ok(());
        }

        // Wait for a pending teardown
        drop(self.inner.teardown.lock().await);

        self.inner.lock_controller().begin();
        match self.inner.manager.open().await {
            Ok(()) => {
                self.publish_scanning();
                Ok(())
            }
            Err(ScannerError::Cancelled) => Err(ScannerError::Cancelled),
            Err(e) => {
                self.inner.lock_controller().fail(e.clone());
                Err(e)
            }
        }
    }

    /// Close the scanner, cancelling a pending setup
    ///
    /// Returns the teardown steps that failed.
    pub async fn close(&self) -> Vec<CameraError> {
        self.inner.close().await
    }

    /// Forward a visibility change of the hosting view
    pub async fn set_visibility(&self, visible: bool) -> ScannerResult<()> {
        if !self.is_open() {
            return Ok(());
        }
        match self.inner.manager.set_visibility(visible).await {
            Ok(()) => {
                if visible {
                    self.publish_scanning();
                }
                Ok(())
            }
            Err(ScannerError::Cancelled) => Err(ScannerError::Cancelled),
            Err(e) => {
                self.inner.lock_controller().fail(e.clone());
                Err(e)
            }
        }
    }

    // Stays Initializing while decoding is deferred for a hidden view
    fn publish_scanning(&self) {
        if self.inner.manager.has_active_controls() {
            self.inner.lock_controller().scanning();
        } else {
            debug!(phase = ?self.phase(), "Stream ready, decoding not started");
        }
    }

    /// Whether the scanner is open
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Current status
    pub fn status(&self) -> ScannerStatus {
        self.inner.lock_controller().status()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ScannerStatus> {
        self.inner.lock_controller().subscribe()
    }

    /// Session lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        self.inner.manager.phase()
    }

    /// Whether a decode loop is running
    pub fn is_decoding(&self) -> bool {
        self.inner.manager.has_active_controls()
    }
}

impl std::fmt::Debug for ScannerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerHost")
            .field("open", &self.is_open())
            .field("status", &self.status())
            .field("manager", &self.inner.manager)
            .finish()
    }
}
