// SPDX-License-Identifier: GPL-3.0-only

//! Scan event controller
//!
//! Consumes decode results in frame order and decides which of them become
//! detections. A matched symbol is accepted when its text passes the checksum
//! gate and at least one cooldown has passed since the last accepted
//! detection, measured on frame capture instants.
//!
//! ```text
//! Initializing ──► Scanning ──► Detected ──(next frame)──► Scanning
//!      │              │
//!      └──► Error ◄───┘            any state ──► Closed
//! ```

use super::status::ScannerStatus;
use crate::barcode::{self, ScanCode};
use crate::errors::ScannerError;
use crate::frame_processor::{DecodeResult, FrameResult};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Receives accepted codes (the cart/lookup side)
pub trait DetectionHandler: Send + Sync {
    /// Called exactly once per accepted detection
    fn on_detected(&self, code: &ScanCode);
}

impl<F> DetectionHandler for F
where
    F: Fn(&ScanCode) + Send + Sync,
{
    fn on_detected(&self, code: &ScanCode) {
        self(code)
    }
}

/// Host-configurable controller behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPolicy {
    /// Minimum spacing between accepted detections
    pub cooldown: Duration,
    /// Close the session after the first accepted detection
    pub auto_close_on_detect: bool,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            cooldown: crate::constants::DETECTED_COOLDOWN,
            auto_close_on_detect: false,
        }
    }
}

/// What the controller made of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing to report
    Ignored,
    /// Accepted detection; `close` asks the host to close the session
    Detected { code: ScanCode, close: bool },
    /// The decoder failed on this frame
    Failed(ScannerError),
}

/// Scan event state machine
#[derive(Debug)]
pub struct ScanEventController {
    policy: ControllerPolicy,
    last_accepted: Option<Instant>,
    closing: bool,
    status: watch::Sender<ScannerStatus>,
}

impl ScanEventController {
    /// Create a controller in the `Closed` state
    pub fn new(policy: ControllerPolicy) -> Self {
        let (status, _) = watch::channel(ScannerStatus::Closed);
        Self {
            policy,
            last_accepted: None,
            closing: false,
            status,
        }
    }

    /// The active policy
    pub fn policy(&self) -> ControllerPolicy {
        self.policy
    }

    /// Current status
    pub fn status(&self) -> ScannerStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ScannerStatus> {
        self.status.subscribe()
    }

    /// A new session starts acquiring the camera
    pub fn begin(&mut self) {
        self.last_accepted = None;
        self.closing = false;
        self.set_status(ScannerStatus::Initializing);
    }

    /// Stream obtained and decode loop attached
    pub fn scanning(&mut self) {
        if self.status.borrow().clone() == ScannerStatus::Initializing {
            self.set_status(ScannerStatus::Scanning);
        }
    }

    /// Acquisition or decoding failed
    pub fn fail(&mut self, error: ScannerError) {
        if self.is_closed() {
            return;
        }
        self.set_status(ScannerStatus::Error(error));
    }

    /// The session was closed
    pub fn close(&mut self) {
        self.closing = true;
        self.set_status(ScannerStatus::Closed);
    }

    /// Whether the controller is closed or about to be
    pub fn is_closed(&self) -> bool {
        self.closing || *self.status.borrow() == ScannerStatus::Closed
    }

    /// Process one frame result
    pub fn on_frame(&mut self, frame: FrameResult) -> FrameOutcome {
        if self.is_closed() {
            trace!(sequence = frame.sequence, "Frame after close ignored");
            return FrameOutcome::Ignored;
        }

        let current = self.status();
        if matches!(current, ScannerStatus::Initializing | ScannerStatus::Detected(_)) {
            self.set_status(ScannerStatus::Scanning);
        }

        match frame.result {
            DecodeResult::NotFound => FrameOutcome::Ignored,
            DecodeResult::DecodeError(cause) => {
                warn!(sequence = frame.sequence, cause = %cause, "Decoder failed on frame");
                let error = ScannerError::Decoder(cause);
                self.set_status(ScannerStatus::Error(error.clone()));
                FrameOutcome::Failed(error)
            }
            DecodeResult::Matched(decoded) => {
                let Some(code) = barcode::get_valid_code(&decoded.text) else {
                    debug!(text = %decoded.text, symbology = %decoded.symbology, "Decoded text failed checksum gate");
                    return FrameOutcome::Ignored;
                };

                if let Some(last) = self.last_accepted
                    && frame.captured_at.saturating_duration_since(last) < self.policy.cooldown
                {
                    trace!(code = %code, "Detection within cooldown dropped");
                    return FrameOutcome::Ignored;
                }

                self.last_accepted = Some(frame.captured_at);
                let close = self.policy.auto_close_on_detect;
                if close {
                    self.closing = true;
                }
                debug!(code = %code, sequence = frame.sequence, close, "Detection accepted");
                self.set_status(ScannerStatus::Detected(code.clone()));
                FrameOutcome::Detected { code, close }
            }
        }
    }

    fn set_status(&self, status: ScannerStatus) {
        let previous = self.status.send_replace(status);
        if previous != *self.status.borrow() {
            debug!(from = %previous, to = %*self.status.borrow(), "Scanner status changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::{Decoded, Symbology};

    fn frame(base: Instant, ms: u64, result: DecodeResult) -> FrameResult {
        FrameResult {
            sequence: ms,
            captured_at: base + Duration::from_millis(ms),
            result,
        }
    }

    fn matched(text: &str) -> DecodeResult {
        DecodeResult::Matched(Decoded {
            text: text.to_string(),
            symbology: Symbology::Ean13,
        })
    }

    fn started(policy: ControllerPolicy) -> ScanEventController {
        let mut controller = ScanEventController::new(policy);
        controller.begin();
        controller.scanning();
        controller
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut controller = ScanEventController::new(ControllerPolicy::default());
        assert_eq!(controller.status(), ScannerStatus::Closed);
        controller.begin();
        assert_eq!(controller.status(), ScannerStatus::Initializing);
        controller.scanning();
        assert_eq!(controller.status(), ScannerStatus::Scanning);
        controller.close();
        assert_eq!(controller.status(), ScannerStatus::Closed);

        // Late setup completion does not resurrect a closed scanner
        controller.scanning();
        controller.fail(ScannerError::DeviceBusy);
        assert_eq!(controller.status(), ScannerStatus::Closed);
    }

    #[test]
    fn test_detection_then_back_to_scanning() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());

        let outcome = controller.on_frame(frame(base, 0, matched("4006381333931")));
        let code: ScanCode = "4006381333931".parse().unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Detected {
                code: code.clone(),
                close: false
            }
        );
        assert_eq!(controller.status(), ScannerStatus::Detected(code));

        controller.on_frame(frame(base, 33, DecodeResult::NotFound));
        assert_eq!(controller.status(), ScannerStatus::Scanning);
    }

    #[test]
    fn test_cooldown_boundary() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());
        let text = "4901234567894";

        assert!(matches!(
            controller.on_frame(frame(base, 0, matched(text))),
            FrameOutcome::Detected { .. }
        ));
        assert_eq!(
            controller.on_frame(frame(base, 699, matched(text))),
            FrameOutcome::Ignored
        );
        assert!(matches!(
            controller.on_frame(frame(base, 700, matched(text))),
            FrameOutcome::Detected { .. }
        ));
    }

    #[test]
    fn test_cooldown_applies_across_codes() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());
        controller.on_frame(frame(base, 0, matched("4901234567894")));
        assert_eq!(
            controller.on_frame(frame(base, 100, matched("4006381333931"))),
            FrameOutcome::Ignored
        );
    }

    #[test]
    fn test_invalid_text_never_detected() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());
        assert_eq!(
            controller.on_frame(frame(base, 0, matched("4901234567890"))),
            FrameOutcome::Ignored
        );
        assert_eq!(
            controller.on_frame(frame(base, 10, matched("96385074"))),
            FrameOutcome::Ignored
        );
        assert_eq!(controller.status(), ScannerStatus::Scanning);

        // A rejected read does not start a cooldown
        assert!(matches!(
            controller.on_frame(frame(base, 20, matched("4901234567894"))),
            FrameOutcome::Detected { .. }
        ));
    }

    #[test]
    fn test_longer_text_not_truncated_into_code() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());

        // First 13 digits checksum, the 14th makes it a different symbol
        assert_eq!(
            controller.on_frame(frame(base, 0, matched("40063813339315"))),
            FrameOutcome::Ignored
        );
        assert_eq!(
            controller.on_frame(frame(base, 10, matched("40063813339315999"))),
            FrameOutcome::Ignored
        );
        assert_eq!(controller.status(), ScannerStatus::Scanning);
    }

    #[test]
    fn test_decode_error_sets_error_and_keeps_scanning() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());

        let outcome = controller.on_frame(frame(base, 0, DecodeResult::DecodeError("bad frame".into())));
        assert_eq!(
            outcome,
            FrameOutcome::Failed(ScannerError::Decoder("bad frame".into()))
        );
        assert!(controller.status().is_error());

        // A routine miss keeps the error visible
        controller.on_frame(frame(base, 33, DecodeResult::NotFound));
        assert!(controller.status().is_error());

        // A detection still goes through
        assert!(matches!(
            controller.on_frame(frame(base, 66, matched("4006381333931"))),
            FrameOutcome::Detected { .. }
        ));
    }

    #[test]
    fn test_auto_close_emits_once() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy {
            auto_close_on_detect: true,
            ..ControllerPolicy::default()
        });

        assert!(matches!(
            controller.on_frame(frame(base, 0, matched("4006381333931"))),
            FrameOutcome::Detected { close: true, .. }
        ));
        assert!(controller.is_closed());
        assert_eq!(
            controller.on_frame(frame(base, 5000, matched("4006381333931"))),
            FrameOutcome::Ignored
        );
    }

    #[test]
    fn test_begin_resets_cooldown() {
        let base = Instant::now();
        let mut controller = started(ControllerPolicy::default());
        controller.on_frame(frame(base, 0, matched("4006381333931")));
        controller.close();

        controller.begin();
        assert!(matches!(
            controller.on_frame(frame(base, 10, matched("4006381333931"))),
            FrameOutcome::Detected { .. }
        ));
    }

    #[test]
    fn test_subscribers_see_changes() {
        let mut controller = ScanEventController::new(ControllerPolicy::default());
        let rx = controller.subscribe();
        controller.begin();
        assert_eq!(*rx.borrow(), ScannerStatus::Initializing);
        controller.fail(ScannerError::PermissionDenied);
        assert_eq!(*rx.borrow(), ScannerStatus::Error(ScannerError::PermissionDenied));
    }
}
