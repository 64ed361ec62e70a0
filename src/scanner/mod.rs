// SPDX-License-Identifier: GPL-3.0-only

//! Scanner layer
//!
//! Turns decode results into cart-ready codes:
//!
//! - [`controller`]: cooldown and status state machine
//! - [`host`]: open/close/visibility lifecycle of one scanner view
//! - [`bridge`]: validation, duplicate guard and listener registry shared by
//!   camera, manual entry and external triggers
//! - [`status`]: operator-facing status

pub mod bridge;
pub mod controller;
pub mod host;
pub mod status;

pub use bridge::{ManualEntry, ManualInput, Registration, ScanBridge, ScanEvent, ScanSource};
pub use controller::{ControllerPolicy, DetectionHandler, FrameOutcome, ScanEventController};
pub use host::ScannerHost;
pub use status::ScannerStatus;
