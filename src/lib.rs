// SPDX-License-Identifier: GPL-3.0-only

//! POS Scanner - barcode scanning pipeline for point-of-sale storefronts
//!
//! This library turns a camera stream into validated EAN-13 codes for a
//! shopping cart: continuous frame decoding, checksum validation, duplicate
//! suppression, and camera lifecycle handling across visibility changes.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`barcode`]: EAN-13 normalization and checksum gate
//! - [`frame_processor`]: Decode engines and the per-frame decode loop
//! - [`backends`]: Camera access traits, session manager and virtual camera
//! - [`scanner`]: Scan event controller, host lifecycle and scan bridge
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let host = ScannerHost::new(media, sink, Arc::new(BarcodeDetector::new()), &config, handler);
//! host.open().await?;
//! ```

pub mod backends;
pub mod barcode;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod scanner;

// Re-export commonly used types
pub use barcode::{InvalidCode, ScanCode};
pub use config::ScannerConfig;
pub use errors::{AppError, ScannerError};
pub use scanner::{ScanBridge, ScanEvent, ScannerHost, ScannerStatus};
