// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Decode engine implementations that ship with the crate.

pub mod barcode_detector;
pub mod ean;

pub use barcode_detector::BarcodeDetector;
