// SPDX-License-Identifier: GPL-3.0-only

//! Frame processor module for barcode decoding
//!
//! Turns camera frames into decode results: the [`decoder`] runs a
//! [`DecodeEngine`] over a live stream, the [`tasks`] module holds the
//! built-in engine.

pub mod decoder;
pub mod tasks;
pub mod types;

pub use decoder::{DecodeEngine, FrameDecoder};
pub use tasks::BarcodeDetector;
pub use types::{DecodeHints, DecodeResult, Decoded, EngineError, FrameRegion, FrameResult, Symbology};
