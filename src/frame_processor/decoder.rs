// SPDX-License-Identifier: GPL-3.0-only

//! Continuous frame decoding
//!
//! [`FrameDecoder`] wraps a pluggable [`DecodeEngine`] with fixed hints and
//! runs it over every frame a [`VideoSink`] produces. Decoding is CPU bound
//! and runs on the blocking pool so the runtime keeps serving the camera.

use super::types::{DecodeHints, DecodeResult, Decoded, EngineError, FrameResult, Symbology};
use crate::backends::camera::{CameraFrame, ScannerControls, VideoSink};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// A barcode decoding engine
pub trait DecodeEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Symbologies this engine can read
    fn supported_symbologies(&self) -> &[Symbology];

    /// Try to read one symbol from a frame
    fn decode(&self, frame: &CameraFrame, hints: &DecodeHints) -> Result<Decoded, EngineError>;
}

/// Decoder configured with a fixed engine and hints
#[derive(Clone)]
pub struct FrameDecoder {
    engine: Arc<dyn DecodeEngine>,
    hints: Arc<DecodeHints>,
}

impl FrameDecoder {
    /// Create a decoder
    ///
    /// Requested symbologies the engine cannot read are logged and ignored.
    pub fn new(engine: Arc<dyn DecodeEngine>, hints: DecodeHints) -> Self {
        let supported = engine.supported_symbologies();
        for symbology in &hints.symbologies {
            if !supported.contains(symbology) {
                warn!(
                    engine = %engine.name(),
                    symbology = %symbology,
                    "Requested symbology not supported by decode engine"
                );
            }
        }
        Self {
            engine,
            hints: Arc::new(hints),
        }
    }

    /// The hints passed to the engine
    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    /// Decode a single frame synchronously
    pub fn decode_frame(&self, frame: &CameraFrame) -> FrameResult {
        FrameResult {
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            result: DecodeResult::from_engine(self.engine.decode(frame, &self.hints)),
        }
    }

    /// Start decoding frames from `sink` until stopped or the source ends
    ///
    /// `on_frame` is called once per processed frame, never after the
    /// returned controls have been stopped.
    pub fn start<F>(&self, sink: Arc<dyn VideoSink>, mut on_frame: F) -> ScannerControls
    where
        F: FnMut(FrameResult) + Send + 'static,
    {
        let decoder = self.clone();
        ScannerControls::spawn("frame-decoder", move |stop| async move {
            let mut processed: u64 = 0;
            while let Some(frame) = sink.next_frame().await {
                if stop.is_set() {
                    break;
                }

                let sequence = frame.sequence;
                let captured_at = frame.captured_at;
                let worker = decoder.clone();
                let start = Instant::now();
                let result = match tokio::task::spawn_blocking(move || worker.decode_frame(&frame)).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, sequence, "Decode task failed");
                        FrameResult {
                            sequence,
                            captured_at,
                            result: DecodeResult::DecodeError(e.to_string()),
                        }
                    }
                };
                trace!(
                    sequence,
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "Frame decoded"
                );

                // Results that land after a stop request are discarded
                if stop.is_set() {
                    break;
                }
                on_frame(result);
                processed += 1;
            }
            debug!(processed, "Frame decoder finished");
        })
    }
}

impl std::fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("engine", &self.engine.name())
            .field("hints", &self.hints)
            .finish()
    }
}
