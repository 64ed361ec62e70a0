// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic barcode frames
//!
//! Renders EAN-13 / EAN-8 symbols into grayscale frames so the pipeline can
//! be exercised without a real camera. The check digit is drawn as given,
//! which lets callers render deliberately broken symbols.

use crate::backends::camera::types::CameraFrame;
use crate::frame_processor::tasks::ean;

const BLACK: u8 = 0;
const WHITE: u8 = 255;

/// Geometry of a rendered symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolLayout {
    /// Width of one module in pixels
    pub module_px: u32,
    /// Quiet zone on each side, in modules
    pub quiet_modules: u32,
    /// Frame height in pixels; bars span the full height
    pub height: u32,
}

impl Default for SymbolLayout {
    fn default() -> Self {
        Self {
            module_px: 3,
            quiet_modules: 12,
            height: 120,
        }
    }
}

/// Render a symbol for `digits` (13 or 8 digits)
///
/// Returns `None` for any other input.
pub fn render_symbol(digits: &str, layout: &SymbolLayout) -> Option<CameraFrame> {
    let modules = ean::encode_modules(digits)?;
    let module_px = layout.module_px.max(1) as usize;
    let quiet = layout.quiet_modules as usize * module_px;
    let height = layout.height.max(1) as usize;

    let mut row = vec![WHITE; quiet];
    let mut black = true;
    for width in modules {
        let value = if black { BLACK } else { WHITE };
        row.extend(std::iter::repeat_n(value, width as usize * module_px));
        black = !black;
    }
    row.extend(std::iter::repeat_n(WHITE, quiet));

    let width = row.len();
    let mut data = Vec::with_capacity(width * height);
    for _ in 0..height {
        data.extend_from_slice(&row);
    }
    Some(CameraFrame::gray(width as u32, height as u32, data))
}

/// An all-white frame with nothing to decode
pub fn blank_frame(width: u32, height: u32) -> CameraFrame {
    CameraFrame::gray(width, height, vec![WHITE; (width * height) as usize])
}
