// SPDX-License-Identifier: GPL-3.0-only

//! EAN barcode detection task
//!
//! Built-in decode engine for EAN-13 and EAN-8. Frames are converted to
//! luma, cropped to the region of interest and optionally downscaled, then a
//! set of rows is binarized and searched for guard patterns. Normal mode reads
//! a handful of rows around the centre; try-harder mode sweeps the whole
//! region in both directions so upside-down symbols are read too.

use super::ean::{self, Run};
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::frame_processor::decoder::DecodeEngine;
use crate::frame_processor::types::{DecodeHints, Decoded, EngineError, Symbology};
use tracing::trace;

/// Row positions (fraction of region height) scanned in normal mode
const NORMAL_ROWS: [f32; 5] = [0.5, 0.4, 0.6, 0.3, 0.7];

/// Rows scanned in try-harder mode
const TRY_HARDER_ROWS: usize = 24;

/// Bias towards white for the adaptive threshold
const ADAPTIVE_BIAS: i32 = 5;

const SUPPORTED: &[Symbology] = &[Symbology::Ean13, Symbology::Ean8];

/// Grayscale plane extracted from a frame
#[derive(Debug, Clone)]
pub struct LumaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl LumaImage {
    fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }
}

/// EAN barcode detector
///
/// Stateless apart from its configuration, so one instance can be shared
/// between decode loops.
#[derive(Debug, Clone, Default)]
pub struct BarcodeDetector;

impl BarcodeDetector {
    /// Create a new detector
    pub fn new() -> Self {
        Self
    }

    /// Decode a prepared luma image
    pub fn detect_luma(&self, image: &LumaImage, hints: &DecodeHints) -> Result<Decoded, EngineError> {
        if image.width == 0 || image.height == 0 {
            return Err(EngineError::NotFound);
        }

        let rows = scan_rows(image.height, hints.try_harder);
        let mut miss = EngineError::NotFound;
        let mut reversed = Vec::with_capacity(image.width);

        for y in rows {
            let row = image.row(y);
            match decode_row(row, hints) {
                Ok(decoded) => {
                    trace!(row = y, text = %decoded.text, "Decoded row");
                    return Ok(decoded);
                }
                Err(e) => miss = worse_miss(miss, e),
            }

            if hints.try_harder {
                reversed.clear();
                reversed.extend(row.iter().rev());
                match decode_row(&reversed, hints) {
                    Ok(decoded) => {
                        trace!(row = y, text = %decoded.text, "Decoded reversed row");
                        return Ok(decoded);
                    }
                    Err(e) => miss = worse_miss(miss, e),
                }
            }
        }

        Err(miss)
    }
}

impl DecodeEngine for BarcodeDetector {
    fn name(&self) -> &'static str {
        "ean-scanline"
    }

    fn supported_symbologies(&self) -> &'static [Symbology] {
        SUPPORTED
    }

    fn decode(&self, frame: &CameraFrame, hints: &DecodeHints) -> Result<Decoded, EngineError> {
        let start = std::time::Instant::now();
        let image = prepare_luma(frame, hints)?;
        let conversion_time = start.elapsed();

        let result = self.detect_luma(&image, hints);
        trace!(
            width = image.width,
            height = image.height,
            conversion_us = conversion_time.as_micros(),
            total_us = start.elapsed().as_micros(),
            "Barcode detection complete"
        );
        result
    }
}

/// Keep the most informative of two misses
fn worse_miss(a: EngineError, b: EngineError) -> EngineError {
    fn rank(e: &EngineError) -> u8 {
        match e {
            EngineError::NotFound => 0,
            EngineError::Format => 1,
            EngineError::Checksum => 2,
            EngineError::Internal(_) => 3,
        }
    }
    if rank(&b) > rank(&a) { b } else { a }
}

/// Row indices to scan for a region of the given height
fn scan_rows(height: usize, try_harder: bool) -> Vec<usize> {
    let last = height.saturating_sub(1);
    let mut rows: Vec<usize> = if try_harder {
        let count = TRY_HARDER_ROWS.min(height).max(1);
        (0..count)
            .map(|i| (i * last) / (count - 1).max(1))
            .collect()
    } else {
        NORMAL_ROWS
            .iter()
            .map(|f| ((last as f32) * f).round() as usize)
            .collect()
    };

    if try_harder {
        // Centre first: symbols are usually held mid-frame
        let mid = height / 2;
        rows.sort_by_key(|&y| y.abs_diff(mid));
    }

    let mut seen = Vec::with_capacity(rows.len());
    rows.retain(|&y| {
        if seen.contains(&y) {
            false
        } else {
            seen.push(y);
            true
        }
    });
    rows
}

/// Decode one luma row, trying adaptive then global binarization
fn decode_row(row: &[u8], hints: &DecodeHints) -> Result<Decoded, EngineError> {
    let mut miss = EngineError::NotFound;

    for binarized in [binarize_adaptive(row), binarize_global(row)] {
        let runs = ean::runs(&binarized);
        match decode_runs(&runs, hints) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => miss = worse_miss(miss, e),
        }
    }

    Err(miss)
}

fn decode_runs(runs: &[Run], hints: &DecodeHints) -> Result<Decoded, EngineError> {
    let mut miss = EngineError::NotFound;
    let symbologies: Vec<Symbology> = [Symbology::Ean13, Symbology::Ean8]
        .into_iter()
        .filter(|s| hints.allows(*s))
        .collect();

    let shortest = symbologies
        .iter()
        .map(|s| ean::symbol_runs(*s))
        .min()
        .unwrap_or(usize::MAX);
    if runs.len() < shortest {
        return Err(miss);
    }

    for start in 0..runs.len() {
        if !runs[start].black {
            continue;
        }
        for &symbology in &symbologies {
            match ean::decode_at(runs, start, symbology) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => miss = worse_miss(miss, e),
            }
        }
    }

    Err(miss)
}

/// Global threshold: midpoint of the row mean and the min/max midpoint
fn binarize_global(row: &[u8]) -> Vec<bool> {
    if row.is_empty() {
        return Vec::new();
    }
    let (min, max) = row
        .iter()
        .fold((u8::MAX, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let mean = (row.iter().map(|&v| v as u64).sum::<u64>() / row.len() as u64) as u16;
    let mid = (min as u16 + max as u16) / 2;
    let threshold = ((mean + mid) / 2) as u8;
    row.iter().map(|&v| v < threshold).collect()
}

/// Sliding-mean threshold, robust to uneven lighting
fn binarize_adaptive(row: &[u8]) -> Vec<bool> {
    let n = row.len();
    if n == 0 {
        return Vec::new();
    }
    let window = (n / 32).clamp(8, 64);

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0u32);
    let mut acc = 0u32;
    for &v in row {
        acc += v as u32;
        prefix.push(acc);
    }

    (0..n)
        .map(|i| {
            let left = i.saturating_sub(window);
            let right = (i + window).min(n - 1);
            let len = (right - left + 1) as u32;
            let mean = ((prefix[right + 1] - prefix[left]) / len) as i32;
            (row[i] as i32) < mean - ADAPTIVE_BIAS
        })
        .collect()
}

/// Extract the luma plane for the region of interest, downscaled if needed
pub fn prepare_luma(frame: &CameraFrame, hints: &DecodeHints) -> Result<LumaImage, EngineError> {
    let luma = copy_luma_without_stride(frame, hints)?;
    let max_dimension = hints.max_dimension.max(1) as usize;

    if luma.width > max_dimension || luma.height > max_dimension {
        let scale = (luma.width as f32 / max_dimension as f32)
            .max(luma.height as f32 / max_dimension as f32);
        let new_width = ((luma.width as f32 / scale) as usize).max(1);
        let new_height = ((luma.height as f32 / scale) as usize).max(1);
        Ok(downscale_luma(&luma, new_width, new_height))
    } else {
        Ok(luma)
    }
}

/// Copy the region of interest as tightly packed luma
fn copy_luma_without_stride(frame: &CameraFrame, hints: &DecodeHints) -> Result<LumaImage, EngineError> {
    let bpp = frame.format.bytes_per_pixel();
    let stride = frame.stride as usize;
    if (frame.width as usize) * bpp > stride {
        return Err(EngineError::Internal(format!(
            "stride {} too small for {} pixels of {:?}",
            stride, frame.width, frame.format
        )));
    }
    if frame.width == 0 || frame.height == 0 {
        return Ok(LumaImage {
            width: 0,
            height: 0,
            data: Vec::new(),
        });
    }

    let (x0, y0, width, height) = hints
        .region_of_interest
        .map(|roi| roi.to_pixels(frame.width, frame.height))
        .unwrap_or((0, 0, frame.width, frame.height));
    let (x0, y0, width, height) = (x0 as usize, y0 as usize, width as usize, height as usize);

    let needed = (y0 + height - 1) * stride + (x0 + width) * bpp;
    if frame.data.len() < needed {
        return Err(EngineError::Internal(format!(
            "frame buffer holds {} bytes, {} required",
            frame.data.len(),
            needed
        )));
    }

    let mut data = Vec::with_capacity(width * height);
    for y in y0..y0 + height {
        let row_start = y * stride + x0 * bpp;
        let row = &frame.data[row_start..row_start + width * bpp];
        match frame.format {
            PixelFormat::Gray8 => data.extend_from_slice(row),
            PixelFormat::RGBA | PixelFormat::RGB24 => {
                data.extend(row.chunks_exact(bpp).map(|px| {
                    // BT.601 luma, integer weights summing to 256
                    ((px[0] as u32 * 77 + px[1] as u32 * 150 + px[2] as u32 * 29) >> 8) as u8
                }));
            }
        }
    }

    Ok(LumaImage {
        width,
        height,
        data,
    })
}

/// Downscale a luma image using bilinear interpolation
fn downscale_luma(src: &LumaImage, dst_width: usize, dst_height: usize) -> LumaImage {
    let mut data = Vec::with_capacity(dst_width * dst_height);

    let x_ratio = src.width as f32 / dst_width as f32;
    let y_ratio = src.height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x as usize).min(src.width - 1);
            let y0 = (src_y as usize).min(src.height - 1);
            let x1 = (x0 + 1).min(src.width - 1);
            let y1 = (y0 + 1).min(src.height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let px = |px: usize, py: usize| src.data[py * src.width + px] as f32;

            let value = px(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                + px(x1, y0) * x_frac * (1.0 - y_frac)
                + px(x0, y1) * (1.0 - x_frac) * y_frac
                + px(x1, y1) * x_frac * y_frac;

            data.push(value as u8);
        }
    }

    LumaImage {
        width: dst_width,
        height: dst_height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::synthetic::{SymbolLayout, render_symbol};
    use crate::frame_processor::types::FrameRegion;
    use std::sync::Arc;
    use std::time::Instant;

    fn hints() -> DecodeHints {
        DecodeHints {
            max_dimension: 4096,
            ..DecodeHints::default()
        }
    }

    #[test]
    fn test_decode_rendered_ean13() {
        let frame = render_symbol("4901234567894", &SymbolLayout::default()).unwrap();
        let decoded = BarcodeDetector::new().decode(&frame, &hints()).unwrap();
        assert_eq!(decoded.text, "4901234567894");
        assert_eq!(decoded.symbology, Symbology::Ean13);
    }

    #[test]
    fn test_ean8_needs_hint() {
        let frame = render_symbol("96385074", &SymbolLayout::default()).unwrap();
        let detector = BarcodeDetector::new();

        assert_eq!(detector.decode(&frame, &hints()), Err(EngineError::NotFound));

        let mut with_ean8 = DecodeHints::with_symbologies(&[Symbology::Ean8]);
        with_ean8.max_dimension = 4096;
        let decoded = detector.decode(&frame, &with_ean8).unwrap();
        assert_eq!(decoded.text, "96385074");
        assert_eq!(decoded.symbology, Symbology::Ean8);
    }

    #[test]
    fn test_blank_frame_is_not_found() {
        let frame = CameraFrame::gray(320, 120, vec![255; 320 * 120]);
        assert_eq!(
            BarcodeDetector::new().decode(&frame, &hints()),
            Err(EngineError::NotFound)
        );
    }

    #[test]
    fn test_bad_check_digit_is_checksum_miss() {
        let frame = render_symbol("4901234567891", &SymbolLayout::default()).unwrap();
        assert_eq!(
            BarcodeDetector::new().decode(&frame, &hints()),
            Err(EngineError::Checksum)
        );
    }

    #[test]
    fn test_upside_down_needs_try_harder() {
        let frame = render_symbol("4006381333931", &SymbolLayout::default()).unwrap();
        let mut flipped: Vec<u8> = frame.data.to_vec();
        flipped.reverse();
        let flipped = CameraFrame::gray(frame.width, frame.height, flipped);

        let detector = BarcodeDetector::new();
        assert!(detector.decode(&flipped, &hints()).is_err());

        let harder = DecodeHints {
            try_harder: true,
            ..hints()
        };
        assert_eq!(detector.decode(&flipped, &harder).unwrap().text, "4006381333931");
    }

    #[test]
    fn test_region_of_interest_excludes_symbol() {
        let layout = SymbolLayout {
            module_px: 2,
            ..SymbolLayout::default()
        };
        let frame = render_symbol("4901234567894", &layout).unwrap();
        let detector = BarcodeDetector::new();

        // Left tenth of the frame is quiet zone only
        let mut roi_hints = hints();
        roi_hints.region_of_interest = Some(FrameRegion {
            x: 0.0,
            y: 0.0,
            width: 0.1,
            height: 1.0,
        });
        assert_eq!(detector.decode(&frame, &roi_hints), Err(EngineError::NotFound));

        roi_hints.region_of_interest = Some(FrameRegion {
            x: 0.0,
            y: 0.25,
            width: 1.0,
            height: 0.5,
        });
        assert_eq!(detector.decode(&frame, &roi_hints).unwrap().text, "4901234567894");
    }

    #[test]
    fn test_rgba_frame() {
        let gray = render_symbol("4901234567894", &SymbolLayout::default()).unwrap();
        let rgba: Vec<u8> = gray.data.iter().flat_map(|&v| [v, v, v, 255]).collect();
        let frame = CameraFrame {
            width: gray.width,
            height: gray.height,
            data: Arc::from(rgba.into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: gray.width * 4,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert_eq!(
            BarcodeDetector::new().decode(&frame, &hints()).unwrap().text,
            "4901234567894"
        );
    }

    #[test]
    fn test_short_buffer_is_internal_error() {
        let frame = CameraFrame {
            width: 100,
            height: 100,
            data: Arc::from(vec![0u8; 50].into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: 100,
            sequence: 0,
            captured_at: Instant::now(),
        };
        assert!(matches!(
            BarcodeDetector::new().decode(&frame, &hints()),
            Err(EngineError::Internal(_))
        ));
    }

    #[test]
    fn test_copy_luma_without_stride() {
        // 2x2 gray frame with 2 bytes of stride padding per row
        let data: Vec<u8> = vec![10, 20, 0, 0, 30, 40, 0, 0];
        let frame = CameraFrame {
            width: 2,
            height: 2,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: 4,
            sequence: 0,
            captured_at: Instant::now(),
        };
        let luma = copy_luma_without_stride(&frame, &hints()).unwrap();
        assert_eq!(luma.data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_downscale_keeps_symbol_readable() {
        let layout = SymbolLayout {
            module_px: 6,
            ..SymbolLayout::default()
        };
        let frame = render_symbol("4901234567894", &layout).unwrap();
        let small = DecodeHints {
            max_dimension: frame.width / 2,
            ..DecodeHints::default()
        };
        let luma = prepare_luma(&frame, &small).unwrap();
        assert!(luma.width <= frame.width as usize / 2);
        assert_eq!(
            BarcodeDetector::new().decode(&frame, &small).unwrap().text,
            "4901234567894"
        );
    }

    #[test]
    fn test_scan_rows_in_range() {
        for height in [1, 2, 10, 480] {
            for try_harder in [false, true] {
                let rows = scan_rows(height, try_harder);
                assert!(!rows.is_empty());
                assert!(rows.iter().all(|&y| y < height));
            }
        }
    }
}
