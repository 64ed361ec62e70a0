// SPDX-License-Identifier: GPL-3.0-only

//! EAN-13 / EAN-8 symbol tables and run-length decoding
//!
//! A digit occupies 7 modules split into 4 alternating runs. Left-half digits
//! use the L (odd parity) or G (even parity) set, right-half digits use the R
//! set. For EAN-13 the L/G parity pattern of the six left digits encodes the
//! leading digit.

use crate::barcode;
use crate::frame_processor::types::{Decoded, EngineError, Symbology};

/// L-set run widths (space, bar, space, bar)
const L_PATTERNS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// G-set run widths: the L widths reversed
const G_PATTERNS: [[u8; 4]; 10] = [
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

/// R-set run widths (bar, space, bar, space); same widths as L, inverted colours
const R_PATTERNS: [[u8; 4]; 10] = L_PATTERNS;

/// Parity of the six left digits per leading digit (true = G)
const FIRST_DIGIT_PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

/// Runs in a guard pattern
const EDGE_GUARD_RUNS: usize = 3;
const CENTER_GUARD_RUNS: usize = 5;
const DIGIT_RUNS: usize = 4;

/// Largest summed deviation (in modules) accepted for a digit match
const MAX_DIGIT_DISTANCE: f32 = 1.6;

/// Allowed relative error for a single guard run against the module width
const GUARD_TOLERANCE: f32 = 0.6;

/// Minimum quiet zone before the start guard, in modules
const MIN_QUIET_MODULES: f32 = 3.0;

/// Run count of a full symbol including guards
pub fn symbol_runs(symbology: Symbology) -> usize {
    let digits_per_half = match symbology {
        Symbology::Ean13 => 6,
        Symbology::Ean8 => 4,
        Symbology::Code128 => 0,
    };
    2 * EDGE_GUARD_RUNS + CENTER_GUARD_RUNS + 2 * digits_per_half * DIGIT_RUNS
}

/// A run of identical pixels in a binarized row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub black: bool,
    pub len: usize,
}

/// Collapse a binarized row (true = black) into runs
pub fn runs(row: &[bool]) -> Vec<Run> {
    let mut out = Vec::new();
    let Some(&first) = row.first() else {
        return out;
    };

    let mut current = Run { black: first, len: 0 };
    for &px in row {
        if px == current.black {
            current.len += 1;
        } else {
            out.push(current);
            current = Run { black: px, len: 1 };
        }
    }
    out.push(current);
    out
}

/// Best matching digit for four runs against a pattern set
///
/// Widths are normalized so the four runs span 7 modules.
fn match_digit(widths: &[Run], patterns: &[[u8; 4]; 10]) -> (u8, f32) {
    let total: usize = widths.iter().map(|r| r.len).sum();
    let scale = 7.0 / total.max(1) as f32;

    let mut best = (0u8, f32::MAX);
    for (digit, pattern) in patterns.iter().enumerate() {
        let distance: f32 = widths
            .iter()
            .zip(pattern.iter())
            .map(|(run, &modules)| (run.len as f32 * scale - modules as f32).abs())
            .sum();
        if distance < best.1 {
            best = (digit as u8, distance);
        }
    }
    best
}

/// Check a guard made of `count` single-module runs and return its module width
fn guard_module(runs: &[Run], start: usize, count: usize, first_black: bool) -> Option<f32> {
    let guard = runs.get(start..start + count)?;
    if guard[0].black != first_black {
        return None;
    }

    let unit = guard.iter().map(|r| r.len).sum::<usize>() as f32 / count as f32;
    let within = guard
        .iter()
        .all(|r| (r.len as f32 - unit).abs() <= unit * GUARD_TOLERANCE);
    within.then_some(unit)
}

/// Try to decode a symbol whose start guard begins at run `start`
///
/// Returns `NotFound` when the guards do not line up, `Format` when guards
/// are present but digits do not match, `Checksum` when every digit was read
/// but the check digit is wrong.
pub fn decode_at(runs: &[Run], start: usize, symbology: Symbology) -> Result<Decoded, EngineError> {
    let half = match symbology {
        Symbology::Ean13 => 6,
        Symbology::Ean8 => 4,
        Symbology::Code128 => return Err(EngineError::NotFound),
    };
    if start + symbol_runs(symbology) > runs.len() {
        return Err(EngineError::NotFound);
    }

    let unit = guard_module(runs, start, EDGE_GUARD_RUNS, true).ok_or(EngineError::NotFound)?;
    if start > 0 {
        let quiet = runs[start - 1];
        if quiet.black || (quiet.len as f32) < unit * MIN_QUIET_MODULES {
            return Err(EngineError::NotFound);
        }
    }

    let mut idx = start + EDGE_GUARD_RUNS;
    let center = idx + half * DIGIT_RUNS;
    let end = center + CENTER_GUARD_RUNS + half * DIGIT_RUNS;

    // Check the structure before reading digits, so stray guard-like runs
    // are plain misses rather than format errors
    guard_module(runs, center, CENTER_GUARD_RUNS, false).ok_or(EngineError::NotFound)?;
    guard_module(runs, end, EDGE_GUARD_RUNS, true).ok_or(EngineError::NotFound)?;

    let mut digits = Vec::with_capacity(2 * half + 1);
    let mut parity = [false; 6];

    for slot in 0..half {
        let group = &runs[idx..idx + DIGIT_RUNS];
        let (l_digit, l_dist) = match_digit(group, &L_PATTERNS);
        let (digit, distance, is_g) = match symbology {
            Symbology::Ean13 => {
                let (g_digit, g_dist) = match_digit(group, &G_PATTERNS);
                if g_dist < l_dist {
                    (g_digit, g_dist, true)
                } else {
                    (l_digit, l_dist, false)
                }
            }
            _ => (l_digit, l_dist, false),
        };
        if distance > MAX_DIGIT_DISTANCE {
            return Err(EngineError::Format);
        }
        if symbology == Symbology::Ean13 {
            parity[slot] = is_g;
        }
        digits.push(digit);
        idx += DIGIT_RUNS;
    }

    idx += CENTER_GUARD_RUNS;
    for _ in 0..half {
        let group = &runs[idx..idx + DIGIT_RUNS];
        let (digit, distance) = match_digit(group, &R_PATTERNS);
        if distance > MAX_DIGIT_DISTANCE {
            return Err(EngineError::Format);
        }
        digits.push(digit);
        idx += DIGIT_RUNS;
    }

    if symbology == Symbology::Ean13 {
        let leading = FIRST_DIGIT_PARITY
            .iter()
            .position(|p| *p == parity)
            .ok_or(EngineError::Format)?;
        digits.insert(0, leading as u8);
    }

    let text: String = digits.iter().map(|d| (b'0' + d) as char).collect();
    let (payload, check) = text.split_at(text.len() - 1);
    if barcode::check_digit(payload) != Some(check.as_bytes()[0] - b'0') {
        return Err(EngineError::Checksum);
    }

    Ok(Decoded { text, symbology })
}

/// Module widths for a symbol, starting with the left guard bar
///
/// `digits` must be 13 digits (EAN-13) or 8 digits (EAN-8). Returns `None`
/// for anything else. Used to render synthetic frames.
pub fn encode_modules(digits: &str) -> Option<Vec<u8>> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let values: Vec<usize> = digits.bytes().map(|b| (b - b'0') as usize).collect();

    let (left, right, parity) = match values.len() {
        13 => (&values[1..7], &values[7..13], FIRST_DIGIT_PARITY[values[0]]),
        8 => (&values[0..4], &values[4..8], [false; 6]),
        _ => return None,
    };

    let mut modules = vec![1, 1, 1];
    for (slot, &digit) in left.iter().enumerate() {
        let pattern = if parity[slot] {
            G_PATTERNS[digit]
        } else {
            L_PATTERNS[digit]
        };
        modules.extend_from_slice(&pattern);
    }
    modules.extend_from_slice(&[1, 1, 1, 1, 1]);
    for &digit in right {
        modules.extend_from_slice(&R_PATTERNS[digit]);
    }
    modules.extend_from_slice(&[1, 1, 1]);
    Some(modules)
}
