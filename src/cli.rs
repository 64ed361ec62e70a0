// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Validating typed codes
//! - Decoding barcodes from still images
//! - Running the scanner against the virtual camera
//! - Inspecting the configuration

use chrono::{DateTime, Local};
use pos_scanner::backends::camera::VideoElement;
use pos_scanner::backends::virtual_camera::{
    SymbolLayout, VirtualCamera, load_image_as_frame, render_symbol,
};
use pos_scanner::barcode;
use pos_scanner::config::ScannerConfig;
use pos_scanner::constants::file_formats;
use pos_scanner::frame_processor::{BarcodeDetector, DecodeEngine, EngineError};
use pos_scanner::scanner::{ScanBridge, ScanEvent, ScannerHost};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<ScannerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ScannerConfig::load_from(path)?,
        None => ScannerConfig::load()?,
    };
    Ok(config)
}

/// Validate codes and print the canonical form of each
pub fn validate_codes(codes: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut invalid = 0;
    for raw in codes {
        match raw.parse::<barcode::ScanCode>() {
            Ok(code) => println!("  {:<20} valid    {}", raw, code),
            Err(e) => {
                invalid += 1;
                println!("  {:<20} invalid  {}", raw, e);
            }
        }
    }

    if invalid > 0 {
        return Err(format!("{} of {} codes invalid", invalid, codes.len()).into());
    }
    Ok(())
}

/// Decode barcodes from image files
pub fn decode_images(
    input: &[PathBuf],
    config: &ScannerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths = collect_image_paths(input)?;
    if paths.is_empty() {
        return Err("No supported images found".into());
    }

    let detector = BarcodeDetector::new();
    let hints = config.decode_hints();
    let mut found = 0;

    for path in &paths {
        let frame = load_image_as_frame(path)?;
        let start = Instant::now();
        let outcome = detector.decode(&frame, &hints);
        let elapsed = start.elapsed();

        match outcome {
            Ok(decoded) => {
                let gate = if barcode::is_valid(&decoded.text) {
                    "valid"
                } else {
                    "not a cart code"
                };
                found += 1;
                println!(
                    "{}: {} {} ({}, {:.1}ms)",
                    path.display(),
                    decoded.symbology,
                    decoded.text,
                    gate,
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            Err(EngineError::NotFound) => println!("{}: no barcode found", path.display()),
            Err(e) => println!("{}: {}", path.display(), e),
        }
    }

    println!();
    println!("Decoded {} of {} images", found, paths.len());
    Ok(())
}

/// Options of the `simulate` command
pub struct SimulateOptions {
    pub code: String,
    pub image: Option<PathBuf>,
    pub seconds: u64,
    pub fps: u32,
    pub auto_close: bool,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScanRecord {
    at: DateTime<Local>,
    code: String,
    accepted: bool,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    source: String,
    fps: u32,
    auto_close: bool,
    frames_sent: u64,
    frames_dropped: u64,
    final_status: String,
    scans: Vec<ScanRecord>,
}

/// Run the whole pipeline against the virtual camera
pub fn simulate(
    options: SimulateOptions,
    mut config: ScannerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    config.auto_close_on_detect |= options.auto_close;

    let (frame, source) = match &options.image {
        Some(path) => (load_image_as_frame(path)?, path.display().to_string()),
        None => {
            let digits = barcode::extract_digits(&options.code);
            let frame = render_symbol(&digits, &SymbolLayout::default())
                .ok_or_else(|| format!("Cannot render '{}': need 8 or 13 digits", options.code))?;
            (frame, format!("rendered {}", digits))
        }
    };

    let camera = VirtualCamera::new(vec![frame]).with_fps(options.fps);
    let stats = camera.stats();
    let bridge = ScanBridge::new(config.duplicate_guard());

    let scans = Arc::new(Mutex::new(Vec::new()));
    let scans_clone = Arc::clone(&scans);
    let _registration = bridge.register(move |event| {
        let record = match event {
            ScanEvent::Accepted { code, .. } => {
                println!("Scanned: {}", code);
                ScanRecord {
                    at: Local::now(),
                    code: code.to_string(),
                    accepted: true,
                }
            }
            ScanEvent::Invalid { error, .. } => {
                println!("Rejected: {}", error);
                ScanRecord {
                    at: Local::now(),
                    code: error.normalized.clone(),
                    accepted: false,
                }
            }
        };
        scans_clone
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    });

    let host = ScannerHost::new(
        Arc::new(camera),
        Arc::new(VideoElement::new()),
        Arc::new(BarcodeDetector::new()),
        &config,
        Arc::new(bridge.clone()),
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Source: {}", source);
    println!("Scanning for {} seconds at {}fps (press Ctrl+C to stop early)", options.seconds, options.fps);
    println!();

    let started_at = Local::now();
    let runtime = tokio::runtime::Runtime::new()?;
    let final_status = runtime.block_on(async {
        host.open().await?;

        let start = Instant::now();
        let target = Duration::from_secs(options.seconds);
        while start.elapsed() < target {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }
            if !host.is_open() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let status = host.status();
        host.close().await;
        Ok::<_, Box<dyn std::error::Error>>(status)
    })?;

    let scans = std::mem::take(&mut *scans.lock().unwrap_or_else(|e| e.into_inner()));
    println!();
    println!(
        "Frames: {} sent, {} dropped; {} scans; final status: {}",
        stats.frames_sent(),
        stats.frames_dropped(),
        scans.iter().filter(|s| s.accepted).count(),
        final_status.message()
    );

    if let Some(path) = options.report {
        let report = SimulationReport {
            started_at,
            finished_at: Local::now(),
            source,
            fps: options.fps,
            auto_close: config.auto_close_on_detect,
            frames_sent: stats.frames_sent(),
            frames_dropped: stats.frames_dropped(),
            final_status: final_status.to_string(),
            scans,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Report saved: {}", path.display());
    }

    Ok(())
}

/// Print the effective configuration, or its path
pub fn show_config(
    config: &ScannerConfig,
    explicit_path: Option<&Path>,
    path_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path_only {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(ScannerConfig::default_path)
            .ok_or("No config directory on this platform")?;
        println!("{}", path.display());
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Collect all image paths from input (files or directories)
fn collect_image_paths(input: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let file_path = entry.path();
                if is_supported_image(&file_path) {
                    paths.push(file_path);
                }
            }
        } else if is_supported_image(path) {
            paths.push(path.clone());
        }
    }

    // Sort by filename for consistent ordering
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths)
}

/// Check if a path is a supported image file
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| file_formats::is_image_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}
