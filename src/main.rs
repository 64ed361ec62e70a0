// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "pos-scanner")]
#[command(about = "Barcode scanning pipeline for point-of-sale storefronts")]
#[command(version = pos_scanner::constants::app_info::version())]
struct Cli {
    /// Config file (default: <config dir>/pos-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check EAN-13 codes (ASCII or full-width digits)
    Validate {
        /// Codes to check
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Decode barcodes from still images
    Decode {
        /// Image files or directories
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Run the full scanner against the virtual camera
    Simulate {
        /// Code rendered by the virtual camera
        #[arg(short, long, default_value = "4006381333931")]
        code: String,

        /// Stream this image instead of a rendered code
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// How long to scan
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Virtual camera frame rate
        #[arg(short, long, default_value = "30")]
        fps: u32,

        /// Close the scanner after the first detection
        #[arg(long)]
        auto_close: bool,

        /// Write a JSON report to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=pos_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { codes } => cli::validate_codes(&codes),
        Commands::Decode { images } => cli::decode_images(&images, &config),
        Commands::Simulate {
            code,
            image,
            seconds,
            fps,
            auto_close,
            report,
        } => cli::simulate(
            cli::SimulateOptions {
                code,
                image,
                seconds,
                fps,
                auto_close,
                report,
            },
            config,
        ),
        Commands::Config { path } => cli::show_config(&config, cli.config.as_deref(), path),
    }
}
