// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner
//!
//! The taxonomy follows what the operator can do about a failure:
//! permission and insecure-context errors need a settings change, device
//! errors can be retried by reopening the scanner, decoder errors are
//! transient. Routine decode misses and checksum failures are not errors and
//! never show up here.

use crate::backends::camera::CameraError;
use crate::barcode::InvalidCode;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias using ScannerError
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Main application error type (CLI and configuration)
#[derive(Debug, Clone)]
pub enum AppError {
    /// Scanner session errors
    Scanner(ScannerError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Image loading errors
    Image(String),
    /// A code rejected by the checksum gate
    InvalidCode(InvalidCode),
    /// Generic error with message
    Other(String),
}

/// Errors surfaced by a scanner session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerError {
    /// Camera access was denied by the user or platform policy
    PermissionDenied,
    /// Camera access requires a secure (HTTPS) context
    InsecureContext,
    /// No compatible camera was found
    NoCameraFound,
    /// The camera is in use by another application
    DeviceBusy,
    /// The decode engine failed unexpectedly
    Decoder(String),
    /// Setup was cancelled because the scanner closed
    Cancelled,
    /// Any other acquisition failure
    Unknown(String),
}

impl ScannerError {
    /// Text shown to the operator in the status indicator
    pub fn user_message(&self) -> &'static str {
        match self {
            ScannerError::PermissionDenied => {
                "Camera access is not allowed. Grant permission in the browser settings and reopen the scanner."
            }
            ScannerError::InsecureContext => {
                "Camera access requires HTTPS. Open the page over https."
            }
            ScannerError::NoCameraFound => {
                "No camera was found. Connect a camera or enter the code manually."
            }
            ScannerError::DeviceBusy => {
                "The camera could not be started. Check permissions and whether another app is using it."
            }
            ScannerError::Decoder(_) => "Barcode reading failed. Keep the code steady in the frame.",
            ScannerError::Cancelled => "The scanner was closed.",
            ScannerError::Unknown(_) => {
                "The camera could not be started. Check permissions and whether another app is using it."
            }
        }
    }

    /// Whether the session cannot continue after this error
    ///
    /// Decoder errors are transient: the stream stays up and scanning
    /// continues with the next frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScannerError::Decoder(_))
    }

    /// Whether simply reopening the scanner may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScannerError::NoCameraFound
                | ScannerError::DeviceBusy
                | ScannerError::Decoder(_)
                | ScannerError::Unknown(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Scanner(e) => write!(f, "Scanner error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Image(msg) => write!(f, "Image error: {}", msg),
            AppError::InvalidCode(e) => write!(f, "{}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::PermissionDenied => write!(f, "Camera permission denied"),
            ScannerError::InsecureContext => write!(f, "Insecure context (HTTPS required)"),
            ScannerError::NoCameraFound => write!(f, "No camera devices found"),
            ScannerError::DeviceBusy => write!(f, "Camera is busy"),
            ScannerError::Decoder(msg) => write!(f, "Decoder error: {}", msg),
            ScannerError::Cancelled => write!(f, "Scanner setup cancelled"),
            ScannerError::Unknown(msg) => write!(f, "Camera error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ScannerError {}

impl From<ScannerError> for AppError {
    fn from(err: ScannerError) -> Self {
        AppError::Scanner(err)
    }
}

impl From<InvalidCode> for AppError {
    fn from(err: InvalidCode) -> Self {
        AppError::InvalidCode(err)
    }
}

/// Classify a media-layer failure for the operator
impl From<CameraError> for ScannerError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::NotAllowed(_) => ScannerError::PermissionDenied,
            CameraError::Security(_) => ScannerError::InsecureContext,
            CameraError::NotFound(_) | CameraError::OverConstrained(_) => {
                ScannerError::NoCameraFound
            }
            CameraError::NotReadable(_) => ScannerError::DeviceBusy,
            CameraError::Aborted => ScannerError::Cancelled,
            CameraError::Other(msg) => ScannerError::Unknown(msg),
        }
    }
}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Scanner(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Image(err.to_string())
    }
}
