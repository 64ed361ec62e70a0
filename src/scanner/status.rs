// SPDX-License-Identifier: GPL-3.0-only

//! Scanner status shown to the operator

use crate::barcode::ScanCode;
use crate::errors::ScannerError;
use std::fmt;

/// Where the scanner is in its lifecycle
///
/// Drives user feedback only; nothing else branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScannerStatus {
    /// Camera is being acquired
    #[default]
    Initializing,
    /// Frames are being decoded
    Scanning,
    /// A valid code was accepted
    Detected(ScanCode),
    /// Acquisition failed or the decoder reported a failure
    Error(ScannerError),
    /// The scanner was closed
    Closed,
}

impl ScannerStatus {
    /// Text for the status indicator
    pub fn message(&self) -> String {
        match self {
            ScannerStatus::Initializing => "Starting camera...".to_string(),
            ScannerStatus::Scanning => "Point the camera at a barcode".to_string(),
            ScannerStatus::Detected(code) => format!("Scanned {}", code),
            ScannerStatus::Error(e) => e.user_message().to_string(),
            ScannerStatus::Closed => "Scanner closed".to_string(),
        }
    }

    /// Whether this is an error status
    pub fn is_error(&self) -> bool {
        matches!(self, ScannerStatus::Error(_))
    }

    /// Whether the scanner is still running (not closed and not failed fatally)
    pub fn is_active(&self) -> bool {
        match self {
            ScannerStatus::Closed => false,
            ScannerStatus::Error(e) => !e.is_fatal(),
            _ => true,
        }
    }
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerStatus::Initializing => write!(f, "initializing"),
            ScannerStatus::Scanning => write!(f, "scanning"),
            ScannerStatus::Detected(code) => write!(f, "detected({})", code),
            ScannerStatus::Error(e) => write!(f, "error({})", e),
            ScannerStatus::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let code: ScanCode = "4006381333931".parse().unwrap();
        assert_eq!(ScannerStatus::Detected(code).message(), "Scanned 4006381333931");
        assert_eq!(
            ScannerStatus::Error(ScannerError::InsecureContext).message(),
            ScannerError::InsecureContext.user_message()
        );
    }

    #[test]
    fn test_decoder_errors_keep_scanner_active() {
        assert!(ScannerStatus::Error(ScannerError::Decoder("glitch".into())).is_active());
        assert!(!ScannerStatus::Error(ScannerError::PermissionDenied).is_active());
        assert!(!ScannerStatus::Closed.is_active());
        assert!(ScannerStatus::Scanning.is_active());
    }
}
