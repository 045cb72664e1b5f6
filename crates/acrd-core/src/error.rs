//! Failure taxonomy for tool invocations and the quarry pipeline.
//!
//! Every error carries a remediation hint so the CLI can print something
//! actionable, and converts into an [`ErrorReport`] for JSON consumers.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    /// The executable is missing or could not be spawned.
    #[error("tool not found at {}: {detail}", path.display())]
    NotFound { path: PathBuf, detail: String },

    /// The process ran and reported failure.
    #[error("{tool} exited with {}: {}", exit_label(*exit_code), stderr_label(stderr))]
    NonZeroExit {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The process did not finish before the invoker deadline.
    #[error("{tool} did not finish within {after:?}")]
    Timeout { tool: String, after: Duration },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

fn stderr_label(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "(no stderr)"
    } else {
        trimmed
    }
}

impl ToolFailure {
    pub fn not_found(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True when the whole backend is unavailable rather than one call failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ToolFailure::NotFound { .. })
    }

    pub fn suggestion(&self) -> String {
        match self {
            ToolFailure::NotFound { path, .. } => format!(
                "Install the tool or point acrd at it (e.g. ACRD_ADB / --adb); looked for '{}'",
                path.display()
            ),
            ToolFailure::NonZeroExit { stderr, .. } if stderr.contains("unauthorized") => {
                "Unlock the device and accept the USB debugging prompt, then retry".to_string()
            }
            ToolFailure::NonZeroExit { stderr, .. } if stderr.contains("no permissions") => {
                "Add a udev rule for the device or run with sufficient permissions".to_string()
            }
            ToolFailure::NonZeroExit { .. } => {
                "Check the cable and the device state, then retry".to_string()
            }
            ToolFailure::Timeout { .. } => {
                "The USB transport may be stuck; replug the device or raise --tool-timeout"
                    .to_string()
            }
        }
    }
}

/// Errors raised by the quarry pipeline.
///
/// Only [`QuarryError::NoDeviceFound`], [`QuarryError::InvalidSelection`],
/// [`QuarryError::SelectionTimeout`] and [`QuarryError::UnknownSerial`] reach
/// the caller of a quarry; the rest are downgraded inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuarryError {
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    /// The tool ran but returned unusable data.
    #[error("{backend}: {detail}")]
    Extraction { backend: String, detail: String },

    #[error("no device found")]
    NoDeviceFound,

    #[error("invalid selection '{input}': expected a number between 1 and {count}")]
    InvalidSelection { input: String, count: usize },

    #[error("no selection made within {0:?}")]
    SelectionTimeout(Duration),

    #[error("device '{0}' is not attached")]
    UnknownSerial(String),
}

impl QuarryError {
    pub fn extraction(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Extraction {
            backend: backend.into(),
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            QuarryError::Tool(_) => ErrorCode::ToolFailed,
            QuarryError::Extraction { .. } => ErrorCode::ExtractionFailed,
            QuarryError::NoDeviceFound | QuarryError::UnknownSerial(_) => ErrorCode::NoDevice,
            QuarryError::InvalidSelection { .. } | QuarryError::SelectionTimeout(_) => {
                ErrorCode::InvalidSelection
            }
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            QuarryError::Tool(failure) => failure.suggestion(),
            QuarryError::Extraction { .. } => {
                "The device answered but did not report its model; make sure it finished booting"
                    .to_string()
            }
            QuarryError::NoDeviceFound => {
                "Connect the device with a data cable and boot it into Android (USB debugging on), fastboot, or download mode"
                    .to_string()
            }
            QuarryError::InvalidSelection { count, .. } => {
                format!("Enter one of the listed numbers (1-{})", count)
            }
            QuarryError::SelectionTimeout(_) => {
                "Pass --serial to pick a device without prompting".to_string()
            }
            QuarryError::UnknownSerial(_) => {
                "Run 'acrd devices' to see attached serials".to_string()
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            suggestion: Some(self.suggestion()),
        }
    }
}

/// Error codes for machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ToolFailed,
    ExtractionFailed,
    NoDevice,
    InvalidSelection,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ToolFailed => write!(f, "TOOL_FAILED"),
            ErrorCode::ExtractionFailed => write!(f, "EXTRACTION_FAILED"),
            ErrorCode::NoDevice => write!(f, "NO_DEVICE"),
            ErrorCode::InvalidSelection => write!(f, "INVALID_SELECTION"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Serialisable error with a remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ErrorReport {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("Re-run with -v for tool-level logs".into()),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl From<ToolFailure> for ErrorReport {
    fn from(failure: ToolFailure) -> Self {
        Self {
            code: ErrorCode::ToolFailed,
            message: failure.to_string(),
            suggestion: Some(failure.suggestion()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_path() {
        let err = ToolFailure::not_found("/opt/adb", "no such file");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/opt/adb"));
        assert!(err.suggestion().contains("/opt/adb"));
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = ToolFailure::NonZeroExit {
            tool: "adb".into(),
            exit_code: Some(1),
            stderr: "error: device unauthorized.\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "adb exited with status 1: error: device unauthorized."
        );
        assert!(err.suggestion().contains("USB debugging"));
    }

    #[test]
    fn test_non_zero_exit_by_signal_without_stderr() {
        let err = ToolFailure::NonZeroExit {
            tool: "fastboot".into(),
            exit_code: None,
            stderr: "  ".into(),
        };
        assert_eq!(err.to_string(), "fastboot exited with a signal: (no stderr)");
    }

    #[test]
    fn test_timeout_suggests_flag() {
        let err = ToolFailure::Timeout {
            tool: "fastboot".into(),
            after: Duration::from_secs(3),
        };
        assert!(!err.is_not_found());
        assert!(err.suggestion().contains("--tool-timeout"));
    }

    #[test]
    fn test_invalid_selection_message() {
        let err = QuarryError::InvalidSelection {
            input: "5".into(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "invalid selection '5': expected a number between 1 and 2"
        );
        assert_eq!(err.code(), ErrorCode::InvalidSelection);
        assert!(err.suggestion().contains("1-2"));
    }

    #[test]
    fn test_tool_failure_converts_transparently() {
        let err: QuarryError = ToolFailure::not_found("/x/heimdall", "missing").into();
        assert_eq!(err.code(), ErrorCode::ToolFailed);
        assert!(err.to_string().starts_with("tool not found at /x/heimdall"));
    }

    #[test]
    fn test_every_quarry_error_has_suggestion() {
        let errors = vec![
            QuarryError::NoDeviceFound,
            QuarryError::extraction("adb", "empty model"),
            QuarryError::SelectionTimeout(Duration::from_secs(1)),
            QuarryError::UnknownSerial("XYZ".into()),
        ];
        for err in errors {
            let report = err.report();
            assert!(report.suggestion.is_some(), "{} lacks a suggestion", err);
        }
    }

    #[test]
    fn test_report_display_format() {
        let report = QuarryError::NoDeviceFound.report();
        let display = report.to_string();
        assert!(display.starts_with("[NO_DEVICE] no device found"));
        assert!(display.contains("(hint:"));
    }

    #[test]
    fn test_report_json_roundtrip() {
        let json = serde_json::to_string(&QuarryError::NoDeviceFound.report()).unwrap();
        assert!(json.contains("\"NO_DEVICE\""));
        let report: ErrorReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.code, ErrorCode::NoDevice);
    }
}
