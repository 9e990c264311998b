use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::utils::logging::error_ctx;

/// Errors surfaced by the night mode pipeline
#[derive(Debug, Error)]
pub enum NightModeError {
    #[error("Could not load image from '{path}': {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    #[error("Dimension mismatch for exposure {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: Dimensions,
        actual: Dimensions,
    },

    #[error("Could not write image to '{path}': {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid configuration file '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, NightModeError>;

/// Width x height pair used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl NightModeError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name, reason: reason.into() }
    }

    /// Short tag used as the log context for this error
    pub fn context(&self) -> &'static str {
        match self {
            Self::LoadFailure { .. } => "load",
            Self::DimensionMismatch { .. } => "fusion",
            Self::WriteFailure { .. } => "write",
            Self::InvalidParameter { .. } => "params",
            Self::Config { .. } => "config",
        }
    }

    /// Process exit status for the command-line front end.
    /// 2 = bad invocation, 3 = read/processing failure, 4 = write failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidParameter { .. } | Self::Config { .. } => 2,
            Self::LoadFailure { .. } | Self::DimensionMismatch { .. } => 3,
            Self::WriteFailure { .. } => 4,
        }
    }
}

/// Reports an error in the console format (`[error][context] message`)
pub fn report_error(context: &str, error: impl fmt::Display) {
    error_ctx(context, error.to_string());
}

/// Reports a pipeline error using its own context tag
pub fn report_night_mode_error(error: &NightModeError) {
    report_error(error.context(), error);
}
