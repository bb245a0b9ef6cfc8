//! Error types and exit codes for tucache

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Failure reported by a parsing engine.
///
/// An engine failure never removes an existing cache entry; the coordinator
/// keeps the previous unit around as stale-but-valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unsupported language for file: {path}")]
    UnsupportedLanguage { path: PathBuf },

    #[error("Source not available: {path}")]
    SourceUnavailable { path: PathBuf },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Grammar error: {0}")]
    Grammar(String),
}

impl EngineError {
    /// Path of the file the failure refers to, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::UnsupportedLanguage { path }
            | Self::SourceUnavailable { path }
            | Self::Parse { path, .. } => Some(path),
            Self::Grammar(_) => None,
        }
    }
}

/// Main error type for tucache operations
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid location '{spec}', expected FILE:LINE:COLUMN")]
    InvalidLocation { spec: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoordinatorError {
    /// Convert error to the process exit code used by the CLI:
    /// - 1: IO error / source unavailable
    /// - 2: Unsupported language
    /// - 3: Parse failure
    /// - 4: Configuration or argument error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Engine(EngineError::SourceUnavailable { .. }) => ExitCode::from(1),
            Self::Engine(EngineError::UnsupportedLanguage { .. }) => ExitCode::from(2),
            Self::Engine(EngineError::Parse { .. }) => ExitCode::from(3),
            Self::Engine(EngineError::Grammar(_)) => ExitCode::from(3),
            Self::Config { .. } => ExitCode::from(4),
            Self::InvalidLocation { .. } => ExitCode::from(4),
            Self::Io(_) => ExitCode::from(1),
        }
    }
}

/// Result type alias for tucache operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
