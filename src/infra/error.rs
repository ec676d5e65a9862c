//! Error types for batch signing operations.
//!
//! Only the pre-flight conditions and input validation are errors. A file that
//! fails to sign is recorded on its `SigningResult` and never aborts the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for signing operations
pub type Result<T, E = SigningError> = std::result::Result<T, E>;

/// Errors that stop a batch before any file is touched
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Signing tool not found (searched: {})", format_searched(.searched))]
    #[diagnostic(
        code(signtool_batch::tool_not_found),
        help("Install the Windows SDK signing tools or pass --signtool <path>")
    )]
    ToolNotFound { searched: Vec<PathBuf> },

    #[error("No code signing certificate found")]
    #[diagnostic(
        code(signtool_batch::no_certificate),
        help("Import a certificate with the Code Signing usage, or pass --thumbprint")
    )]
    NoCertificateFound,

    #[error("Certificate selection cancelled")]
    #[diagnostic(code(signtool_batch::selection_cancelled))]
    SelectionCancelled,

    #[error("Invalid target {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("Certificate store error: {0}")]
    CertificateStore(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

fn format_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "nothing".to_string();
    }
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::CertificateStore(error.to_string())
    }
}

/// A failed file, surfaced to the caller without stopping the batch
#[derive(Error, Debug, Clone, PartialEq, Eq, miette::Diagnostic)]
pub enum FileError {
    #[error("Failed to launch signing tool for {path}: {message}")]
    LaunchFailure { path: PathBuf, message: String },

    #[error("Signing {path} failed with exit code {exit_code}: {message}")]
    SigningFailure {
        path: PathBuf,
        exit_code: i32,
        message: String,
    },

    #[error("Signing {path} timed out: {message}")]
    TimedOut { path: PathBuf, message: String },
}

impl FileError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::LaunchFailure { path, .. }
            | FileError::SigningFailure { path, .. }
            | FileError::TimedOut { path, .. } => path,
        }
    }
}
