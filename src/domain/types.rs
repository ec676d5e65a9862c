//! Type-safe wrappers using new-type pattern
//!
//! Thumbprints, timestamp URLs, digest algorithms and signing targets are
//! validated once on construction so the rest of the crate can trust them.

use crate::infra::error::{Result, SigningError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Timestamp authority used when none is configured
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.digicert.com";

/// SHA-1 certificate thumbprint as used by `signtool /sha1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Length of a hex encoded SHA-1 digest
    pub const HEX_LEN: usize = 40;

    /// Create a thumbprint, ignoring whitespace and case
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let normalized: String = value
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(SigningError::ValidationError(
                "Thumbprint must not be empty".to_string(),
            ));
        }

        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SigningError::ValidationError(format!(
                "Thumbprint must be hexadecimal, got: {}",
                value.as_ref()
            )));
        }

        if normalized.len() != Self::HEX_LEN {
            return Err(SigningError::ValidationError(format!(
                "Thumbprint must be {} hex characters, got {}",
                Self::HEX_LEN,
                normalized.len()
            )));
        }

        Ok(Thumbprint(normalized))
    }

    /// Build a thumbprint from raw digest bytes
    pub fn from_digest(digest: &[u8]) -> Result<Self> {
        Self::new(hex::encode_upper(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Thumbprint {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Thumbprint {
    type Error = SigningError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Thumbprint> for String {
    fn from(value: Thumbprint) -> Self {
        value.0
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type-safe wrapper for timestamp URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampUrl(String);

impl TimestampUrl {
    /// Create a new TimestampUrl after validation
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref().trim();
        Self::validate_url(url)?;
        Ok(TimestampUrl(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate_url(url: &str) -> Result<()> {
        let Some(without_protocol) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
        else {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL must start with http:// or https://, got: {url}"
            )));
        };

        let host = without_protocol.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL has no host: {url}"
            )));
        }

        if url.chars().any(char::is_whitespace) {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL must not contain whitespace: {url}"
            )));
        }

        Ok(())
    }
}

impl Default for TimestampUrl {
    fn default() -> Self {
        TimestampUrl(DEFAULT_TIMESTAMP_URL.to_string())
    }
}

impl FromStr for TimestampUrl {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TimestampUrl {
    type Error = SigningError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TimestampUrl> for String {
    fn from(value: TimestampUrl) -> Self {
        value.0
    }
}

impl fmt::Display for TimestampUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File digest algorithm passed to `signtool /fd`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Identifier understood by the signing tool
    pub fn as_signtool_arg(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(SigningError::ValidationError(format!(
                "Unsupported digest algorithm: {s}"
            ))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file queued for signing.
///
/// Holds an absolute path to an existing regular file. The path is fixed at
/// construction; readability is checked again by the tool itself when it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigningTarget(PathBuf);

impl SigningTarget {
    /// Validate `path` and make it absolute
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| SigningError::InvalidTarget {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !metadata.is_file() {
            return Err(SigningError::InvalidTarget {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let absolute = std::path::absolute(path).map_err(|e| SigningError::InvalidTarget {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(SigningTarget(absolute))
    }

    /// Wrap a path without touching the file system
    pub fn unchecked(path: impl Into<PathBuf>) -> Self {
        SigningTarget(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name for short diagnostics
    pub fn display_name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for SigningTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for SigningTarget {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
