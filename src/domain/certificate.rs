//! Code signing identity as reported by a trust store.

use crate::domain::types::Thumbprint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signing certificate known by thumbprint.
///
/// The private key stays in the store; `signtool` looks it up by thumbprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub thumbprint: Thumbprint,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Expiry as reported by the store, kept as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
}

impl Certificate {
    pub fn new(thumbprint: Thumbprint, subject: impl Into<String>) -> Self {
        Self {
            thumbprint,
            subject: subject.into(),
            issuer: None,
            not_after: None,
        }
    }

    /// Certificate known only by thumbprint
    pub fn from_thumbprint(thumbprint: Thumbprint) -> Self {
        let subject = thumbprint.to_string();
        Self::new(thumbprint, subject)
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_not_after(mut self, not_after: impl Into<String>) -> Self {
        self.not_after = Some(not_after.into());
        self
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.subject, self.thumbprint)?;
        if let Some(ref not_after) = self.not_after {
            write!(f, ", expires {not_after}")?;
        }
        Ok(())
    }
}
