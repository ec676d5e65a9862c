//! Trust store adapters.
//!
//! The store is queried read-only for certificates usable for code signing.
//! `PowerShellStore` asks the Windows certificate store through PowerShell;
//! `DirectoryStore` reads certificate files from a folder, which is how
//! build machines without an interactive profile usually keep them.

use crate::domain::certificate::Certificate;
use crate::domain::types::Thumbprint;
use crate::infra::error::{Result, SigningError};
use der::asn1::ObjectIdentifier;
use der::Decode;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use x509_cert::ext::pkix::ExtendedKeyUsage;

const ID_CE_EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");
const ID_KP_CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

const CERTIFICATE_EXTENSIONS: [&str; 4] = ["cer", "crt", "pem", "der"];

/// Read-only source of code signing certificates
pub trait CertificateStore {
    /// Certificates valid for code signing, in store order
    fn code_signing_certificates(&self) -> Result<Vec<Certificate>>;

    /// Look up one certificate by thumbprint
    fn find(&self, thumbprint: &Thumbprint) -> Result<Option<Certificate>> {
        Ok(self
            .code_signing_certificates()?
            .into_iter()
            .find(|c| &c.thumbprint == thumbprint))
    }
}

/// Windows certificate store location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreLocation {
    #[default]
    CurrentUser,
    LocalMachine,
}

impl StoreLocation {
    /// PowerShell certificate provider path of the personal store
    pub fn provider_path(&self) -> &'static str {
        match self {
            StoreLocation::CurrentUser => r"Cert:\CurrentUser\My",
            StoreLocation::LocalMachine => r"Cert:\LocalMachine\My",
        }
    }
}

impl std::str::FromStr for StoreLocation {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "current-user" | "currentuser" => Ok(StoreLocation::CurrentUser),
            "local-machine" | "localmachine" => Ok(StoreLocation::LocalMachine),
            _ => Err(SigningError::ValidationError(format!(
                "Unknown store location: {s} (expected current-user or local-machine)"
            ))),
        }
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::CurrentUser => write!(f, "current-user"),
            StoreLocation::LocalMachine => write!(f, "local-machine"),
        }
    }
}

/// One row of the PowerShell query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoreEntry {
    thumbprint: String,
    subject: String,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    not_after: Option<String>,
}

/// `ConvertTo-Json` emits a bare object for a single row
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<StoreEntry>),
    One(StoreEntry),
}

/// Windows certificate store queried through PowerShell
#[derive(Debug, Clone)]
pub struct PowerShellStore {
    location: StoreLocation,
    shell: PathBuf,
}

impl PowerShellStore {
    pub fn new(location: StoreLocation) -> Self {
        let shell = if cfg!(windows) { "powershell.exe" } else { "pwsh" };
        Self {
            location,
            shell: PathBuf::from(shell),
        }
    }

    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    fn script(&self) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $certs = @(Get-ChildItem -Path '{}' -CodeSigningCert | ForEach-Object {{ \
               [pscustomobject]@{{ Thumbprint = $_.Thumbprint; Subject = $_.Subject; \
                 Issuer = $_.Issuer; NotAfter = $_.NotAfter.ToString('yyyy-MM-dd HH:mm:ss') }} }}); \
             ConvertTo-Json -InputObject $certs -Compress",
            self.location.provider_path()
        )
    }

    /// Parse the JSON written by the store query
    pub fn parse_entries(json: &str) -> Result<Vec<Certificate>> {
        let json = json.trim();
        if json.is_empty() || json == "null" {
            return Ok(Vec::new());
        }

        let entries = match serde_json::from_str::<OneOrMany>(json).map_err(|e| {
            SigningError::CertificateStore(format!("Unexpected certificate store output: {e}"))
        })? {
            OneOrMany::Many(entries) => entries,
            OneOrMany::One(entry) => vec![entry],
        };

        entries
            .into_iter()
            .map(|entry| -> Result<Certificate> {
                let mut cert = Certificate::new(Thumbprint::new(&entry.thumbprint)?, entry.subject);
                cert.issuer = entry.issuer;
                cert.not_after = entry.not_after;
                Ok(cert)
            })
            .collect()
    }
}

impl CertificateStore for PowerShellStore {
    fn code_signing_certificates(&self) -> Result<Vec<Certificate>> {
        log::info!(
            "Querying {} for code signing certificates",
            self.location.provider_path()
        );

        let output = Command::new(&self.shell)
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(self.script())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SigningError::CertificateStore(format!(
                    "Failed to run {}: {e}",
                    self.shell.display()
                ))
            })?;

        if !output.status.success() {
            return Err(SigningError::CertificateStore(format!(
                "Certificate store query failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let certificates = Self::parse_entries(&String::from_utf8_lossy(&output.stdout))?;
        log::debug!("Store returned {} code signing certificate(s)", certificates.len());
        Ok(certificates)
    }
}

/// Certificate files (`.cer`, `.crt`, `.pem`, `.der`) in one directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Decode one certificate file, PEM or DER
    pub fn load_file(path: &Path) -> Result<(Certificate, bool)> {
        let bytes = std::fs::read(path)?;
        let der_bytes = if bytes.starts_with(b"-----BEGIN") {
            let (_label, der_bytes) = der::pem::decode_vec(&bytes).map_err(|e| {
                SigningError::CertificateStore(format!("{}: {e}", path.display()))
            })?;
            der_bytes
        } else {
            bytes
        };

        let parsed = x509_cert::Certificate::from_der(&der_bytes)
            .map_err(|e| SigningError::CertificateStore(format!("{}: {e}", path.display())))?;

        let thumbprint = Thumbprint::from_digest(&Sha1::digest(&der_bytes))?;
        let tbs = &parsed.tbs_certificate;
        let certificate = Certificate::new(thumbprint, tbs.subject.to_string())
            .with_issuer(tbs.issuer.to_string())
            .with_not_after(tbs.validity.not_after.to_date_time().to_string());

        Ok((certificate, allows_code_signing(&parsed)?))
    }
}

/// No EKU extension means every usage is allowed
fn allows_code_signing(certificate: &x509_cert::Certificate) -> Result<bool> {
    let Some(extensions) = certificate.tbs_certificate.extensions.as_ref() else {
        return Ok(true);
    };

    let Some(eku) = extensions.iter().find(|e| e.extn_id == ID_CE_EXT_KEY_USAGE) else {
        return Ok(true);
    };

    let usages = ExtendedKeyUsage::from_der(eku.extn_value.as_bytes())?;
    Ok(usages
        .0
        .iter()
        .any(|oid| *oid == ID_KP_CODE_SIGNING || *oid == ANY_EXTENDED_KEY_USAGE))
}

impl CertificateStore for DirectoryStore {
    fn code_signing_certificates(&self) -> Result<Vec<Certificate>> {
        log::info!("Reading certificates from {}", self.dir.display());

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| {
                SigningError::CertificateStore(format!(
                    "Failed to read certificate directory {}: {e}",
                    self.dir.display()
                ))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| {
                    CERTIFICATE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
            })
            .collect();
        paths.sort();

        let mut certificates: Vec<Certificate> = Vec::new();
        for path in paths {
            match Self::load_file(&path) {
                Ok((cert, true)) => {
                    if certificates.iter().any(|c| c.thumbprint == cert.thumbprint) {
                        continue;
                    }
                    log::debug!("Eligible: {} ({})", cert.subject, path.display());
                    certificates.push(cert);
                }
                Ok((cert, false)) => {
                    log::debug!("Not valid for code signing: {} ({})", cert.subject, path.display());
                }
                Err(e) => log::warn!("Skipping {}: {e}", path.display()),
            }
        }

        Ok(certificates)
    }
}
