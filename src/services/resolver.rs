//! Certificate resolution.
//!
//! Runs once per batch. An explicit certificate short-circuits the store; otherwise
//! the store decides, and the chooser only sees the question when there is one.

use crate::adapters::cert_store::CertificateStore;
use crate::adapters::prompt::CertificateChooser;
use crate::domain::certificate::Certificate;
use crate::domain::types::Thumbprint;
use crate::infra::error::{Result, SigningError};

pub struct CertificateResolver<'a> {
    store: &'a dyn CertificateStore,
    chooser: &'a mut dyn CertificateChooser,
}

impl<'a> CertificateResolver<'a> {
    pub fn new(store: &'a dyn CertificateStore, chooser: &'a mut dyn CertificateChooser) -> Self {
        Self { store, chooser }
    }

    /// Pick the signing identity for the batch
    pub fn resolve(&mut self, explicit: Option<Certificate>) -> Result<Certificate> {
        if let Some(certificate) = explicit {
            log::info!("Using explicit certificate {}", certificate.thumbprint);
            return Ok(certificate);
        }

        let mut candidates = self.store.code_signing_certificates()?;
        match candidates.len() {
            0 => Err(SigningError::NoCertificateFound),
            1 => {
                let certificate = candidates.remove(0);
                log::info!("Using certificate: {certificate}");
                Ok(certificate)
            }
            n => {
                log::info!("{n} code signing certificates available, asking for a choice");
                let index = self
                    .chooser
                    .choose(&candidates)
                    .ok_or(SigningError::SelectionCancelled)?;
                if index >= candidates.len() {
                    log::warn!("Chooser returned index {index} for {n} certificates");
                    return Err(SigningError::SelectionCancelled);
                }
                let certificate = candidates.swap_remove(index);
                log::info!("Using certificate: {certificate}");
                Ok(certificate)
            }
        }
    }
}

/// Build the explicit certificate for a thumbprint given on the command line.
///
/// The subject comes from the store when the thumbprint is there; a store miss
/// or store failure still yields a usable certificate.
pub fn explicit_certificate(store: &dyn CertificateStore, thumbprint: Thumbprint) -> Certificate {
    match store.find(&thumbprint) {
        Ok(Some(found)) => found,
        Ok(None) => {
            log::warn!("Certificate {thumbprint} not found in the store, using it as given");
            Certificate::from_thumbprint(thumbprint)
        }
        Err(e) => {
            log::warn!("Could not look up {thumbprint}: {e}");
            Certificate::from_thumbprint(thumbprint)
        }
    }
}
