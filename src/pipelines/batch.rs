//! `BatchWorkflow` orchestrates a signing batch.
//!
//! Steps:
//! 1. Locate the signing tool (fails the batch with `ToolNotFound`)
//! 2. Resolve the certificate (fails with `NoCertificateFound` / `SelectionCancelled`);
//!    a thumbprint given by the caller only looks up the subject
//! 3. For each target, in order: ask the gate, invoke, record
//!
//! Nothing is launched until both pre-flight steps succeed. Per-file failures
//! are recorded and never stop the remaining files.

use crate::adapters::cert_store::CertificateStore;
use crate::adapters::process::ProcessInvoker;
use crate::adapters::prompt::{CertificateChooser, ConfirmGate};
use crate::adapters::tool_locator::ToolLocator;
use crate::domain::certificate::Certificate;
use crate::domain::invocation::SignSettings;
use crate::domain::result::SigningResult;
use crate::domain::types::{SigningTarget, Thumbprint};
use crate::infra::error::Result;
use crate::services::invoker::SignerInvoker;
use crate::services::resolver::{explicit_certificate, CertificateResolver};
use serde::Serialize;
use std::path::PathBuf;

/// What a completed batch did
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub tool: PathBuf,
    pub certificate: Certificate,
    /// One record per attempted file, in input order
    pub results: Vec<SigningResult>,
    /// Files declined at the confirmation gate
    pub skipped: Vec<PathBuf>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(SigningResult::is_success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SigningResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Collaborators resolved by the caller and threaded through the batch
pub struct BatchWorkflow<'a> {
    locator: &'a dyn ToolLocator,
    store: &'a dyn CertificateStore,
    process: &'a dyn ProcessInvoker,
    settings: SignSettings,
}

impl<'a> BatchWorkflow<'a> {
    #[must_use]
    pub fn new(
        locator: &'a dyn ToolLocator,
        store: &'a dyn CertificateStore,
        process: &'a dyn ProcessInvoker,
    ) -> Self {
        Self {
            locator,
            store,
            process,
            settings: SignSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SignSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SignSettings {
        &self.settings
    }

    /// Sign `targets` in order.
    ///
    /// Returns `Err` only for pre-flight failures; by then no process has run.
    pub fn run(
        &self,
        targets: &[SigningTarget],
        explicit: Option<Certificate>,
        chooser: &mut dyn CertificateChooser,
        gate: &mut dyn ConfirmGate,
    ) -> Result<BatchOutcome> {
        log::info!("Starting batch of {} file(s)", targets.len());

        let tool = self.locator.locate()?;
        let certificate = CertificateResolver::new(self.store, chooser).resolve(explicit)?;

        Ok(self.sign_all(tool, certificate, targets, gate))
    }

    /// Sign `targets` with the certificate named by `thumbprint`.
    ///
    /// The store is only asked for the subject once the tool has been found, so
    /// a missing tool fails the batch before any store query.
    pub fn run_with_thumbprint(
        &self,
        targets: &[SigningTarget],
        thumbprint: Thumbprint,
        gate: &mut dyn ConfirmGate,
    ) -> Result<BatchOutcome> {
        log::info!("Starting batch of {} file(s)", targets.len());

        let tool = self.locator.locate()?;
        let certificate = explicit_certificate(self.store, thumbprint);
        log::info!("Using explicit certificate {certificate}");

        Ok(self.sign_all(tool, certificate, targets, gate))
    }

    fn sign_all(
        &self,
        tool: PathBuf,
        certificate: Certificate,
        targets: &[SigningTarget],
        gate: &mut dyn ConfirmGate,
    ) -> BatchOutcome {
        let invoker = SignerInvoker::new(
            self.process,
            tool.clone(),
            certificate.clone(),
            self.settings.clone(),
        );

        let mut results = Vec::with_capacity(targets.len());
        let mut skipped = Vec::new();

        for (index, target) in targets.iter().enumerate() {
            if !gate.confirm(target) {
                log::warn!("Skipped {target}");
                skipped.push(target.path().to_path_buf());
                continue;
            }

            log::info!("[{}/{}] Signing {target}", index + 1, targets.len());
            let result = invoker.invoke(target);
            if result.is_success() {
                log::info!("Signed {target}");
            }
            results.push(result);
        }

        BatchOutcome {
            tool,
            certificate,
            results,
            skipped,
        }
    }
}
