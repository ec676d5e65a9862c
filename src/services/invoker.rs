//! Signer invocation: one file, one child process, one result record.

use crate::adapters::process::ProcessInvoker;
use crate::domain::certificate::Certificate;
use crate::domain::invocation::{SignSettings, SignerInvocation};
use crate::domain::result::SigningResult;
use crate::domain::types::SigningTarget;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Signs single files with a tool and certificate resolved up front.
///
/// Never fails: launch problems and non-zero exits are data on the returned
/// [`SigningResult`].
pub struct SignerInvoker<'a> {
    process: &'a dyn ProcessInvoker,
    tool: PathBuf,
    certificate: Certificate,
    settings: SignSettings,
}

impl<'a> SignerInvoker<'a> {
    pub fn new(
        process: &'a dyn ProcessInvoker,
        tool: PathBuf,
        certificate: Certificate,
        settings: SignSettings,
    ) -> Self {
        Self {
            process,
            tool,
            certificate,
            settings,
        }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn invocation(&self, target: &SigningTarget) -> SignerInvocation {
        SignerInvocation::new(&self.tool, &self.certificate, target, &self.settings)
    }

    pub fn invoke(&self, target: &SigningTarget) -> SigningResult {
        let invocation = self.invocation(target);
        let started = Instant::now();

        let result = match self.process.run(&invocation) {
            Ok(output) => SigningResult::from_output(target.path(), output, started.elapsed()),
            Err(e) => SigningResult::launch_failed(
                target.path(),
                format!("Failed to start {}: {e}", self.tool.display()),
            ),
        };

        if !result.stdout().trim().is_empty() {
            log::debug!("[{target}] stdout: {}", result.stdout().trim_end());
        }
        if !result.stderr().trim().is_empty() {
            log::debug!("[{target}] stderr: {}", result.stderr().trim_end());
        }
        log::debug!(
            "[{target}] {:?}, exit code {} after {:?}",
            result.status(),
            result.exit_code(),
            result.duration()
        );

        result
    }
}
