//! Batch code signing through an external signing tool.
//!
//! A batch resolves one certificate and one tool up front, then signs each
//! file in order with a separate `signtool sign` process, recording the exit
//! code and captured output of every run. Failures of individual files are
//! recorded and reported; only a missing tool or certificate stops a batch.
//!
//! ```no_run
//! use signtool_batch::adapters::{AlwaysSign, PowerShellStore, SdkToolLocator, StoreLocation,
//!     SubprocessInvoker, TerminalChooser};
//! use signtool_batch::{BatchWorkflow, ResultReporter, SigningTarget};
//!
//! # fn main() -> signtool_batch::Result<()> {
//! let locator = SdkToolLocator::default();
//! let store = PowerShellStore::new(StoreLocation::CurrentUser);
//! let process = SubprocessInvoker::new();
//!
//! let targets = vec![SigningTarget::new("app.exe")?];
//! let outcome = BatchWorkflow::new(&locator, &store, &process).run(
//!     &targets,
//!     None,
//!     &mut TerminalChooser::stdio(),
//!     &mut AlwaysSign,
//! )?;
//! let results = ResultReporter::default().report(outcome.results);
//! println!("{} file(s) processed", results.len());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use domain::{
    Certificate, DigestAlgorithm, SignSettings, SignerInvocation, SigningResult, SigningStatus,
    SigningTarget, Thumbprint, TimestampUrl,
};
pub use infra::error::{FileError, Result, SigningError};
pub use pipelines::{BatchOutcome, BatchWorkflow};
pub use services::{CertificateResolver, ResultReporter, SignerInvoker};
