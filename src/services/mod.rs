//! Service layer module root.
//! Contains the per-batch services: certificate resolution, signer invocation and reporting.

pub mod invoker;
pub mod reporter;
pub mod resolver;

pub use invoker::SignerInvoker;
pub use reporter::{CollectingSink, LogSink, ReportSink, ResultReporter};
pub use resolver::{explicit_certificate, CertificateResolver};
