//! Domain types for batch signing: identities, targets, command lines and outcomes.

pub mod certificate;
pub mod invocation;
pub mod result;
pub mod types;

pub use certificate::Certificate;
pub use invocation::{SignSettings, SignerInvocation};
pub use result::{InvocationOutput, SigningResult, SigningStatus};
pub use types::{DigestAlgorithm, SigningTarget, Thumbprint, TimestampUrl};
