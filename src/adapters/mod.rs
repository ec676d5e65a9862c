//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - locating the signing tool on disk
//! - running it as a child process
//! - querying certificate stores
//! - interactive prompts (certificate choice, per-file confirmation)

pub mod cert_store;
pub mod process;
pub mod prompt;
pub mod tool_locator;

pub use cert_store::{CertificateStore, DirectoryStore, PowerShellStore, StoreLocation};
pub use process::{ProcessInvoker, SubprocessInvoker};
pub use prompt::{
    AlwaysSign, CertificateChooser, ConfirmChoice, ConfirmGate, DryRun, LineInput, PromptGate,
    TerminalChooser,
};
pub use tool_locator::{SdkToolLocator, ToolLocator, ToolVersion, SIGNTOOL_EXE};
