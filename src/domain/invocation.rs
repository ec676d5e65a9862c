//! Command line for one `signtool sign` run.
//!
//! ```text
//! <tool> sign [/debug] /fd SHA256 /sha1 <thumbprint> /t <timestamp-url> "<path>"
//! ```

use crate::domain::certificate::Certificate;
use crate::domain::types::{DigestAlgorithm, SigningTarget, TimestampUrl};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Settings shared by every invocation in a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignSettings {
    pub digest_algorithm: DigestAlgorithm,
    pub timestamp_url: TimestampUrl,
    /// Adds `/debug` to the tool's command line
    pub debug: bool,
}

/// Tool path and argument list for a single file.
///
/// Arguments are kept as separate values and handed to the OS one by one, so
/// paths with spaces reach the tool intact. [`SignerInvocation::command_line`]
/// renders the quoted form for logs and dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInvocation {
    tool: PathBuf,
    args: Vec<OsString>,
}

impl SignerInvocation {
    pub fn new(
        tool: &Path,
        certificate: &Certificate,
        target: &SigningTarget,
        settings: &SignSettings,
    ) -> Self {
        let mut args: Vec<OsString> = vec!["sign".into()];
        if settings.debug {
            args.push("/debug".into());
        }
        args.push("/fd".into());
        args.push(settings.digest_algorithm.as_signtool_arg().into());
        args.push("/sha1".into());
        args.push(certificate.thumbprint.as_str().into());
        args.push("/t".into());
        args.push(settings.timestamp_url.as_str().into());
        args.push(target.path().as_os_str().to_owned());

        Self {
            tool: tool.to_path_buf(),
            args,
        }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Quoted command line as the Windows argument parser would read it
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|arg| quote_arg(arg).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Quote one argument following the MSVC runtime rules.
///
/// Backslashes are literal except in front of a quote, where they have to be
/// doubled, and a trailing run before the closing quote is doubled as well.
pub fn quote_arg(arg: &OsStr) -> Cow<'_, str> {
    let arg = arg.to_string_lossy();
    let needs_quotes = arg.is_empty() || arg.contains([' ', '\t', '"']);
    if !needs_quotes {
        return arg;
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat('\\').take(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat('\\').take(backslashes * 2));
    quoted.push('"');
    Cow::Owned(quoted)
}
