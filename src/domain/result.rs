//! Per-file outcome records.

use crate::infra::error::FileError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exit code recorded when the tool produced none (launch failure, timeout, signal)
pub const NO_EXIT_CODE: i32 = -1;

/// How a single invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// Tool exited with 0
    Signed,
    /// Tool ran and exited non-zero
    Failed,
    /// Tool could not be started
    LaunchFailed,
    /// Tool exceeded the configured timeout and was killed
    TimedOut,
}

/// Captured output of one tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// `None` when the process was terminated without an exit code
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Result of signing one file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningResult {
    path: PathBuf,
    stdout: String,
    stderr: String,
    exit_code: i32,
    status: SigningStatus,
    #[serde(with = "duration_millis", rename = "duration_ms")]
    duration: Duration,
}

impl SigningResult {
    /// Classify captured tool output
    pub fn from_output(path: &Path, output: InvocationOutput, duration: Duration) -> Self {
        let status = match output.exit_code {
            _ if output.timed_out => SigningStatus::TimedOut,
            Some(0) => SigningStatus::Signed,
            _ => SigningStatus::Failed,
        };

        Self {
            path: path.to_path_buf(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code.unwrap_or(NO_EXIT_CODE),
            status,
            duration,
        }
    }

    /// Record a tool that never started
    pub fn launch_failed(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            stdout: String::new(),
            stderr: message.into(),
            exit_code: NO_EXIT_CODE,
            status: SigningStatus::LaunchFailed,
            duration: Duration::ZERO,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn status(&self) -> SigningStatus {
        self.status
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_success(&self) -> bool {
        self.status == SigningStatus::Signed
    }

    /// The non-fatal error for a failed record, `None` when signed
    pub fn error(&self) -> Option<FileError> {
        let message = self.failure_message();
        match self.status {
            SigningStatus::Signed => None,
            SigningStatus::Failed => Some(FileError::SigningFailure {
                path: self.path.clone(),
                exit_code: self.exit_code,
                message,
            }),
            SigningStatus::LaunchFailed => Some(FileError::LaunchFailure {
                path: self.path.clone(),
                message,
            }),
            SigningStatus::TimedOut => Some(FileError::TimedOut {
                path: self.path.clone(),
                message,
            }),
        }
    }

    // signtool writes some errors to stdout, so fall back to it
    fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        "no diagnostic output".to_string()
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stderr: &str) -> InvocationOutput {
        InvocationOutput {
            exit_code: code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            timed_out: false,
        }
    }

    #[test]
    fn test_zero_exit_is_success() {
        let r = SigningResult::from_output(Path::new("a.exe"), output(Some(0), ""), Duration::ZERO);
        assert!(r.is_success());
        assert_eq!(r.exit_code(), 0);
        assert!(r.error().is_none());
    }

    #[test]
    fn test_non_zero_exit_carries_diagnostics() {
        let r = SigningResult::from_output(
            Path::new("a.exe"),
            output(Some(5), "bad signature\n"),
            Duration::from_millis(12),
        );
        assert_eq!(r.status(), SigningStatus::Failed);
        assert_eq!(r.exit_code(), 5);
        assert_eq!(r.stderr(), "bad signature\n");
        assert_eq!(
            r.error(),
            Some(FileError::SigningFailure {
                path: PathBuf::from("a.exe"),
                exit_code: 5,
                message: "bad signature".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_exit_code_is_failure() {
        let r = SigningResult::from_output(Path::new("a.exe"), output(None, ""), Duration::ZERO);
        assert_eq!(r.status(), SigningStatus::Failed);
        assert_eq!(r.exit_code(), NO_EXIT_CODE);
    }

    #[test]
    fn test_timeout_wins_over_exit_code() {
        let mut out = output(Some(0), "");
        out.timed_out = true;
        let r = SigningResult::from_output(Path::new("a.exe"), out, Duration::ZERO);
        assert_eq!(r.status(), SigningStatus::TimedOut);
        assert!(matches!(r.error(), Some(FileError::TimedOut { .. })));
    }

    #[test]
    fn test_launch_failure_record() {
        let r = SigningResult::launch_failed(Path::new("a.exe"), "access denied");
        assert_eq!(r.status(), SigningStatus::LaunchFailed);
        assert_eq!(r.exit_code(), NO_EXIT_CODE);
        assert_eq!(r.stderr(), "access denied");
    }

    #[test]
    fn test_failure_message_falls_back_to_stdout() {
        let out = InvocationOutput {
            exit_code: Some(1),
            stdout: "SignTool Error: No certificates were found".to_string(),
            stderr: String::new(),
            timed_out: false,
        };
        let r = SigningResult::from_output(Path::new("a.exe"), out, Duration::ZERO);
        match r.error() {
            Some(FileError::SigningFailure { message, .. }) => {
                assert_eq!(message, "SignTool Error: No certificates were found");
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serializes_for_scripting() {
        let r = SigningResult::from_output(Path::new("a.exe"), output(Some(0), ""), Duration::from_millis(7));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "signed");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["duration_ms"], 7);
    }
}
