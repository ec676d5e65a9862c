//! Running the signing tool as a child process.
//!
//! One child at a time. stdin is redirected and closed immediately, stdout
//! and stderr are drained concurrently so a chatty tool cannot fill a pipe and
//! stall. The child is always reaped before `run` returns. With a timeout,
//! `run` also returns on time when something the tool started keeps its
//! output pipes open; output written after a short grace period is dropped.

use crate::domain::invocation::SignerInvocation;
use crate::domain::result::InvocationOutput;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long output is still collected once the timeout has been handled
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Narrow seam over process execution so batches can run against scripted fakes
pub trait ProcessInvoker {
    /// Run to completion and capture output.
    ///
    /// `Err` means the process never started.
    fn run(&self, invocation: &SignerInvocation) -> io::Result<InvocationOutput>;
}

/// Real child process execution
#[derive(Debug, Clone, Default)]
pub struct SubprocessInvoker {
    timeout: Option<Duration>,
}

impl SubprocessInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the tool after `timeout`. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    fn spawn(invocation: &SignerInvocation) -> io::Result<Child> {
        Command::new(invocation.tool())
            .args(invocation.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    fn wait_with_timeout(child: Child, timeout: Duration) -> io::Result<InvocationOutput> {
        let mut guard = ChildGuard::new(child);
        let stdout = guard.child.stdout.take().map(Drain::spawn);
        let stderr = guard.child.stderr.take().map(Drain::spawn);

        let deadline = Instant::now() + timeout;
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = guard.try_reap()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                log::warn!("Signing tool exceeded {timeout:?}, terminating");
                timed_out = true;
                break guard.kill_and_reap();
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Processes the tool started may still hold the pipes open
        let drain_deadline = deadline.max(Instant::now()) + DRAIN_GRACE;
        Ok(InvocationOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout: collect(stdout, drain_deadline),
            stderr: collect(stderr, drain_deadline),
            timed_out,
        })
    }
}

impl ProcessInvoker for SubprocessInvoker {
    fn run(&self, invocation: &SignerInvocation) -> io::Result<InvocationOutput> {
        log::debug!("Running: {}", invocation.command_line());
        let mut child = Self::spawn(invocation)?;

        // Input is never written; closing it keeps a prompting tool from waiting on us
        drop(child.stdin.take());

        match self.timeout {
            Some(timeout) => Self::wait_with_timeout(child, timeout),
            None => {
                let output = child.wait_with_output()?;
                Ok(InvocationOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                })
            }
        }
    }
}

/// Pipe reader on its own thread; what it has read so far stays available
/// even when the pipe never reaches end of file
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(mut reader: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done) = mpsc::channel();
        let shared = Arc::clone(&buf);

        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match shared.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
            let _ = done_tx.send(());
        });

        Self { buf, done }
    }

    fn finish(self, deadline: Instant) -> Vec<u8> {
        let wait = deadline.saturating_duration_since(Instant::now());
        if self.done.recv_timeout(wait).is_err() {
            log::warn!("Output pipe still open after the tool exited, keeping what was read");
        }
        match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn collect(drain: Option<Drain>, deadline: Instant) -> String {
    drain
        .map(|d| String::from_utf8_lossy(&d.finish(deadline)).into_owned())
        .unwrap_or_default()
}

/// Kills and reaps the child if dropped before it was waited on
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped = status.is_some();
        Ok(status)
    }

    fn kill_and_reap(&mut self) -> Option<ExitStatus> {
        let _ = self.child.kill();
        let status = self.child.wait().ok();
        self.reaped = true;
        status
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_means_none() {
        let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::ZERO));
        assert!(invoker.timeout.is_none());

        let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::from_secs(3)));
        assert_eq!(invoker.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_missing_tool_is_launch_error() {
        use crate::domain::{Certificate, SignSettings, SigningTarget, Thumbprint};
        let invocation = SignerInvocation::new(
            std::path::Path::new("/definitely/not/here/signtool.exe"),
            &Certificate::from_thumbprint(Thumbprint::new("CD".repeat(20)).unwrap()),
            &SigningTarget::unchecked("a.exe"),
            &SignSettings::default(),
        );
        assert!(SubprocessInvoker::new().run(&invocation).is_err());
    }

    /// Yields one chunk, then blocks like a pipe whose writer never exits
    struct Stalled {
        sent: bool,
    }

    impl Read for Stalled {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                thread::sleep(Duration::from_secs(30));
                return Ok(0);
            }
            self.sent = true;
            buf[..7].copy_from_slice(b"partial");
            Ok(7)
        }
    }

    #[test]
    fn test_drain_gives_up_on_open_pipe_at_deadline() {
        let drain = Drain::spawn(Stalled { sent: false });
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let bytes = drain.finish(Instant::now() + Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(bytes, b"partial");
    }
}
