//! Real child processes against shell-script signing tools.
#![cfg(unix)]

mod common;

use common::fake_tool::{install_script, touch};
use signtool_batch::adapters::{ProcessInvoker, SubprocessInvoker};
use signtool_batch::domain::SigningResult;
use signtool_batch::{
    Certificate, SignSettings, SignerInvocation, SignerInvoker, SigningStatus, SigningTarget,
    Thumbprint,
};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn cert() -> Certificate {
    Certificate::new(
        Thumbprint::new("E3FCC04DD19109C7562A08486B16DAFDCB92BE81").unwrap(),
        "CN=Contoso Code Signing",
    )
}

fn sign_with(script: &str, file_name: &str, invoker: &SubprocessInvoker) -> SigningResult {
    let temp_dir = TempDir::new().unwrap();
    let tool = install_script(temp_dir.path(), "signtool.exe", script);
    let target = SigningTarget::new(touch(temp_dir.path(), file_name)).unwrap();
    SignerInvoker::new(invoker, tool, cert(), SignSettings::default()).invoke(&target)
}

#[test]
fn zero_exit_is_signed() {
    let result = sign_with(
        "echo 'Successfully signed'; exit 0",
        "a.exe",
        &SubprocessInvoker::new(),
    );
    assert_eq!(result.status(), SigningStatus::Signed);
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.stdout().trim(), "Successfully signed");
}

#[test]
fn non_zero_exit_captures_error_stream() {
    let result = sign_with(
        "echo 'SignTool Error: bad signature' >&2; exit 5",
        "a.exe",
        &SubprocessInvoker::new(),
    );
    assert_eq!(result.status(), SigningStatus::Failed);
    assert_eq!(result.exit_code(), 5);
    assert_eq!(result.stderr().trim(), "SignTool Error: bad signature");
}

#[test]
fn arguments_arrive_separately_even_with_spaces() {
    let result = sign_with(
        r#"for a in "$@"; do echo "[$a]"; done"#,
        "my app.exe",
        &SubprocessInvoker::new(),
    );
    let lines: Vec<&str> = result.stdout().lines().collect();

    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0], "[sign]");
    assert_eq!(lines[1], "[/fd]");
    assert_eq!(lines[2], "[SHA256]");
    assert_eq!(lines[3], "[/sha1]");
    assert_eq!(lines[4], "[E3FCC04DD19109C7562A08486B16DAFDCB92BE81]");
    assert_eq!(lines[5], "[/t]");
    assert_eq!(lines[6], "[http://timestamp.digicert.com]");
    assert!(lines[7].starts_with('[') && lines[7].ends_with("/my app.exe]"));
}

#[test]
fn large_output_on_both_streams_does_not_deadlock() {
    let script = "head -c 1048576 /dev/zero | tr '\\0' 'o'; \
                  head -c 1048576 /dev/zero | tr '\\0' 'e' >&2; exit 3";

    for invoker in [
        SubprocessInvoker::new(),
        SubprocessInvoker::new().with_timeout(Some(Duration::from_secs(30))),
    ] {
        let result = sign_with(script, "big.exe", &invoker);
        assert_eq!(result.exit_code(), 3);
        assert_eq!(result.stdout().len(), 1_048_576);
        assert_eq!(result.stderr().len(), 1_048_576);
    }
}

#[test]
fn standard_input_is_closed() {
    // `cat` would block forever on an inherited terminal
    let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::from_secs(10)));
    let result = sign_with("cat; echo eof-seen", "a.exe", &invoker);
    assert_eq!(result.status(), SigningStatus::Signed);
    assert_eq!(result.stdout().trim(), "eof-seen");
}

#[test]
fn timeout_kills_hung_tool() {
    let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    let result = sign_with("echo started; exec sleep 30", "a.exe", &invoker);

    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(result.status(), SigningStatus::TimedOut);
    assert_eq!(result.exit_code(), -1);
    assert!(result.error().is_some());
}

#[test]
fn timeout_returns_while_grandchild_holds_output() {
    // No `exec`: the shell is killed, its `sleep` child keeps the pipes open
    let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    let result = sign_with("echo started; sleep 8; echo done", "a.exe", &invoker);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.status(), SigningStatus::TimedOut);
    assert_eq!(result.stdout().trim(), "started");
}

#[test]
fn background_helper_does_not_outlive_the_deadline() {
    let invoker = SubprocessInvoker::new().with_timeout(Some(Duration::from_secs(1)));
    let started = Instant::now();
    let result = sign_with("echo signed; sleep 8 & exit 0", "a.exe", &invoker);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.status(), SigningStatus::Signed);
    assert_eq!(result.stdout().trim(), "signed");
}

#[test]
fn unlaunchable_tool_is_a_launch_failure() {
    let temp_dir = TempDir::new().unwrap();
    let not_executable = temp_dir.path().join("signtool.exe");
    std::fs::write(&not_executable, "not a program").unwrap();
    let target = SigningTarget::new(touch(temp_dir.path(), "a.exe")).unwrap();

    let invocation =
        SignerInvocation::new(&not_executable, &cert(), &target, &SignSettings::default());
    assert!(SubprocessInvoker::new().run(&invocation).is_err());

    let process = SubprocessInvoker::new();
    let result = SignerInvoker::new(&process, not_executable, cert(), SignSettings::default())
        .invoke(&target);
    assert_eq!(result.status(), SigningStatus::LaunchFailed);
    assert_eq!(result.exit_code(), -1);
    assert!(result.stderr().contains("Failed to start"));
}

#[test]
fn sequential_runs_leave_no_process_behind() {
    let invoker = SubprocessInvoker::new();
    for i in 0..20 {
        let result = sign_with(&format!("exit {}", i % 3), "a.exe", &invoker);
        assert_eq!(result.exit_code(), i % 3);
    }
}
