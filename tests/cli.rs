//! End-to-end tests for the `analyzer` binary
//!
//! Each test runs the real executable with piped standard input and checks its exit status
//! and standard output.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_analyzer(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_analyzer"))
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn analyzer");

    // The child may exit before reading (configuration errors), so a broken pipe is fine
    let mut pipe = child.stdin.take().expect("stdin piped");
    let _ = pipe.write_all(stdin.as_bytes());
    drop(pipe);

    child.wait_with_output().expect("failed to wait for analyzer")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_uppercase_rotate_log() {
    let output = run_analyzer(&["20", "uppercaser", "rotator", "logger"], "hello\n<END>\n");
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "OHELL\nPipeline shutdown complete\n");
}

#[test]
fn test_records_keep_their_order() {
    let output = run_analyzer(&["1", "flipper", "logger"], "abc\ndef\nghi\n<END>\n");
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "cba\nfed\nihg\nPipeline shutdown complete\n"
    );
}

#[test]
fn test_end_of_input_without_marker() {
    let output = run_analyzer(&["4", "expander", "logger"], "ab\n");
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "a b\nPipeline shutdown complete\n");
}

#[test]
fn test_typewriter_without_delay() {
    let output = run_analyzer(
        &["2", "typewriter", "--typewriter-delay-ms", "0"],
        "hi\n<END>\n",
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "[typewriter] hi\nPipeline shutdown complete\n"
    );
}

#[test]
fn test_custom_end_marker() {
    let output = run_analyzer(
        &["3", "logger", "--end-marker", "STOP"],
        "one\nSTOP\ntwo\n",
    );
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "one\nPipeline shutdown complete\n");
}

#[test]
fn test_zero_queue_size_fails() {
    let output = run_analyzer(&["0", "logger"], "ignored\n<END>\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("Usage"));
    assert!(!stdout_of(&output).contains("ignored"));
}

#[test]
fn test_unknown_stage_fails() {
    let output = run_analyzer(&["5", "uppercaser", "teleporter"], "x\n<END>\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("teleporter"));
}

#[test]
fn test_missing_stages_fails() {
    let output = run_analyzer(&["5"], "");
    assert_eq!(output.status.code(), Some(1));
}
