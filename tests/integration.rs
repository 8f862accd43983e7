//! Integration tests for the thrones binary.
//!
//! Runs a host and a joining process over TCP on localhost, drives them via
//! stdin, and checks the notifications they print.

use std::io::{BufRead, BufReader, Lines, Write};
use std::net::TcpListener;
use std::process::{Child, ChildStdout, Command, Stdio};

type Output = Lines<BufReader<ChildStdout>>;

fn spawn(args: &[&str]) -> (Child, Output) {
    let exe = env!("CARGO_BIN_EXE_thrones");
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start thrones");
    let stdout = child.stdout.take().unwrap();
    (child, BufReader::new(stdout).lines())
}

/// Reads stdout until a line starting with `prefix` shows up.
fn wait_for(out: &mut Output, prefix: &str) -> String {
    for line in out.by_ref() {
        let line = line.unwrap();
        if line.starts_with(prefix) {
            return line;
        }
    }
    panic!("process exited before printing '{prefix}'");
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn host_and_guest_play_until_surrender() {
    let port = free_port().to_string();
    let (mut host, mut host_out) = spawn(&["--host", &port, "--seed", "5"]);
    wait_for(&mut host_out, "waiting for an opponent");

    let addr = format!("127.0.0.1:{port}");
    let (mut guest, mut guest_out) = spawn(&["--connect", &addr]);

    let host_start = wait_for(&mut host_out, "match started");
    let guest_start = wait_for(&mut guest_out, "match started");
    // exactly one side begins
    assert_ne!(
        host_start.ends_with("you begin"),
        guest_start.ends_with("you begin")
    );

    let mut stdin = host.stdin.take().unwrap();
    writeln!(stdin, "board").unwrap();
    writeln!(stdin, "surrender").unwrap();
    stdin.flush().unwrap();

    assert!(wait_for(&mut host_out, "favors:").contains("hasten 0/"));
    assert_eq!(wait_for(&mut host_out, "match over"), "match over: you lost");
    assert_eq!(wait_for(&mut guest_out, "match over"), "match over: you won");
    assert!(host.wait().unwrap().success());
    assert!(guest.wait().unwrap().success());
}

#[test]
fn mode_is_required() {
    let exe = env!("CARGO_BIN_EXE_thrones");
    let status = Command::new(exe)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn missing_config_file_fails() {
    let exe = env!("CARGO_BIN_EXE_thrones");
    let status = Command::new(exe)
        .args(["--host", "0", "--config", "/nonexistent/thrones.json"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}
