#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

const WORKER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"DO":"QUIT"'*) exit 0 ;;
    *'"DO":"BUILD"'*)
      printf '{"REPORT":"PROGRESS","TEXT":"50%%"}\n'
      printf '{"DONE":true,"DO":"BUILD","TARGETS":2}\n'
      ;;
    *'"DO":"SLOW"'*)
      sleep 5
      printf '{"DONE":true}\n'
      ;;
    *'"DO":"CRASH"'*)
      echo "fatal: crashed" >&2
      exit 7
      ;;
    *)
      printf '{"REPORT":"SPARKLES"}\n'
      printf '{"DONE":false}\n'
      ;;
  esac
done
"#;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/stdiolink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn worker_script(tag: &str) -> (PathBuf, PathBuf) {
    let dir = unique_temp_dir(tag);
    let script = dir.join("worker.sh");
    std::fs::write(&script, WORKER).expect("worker script should be writable");
    (dir, script)
}

fn stdiolink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stdiolink"));
    cmd.env_remove("STDIOLINK_BACKEND")
        .arg("--log-level")
        .arg("error");
    cmd
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn version_reports_package_version() {
    let output = stdiolink()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        text(&output.stdout).trim(),
        format!("stdiolink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn call_prints_completion_as_json() {
    let (dir, script) = worker_script("call");

    let output = stdiolink()
        .args(["--format", "json", "call", "--verb", "BUILD"])
        .arg("/bin/sh")
        .arg(&script)
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", text(&output.stderr));
    let value: serde_json::Value =
        serde_json::from_str(text(&output.stdout).trim()).expect("stdout should be JSON");
    assert_eq!(value["DONE"], true);
    assert_eq!(value["TARGETS"], 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_report_is_alerted_on_stderr() {
    let (dir, script) = worker_script("unknown");

    let output = stdiolink()
        .args(["--format", "pretty", "call", "--verb", "PING"])
        .arg("/bin/sh")
        .arg(&script)
        .output()
        .expect("call should run");

    assert!(output.status.success());
    let stderr = text(&output.stderr);
    assert!(stderr.contains("!! BACKEND_ERROR: {\"REPORT\":\"SPARKLES\"}"));
    assert!(stderr.contains("stdiolink: unknown report SPARKLES"));
    assert_eq!(text(&output.stdout).trim(), "PING done=false");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn worker_crash_fails_the_call() {
    let (dir, script) = worker_script("crash");

    let output = stdiolink()
        .args(["call", "--verb", "CRASH"])
        .arg("/bin/sh")
        .arg(&script)
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = text(&output.stderr);
    assert!(stderr.contains("fatal: crashed"), "stderr: {stderr}");
    assert!(stderr.contains("error: 'CRASH' failed"), "stderr: {stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn call_timeout_returns_124() {
    let (dir, script) = worker_script("timeout");

    let output = stdiolink()
        .args(["call", "--verb", "SLOW", "--timeout", "200ms"])
        .arg("/bin/sh")
        .arg(&script)
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(124));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_worker_returns_transport_error() {
    let output = stdiolink()
        .args(["call", "--verb", "BUILD", "/nonexistent/stdiolink-worker"])
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn run_reads_commands_from_stdin_and_exits_with_worker() {
    let (dir, script) = worker_script("run");

    let mut child = stdiolink()
        .args(["--format", "json", "run"])
        .arg("/bin/sh")
        .arg(&script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("run should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"BUILD\n")
        .expect("commands should be written");

    let output: Output = child.wait_with_output().expect("run should finish");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", text(&output.stderr));
    let first = text(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(first.lines().next().unwrap_or_default())
        .expect("completion should be JSON");
    assert_eq!(value["DO"], "BUILD");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_strict_flags_malformed_lines() {
    let dir = unique_temp_dir("decode");
    let transcript = dir.join("out.log");
    std::fs::write(
        &transcript,
        "{\"REPORT\":\"Info\",\"TEXT\":\"hi\"}\nnot json\n{\"DONE\":1}\n",
    )
    .expect("transcript should be writable");

    let output = stdiolink()
        .args(["--format", "json", "decode", "--strict"])
        .arg(&transcript)
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(60));
    let rows: Vec<serde_json::Value> = text(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("row should be JSON"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["variant"], "malformed");
    assert_eq!(rows[1]["raw"], "not json");

    let _ = std::fs::remove_dir_all(&dir);
}
