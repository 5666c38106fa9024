//! `uci_tester` binary tests

#![cfg(unix)]

use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

const FAKE_ENGINE: &str = r#"
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name Tester"; echo "uciok" ;;
    isready) [ -n "$SILENT" ] || echo "readyok" ;;
    go*) echo "bestmove e2e4 ponder e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// `/bin/sh -c <script>` をエンジンとして使う設定ファイルを書き出す
fn config_file(extra_session: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let script = FAKE_ENGINE.replace('\\', "\\\\").replace('"', "\\\"");
    writeln!(file, "[engine]").unwrap();
    writeln!(file, "path = \"/bin/sh\"").unwrap();
    writeln!(file, "args = [\"-c\", \"\"\"{script}\"\"\"]").unwrap();
    writeln!(file, "quit_grace_ms = 500").unwrap();
    writeln!(file, "[session]").unwrap();
    writeln!(file, "timeout_secs = 0.3").unwrap();
    writeln!(file, "{extra_session}").unwrap();
    file.flush().unwrap();
    file
}

fn harness() -> Command {
    Command::cargo_bin("uci_tester").unwrap()
}

#[test]
fn nonexistent_engine_exits_non_zero_without_sending() {
    let output = harness().arg("/nonexistent/path").output().unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Starting engine: /nonexistent/path"));
    assert!(!stdout.contains(">>>"));
}

#[test]
fn transcript_is_printed_to_stdout() {
    let cfg = config_file("");
    let output = harness().arg("--config").arg(cfg.path()).output().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "Starting engine: /bin/sh");
    assert!(lines.contains(&">>> uci"));
    assert!(lines.contains(&"<<< id name Tester"));
    assert!(lines.contains(&"<<< uciok"));
    assert!(lines.contains(&">>> position fen 7k/8/8/8/8/8/4Q3/5K2 w - - 0 1"));
    assert!(lines.contains(&"<<< bestmove e2e4 ponder e7e5"));
    assert!(lines.contains(&">>> quit"));
    assert_eq!(lines.last(), Some(&"Test complete."));
}

#[test]
fn flags_override_config_file() {
    let cfg = config_file("go = \"go depth 3\"");
    let output = harness()
        .arg("--config")
        .arg(cfg.path())
        .args(["--go", "go movetime 100", "--fen", "8/8/8/8/8/8/8/K6k w - - 0 1"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(">>> go movetime 100"));
    assert!(!stdout.contains(">>> go depth 3"));
    assert!(stdout.contains(">>> position fen 8/8/8/8/8/8/8/K6k w - - 0 1"));
}

#[test]
fn timeout_is_reported_but_not_fatal_by_default() {
    let cfg = config_file("");
    let output = harness().arg("--config").arg(cfg.path()).env("SILENT", "1").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Timed out waiting for 'readyok'."));
    assert!(stdout.contains(">>> ucinewgame"));
}

#[test]
fn strict_mode_fails_on_timeout() {
    let cfg = config_file("");
    let output = harness()
        .arg("--config")
        .arg(cfg.path())
        .arg("--strict")
        .env("SILENT", "1")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("readyok"), "stderr: {stderr}");
}

#[test]
fn invalid_timeout_flag_is_rejected() {
    let output = harness().args(["/bin/true", "--timeout", "-1"]).output().unwrap();
    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains(">>>"));
}
