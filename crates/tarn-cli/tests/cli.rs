use predicates::prelude::*;
use std::fs;

fn tarn() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("tarn").unwrap()
}

fn write_source(dir: &tempfile::TempDir, name: &str, source: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path.to_str().unwrap().to_string()
}

// ── check command ───────────────────────────────────────────

#[test]
fn check_valid_file_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "ok.tarn", "let id x = x\nlet a = id 1\n");

    tarn()
        .args(["check", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn check_type_error_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "bad.tarn", "let a = 1 + \"x\"\n");

    tarn()
        .args(["check", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("type error"));
}

#[test]
fn check_reports_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "unknown.tarn", "let g x = frobnicate x\n");

    tarn()
        .args(["check", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn check_missing_file_fails() {
    tarn()
        .args(["check", "no-such-file.tarn"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

// ── parse command ───────────────────────────────────────────

#[test]
fn parse_dumps_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "dump.tarn", "let add x y = x + y\n");

    tarn()
        .args(["parse", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("let add x y = x + y"));
}

#[test]
fn parse_error_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "broken.tarn", "let = 1\n");

    tarn()
        .args(["parse", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"));
}
