// Regression tests for the pyblocks binary.
// Requires: assert_cmd, predicates, tempfile crates in [dev-dependencies]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

fn script(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn pyblocks() -> Command {
    Command::cargo_bin("pyblocks").unwrap()
}

#[test]
fn cli_run_prints_program_output() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "hello.py", "for i in range(2):\n    print('hi', i)\n");
    pyblocks()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout("hi 0\nhi 1\n");
}

#[test]
fn cli_reports_miette_diagnostics_on_parse_error() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "bad.py", "print((1)\n");
    pyblocks().arg("translate").arg(&file).assert().failure().stderr(
        contains("pyblocks::parse")
            .or(contains("never closed"))
            .or(contains("help:")),
    );
}

#[test]
fn cli_reports_runtime_errors() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "boom.py", "print('ok')\nprint(1 / 0)\n");
    pyblocks()
        .arg("run")
        .arg(&file)
        .assert()
        .failure()
        .stdout("ok\n")
        .stderr(contains("ZeroDivisionError"));
}

#[test]
fn cli_translate_emits_json_and_warns_about_drops() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "mixed.py", "x = 1\nimport os\n");
    pyblocks()
        .arg("translate")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("\"assign-statement\"").and(contains("\"dropped\"")))
        .stderr(contains("dropped").and(contains("import")));
}

#[test]
fn cli_translate_xml() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "p.py", "print('a')\n");
    pyblocks()
        .args(["translate", "--format", "xml"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("<block type=\"print-statement\">"));
}

#[test]
fn cli_codegen_from_json_document() {
    let dir = TempDir::new().unwrap();
    let file = script(
        &dir,
        "doc.json",
        r#"{"blocks":[{"type":"print-statement","values":{"TEXT":{"type":"text","fields":{"TEXT":"hey"}}}}]}"#,
    );
    pyblocks()
        .arg("codegen")
        .arg(&file)
        .assert()
        .success()
        .stdout("print('hey')\n");
}

#[test]
fn cli_codegen_rejects_unknown_blocks() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "doc.json", r#"{"blocks":[{"type":"while-statement"}]}"#);
    pyblocks()
        .arg("codegen")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("while-statement"));
}

#[test]
fn cli_roundtrip_shows_diff() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "r.py", "x = 1\nwhile x:\n    x = 0\n");
    pyblocks()
        .arg("roundtrip")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("-while x:"));
}

#[test]
fn cli_lists_block_types() {
    pyblocks()
        .arg("blocks")
        .assert()
        .success()
        .stdout(contains("for-statement").and(contains("math_number")));
}

#[test]
fn cli_missing_file_fails() {
    pyblocks()
        .args(["run", "does/not/exist.py"])
        .assert()
        .failure()
        .stderr(contains("cannot read"));
}
