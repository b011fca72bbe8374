//! CLI end-to-end tests that exercise the CLI binary against fixture documents.
//! These complement `cli_tests.rs` by using the shared fixture files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../tests/schemas");

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("typegraph").expect("binary should exist")
}

fn fixture_names() -> Vec<&'static str> {
    vec!["petstore", "composition", "recursive", "namespaces"]
}

// ── E2E: Compile all fixtures via CLI ───────────────────────────────────────

#[test]
fn test_cli_e2e_compile_all_fixtures() {
    let dir = TempDir::new().unwrap();

    for name in fixture_names() {
        let input = format!("{FIXTURES_DIR}/{name}.json");
        let output = dir.path().join(format!("{name}.graph.json"));

        cmd()
            .args(["compile", &input])
            .args(["-o", output.to_str().unwrap()])
            .assert()
            .success();

        let content = fs::read_to_string(&output)
            .unwrap_or_else(|_| panic!("{name}: graph file should exist"));
        let graph: serde_json::Value = serde_json::from_str(&content)
            .unwrap_or_else(|_| panic!("{name}: graph should be valid JSON"));
        assert!(
            graph["nodes"].as_array().is_some_and(|n| !n.is_empty()),
            "{name}: graph should have nodes"
        );
    }
}

// ── E2E: Deterministic output ───────────────────────────────────────────────

#[test]
fn test_cli_e2e_output_is_deterministic() {
    let input = format!("{FIXTURES_DIR}/petstore.json");
    let run = || {
        cmd()
            .args(["compile", &input, "--format", "compact"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    assert_eq!(run(), run());
}

// ── E2E: Namespaces ─────────────────────────────────────────────────────────

#[test]
fn test_cli_e2e_namespace_names() {
    let input = format!("{FIXTURES_DIR}/namespaces.json");
    cmd()
        .args(["compile", &input, "--names"])
        .assert()
        .success()
        .stdout(predicate::eq("Bar\nBarParameter\nBarResponse\nBarRequestBody\n"));
}

// ── E2E: Decode through a discriminated union ───────────────────────────────

#[test]
fn test_cli_e2e_decode_pet() {
    let dir = TempDir::new().unwrap();
    let input = format!("{FIXTURES_DIR}/petstore.json");
    let payload = dir.path().join("pet.json");
    fs::write(
        &payload,
        serde_json::json!({
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "name": "Tom",
            "kind": "kitten"
        })
        .to_string(),
    )
    .unwrap();

    let output = cmd()
        .args(["decode", &input, "--type", "Pet"])
        .args(["--payload", payload.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let decoded: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(decoded["kind"], serde_json::json!("kitten"));
    assert_eq!(decoded["name"], serde_json::json!("Tom"));
}

// ── E2E: Excluded operations ────────────────────────────────────────────────

#[test]
fn test_cli_e2e_exclude_tag() {
    let input = format!("{FIXTURES_DIR}/petstore.json");
    cmd()
        .args(["compile", &input, "--names", "--exclude-tag", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GetPetParams"))
        .stdout(predicate::str::contains("DeletePetsPetIDParams").not());
}

// ── E2E: Options file ───────────────────────────────────────────────────────

#[test]
fn test_cli_e2e_options_file() {
    let dir = TempDir::new().unwrap();
    let options = dir.path().join("options.json");
    fs::write(&options, r#"{ "naming": { "reserved-words": ["Error"] } }"#).unwrap();
    let input = format!("{FIXTURES_DIR}/petstore.json");

    cmd()
        .args(["compile", &input, "--names"])
        .args(["--options", options.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Error_\n"));
}
