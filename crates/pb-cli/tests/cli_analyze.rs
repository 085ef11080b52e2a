use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_probitstat"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("probitstat_{}_{}", std::process::id(), name));
    p
}

#[test]
fn analyze_csv_contract() {
    let input = fixture_path("bioassay.csv");
    assert!(input.exists(), "missing fixture: {}", input.display());

    let out = run(&["analyze", "--input", input.to_string_lossy().as_ref()]);
    assert!(
        out.status.success(),
        "analyze should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON");
    assert_eq!(v["confidence_level"].as_f64(), Some(0.95));
    assert_eq!(v["control"]["applied"], true);

    let eds = v["effective_doses"].as_array().expect("effective_doses should be array");
    assert_eq!(eds.len(), 6);
    let ld50 = eds.iter().find(|e| e["label"] == "LD50").expect("LD50 row");
    let est = ld50["estimate"].as_f64().unwrap();
    assert!(est > 4.0 && est < 8.0, "LD50 = {}", est);
    assert!(ld50["fieller_lower"].as_f64().unwrap() < est);
    assert!(ld50["fieller_upper"].as_f64().unwrap() > est);
}

#[test]
fn analyze_json_matches_csv() {
    let csv = run(&["analyze", "-i", fixture_path("bioassay.csv").to_string_lossy().as_ref()]);
    let json = run(&["analyze", "-i", fixture_path("bioassay.json").to_string_lossy().as_ref()]);
    assert!(csv.status.success() && json.status.success());

    let a: serde_json::Value = serde_json::from_slice(&csv.stdout).unwrap();
    let b: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    assert_eq!(a["fitted"], b["fitted"]);
    assert_eq!(a["effective_doses"], b["effective_doses"]);
}

#[test]
fn analyze_custom_levels_and_output_file() {
    let out_path = tmp_path("analyze.json");
    let out = run(&[
        "analyze",
        "-i",
        fixture_path("bioassay.csv").to_string_lossy().as_ref(),
        "--levels",
        "0.25,0.5",
        "--confidence-level",
        "0.9",
        "--grid-points",
        "40",
        "-o",
        out_path.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let bytes = std::fs::read(&out_path).expect("output file written");
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let labels: Vec<&str> =
        v["effective_doses"].as_array().unwrap().iter().map(|e| e["label"].as_str().unwrap()).collect();
    assert_eq!(labels, ["LD25", "LD50"]);
    assert_eq!(v["confidence_level"].as_f64(), Some(0.9));
    let _ = std::fs::remove_file(out_path);
}

#[test]
fn analyze_single_group_fails_with_message() {
    let out = run(&["analyze", "-i", fixture_path("single_group.csv").to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Insufficient data"), "stderr={}", stderr);
}

#[test]
fn analyze_missing_column_lists_found_columns() {
    let out = run(&["analyze", "-i", fixture_path("missing_column.csv").to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Missing required columns"), "stderr={}", stderr);
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("probitstat "), "stdout={}", stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
