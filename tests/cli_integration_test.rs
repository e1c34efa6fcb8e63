mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use common::{TestFixtures, temp_config, temp_dir};

fn xml_verdict(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xml-verdict"))
        .args(args)
        .env_remove("XML_VERDICT_MODE")
        .env_remove("XML_VERDICT_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute xml-verdict")
}

fn copy_fixture(fixtures: &TestFixtures, name: &str, dir: &Path) {
    fs::copy(fixtures.xml(name), dir.join(name)).unwrap();
}

#[test]
fn test_cli_help_output() {
    let output = xml_verdict(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for flag in [
        "--test",
        "--config",
        "--extensions",
        "--recursive",
        "--threads",
        "--format",
        "--log-format",
    ] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn test_cli_nonexistent_path_is_fatal() {
    let output = xml_verdict(&["/nonexistent/directory/path"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Path does not exist"));
}

#[test]
fn test_cli_missing_schema_is_fatal() {
    let fixtures = TestFixtures::new();
    let config = fixtures.config();
    let valid = fixtures.valid();

    let output = xml_verdict(&[
        "-c",
        config.to_str().unwrap(),
        "-q",
        valid.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Schema file not found"));
}

#[test]
fn test_cli_end_to_end_mixed_batch() {
    let fixtures = TestFixtures::new();
    let dir = temp_dir();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    for name in [
        "valid.xml",
        "malformed.xml",
        "schema-invalid.xml",
        "mislabelled.xml",
    ] {
        copy_fixture(&fixtures, name, &data);
    }
    let config = temp_config(dir.path(), None);

    let output = xml_verdict(&[
        "--test",
        "-c",
        config.to_str().unwrap(),
        data.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("SYNTAX  "), "stdout was: {stdout}");
    assert!(stdout.contains("SCHEMA  "), "stdout was: {stdout}");
    assert!(stdout.contains("Total files: 4"));
    assert!(stdout.contains("Passing: 1"));
    assert!(stdout.contains("    SYNTAX: 2"));

    let log = fs::read_to_string(dir.path().join("test.log")).unwrap();
    assert!(log.starts_with("=== xml-verdict run "));
    assert!(log.contains("| failures: 3 ==="));
    assert!(log.contains("[SCHEMA] "));
    assert!(log.contains("mislabelled.xml"));
    assert!(log.trim_end().ends_with("=== end of run ==="));
}

#[test]
fn test_cli_json_output() {
    let fixtures = TestFixtures::new();
    let dir = temp_dir();
    copy_fixture(&fixtures, "valid.xml", dir.path());
    copy_fixture(&fixtures, "schema-invalid.xml", dir.path());
    let config = temp_config(dir.path(), None);

    let output = xml_verdict(&[
        "-t",
        "-c",
        config.to_str().unwrap(),
        "-f",
        "json",
        dir.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total_files"], 2);
    assert_eq!(json["by_severity"]["PASSING"], 1);
    assert_eq!(json["by_severity"]["SCHEMA"], 1);
}

#[test]
fn test_cli_all_passing_exits_zero() {
    let fixtures = TestFixtures::new();
    let dir = temp_dir();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    copy_fixture(&fixtures, "valid.xml", dir.path());
    // Only reached with --recursive
    copy_fixture(&fixtures, "malformed.xml", &nested);
    let config = temp_config(dir.path(), Some("catalog"));

    let output = xml_verdict(&[
        "-t",
        "-c",
        config.to_str().unwrap(),
        dir.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let output = xml_verdict(&[
        "-t",
        "-r",
        "-c",
        config.to_str().unwrap(),
        dir.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
}
