//! Shared test utilities for integration tests
//!
//! Provides document fixtures and a preconfigured `rmk` command
//! used across the CLI test files.

#![allow(dead_code)]

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use std::process::Command;

/// Three markers with a mapping-friendly layout
pub const THREE_MARKERS: &str = "A [1] B [2] C [3]\n";

/// Mapping that matches [`THREE_MARKERS`]
pub const THREE_MAPPING: &str = r#"{
  "[1]": "Alpha",
  "Alpha": "[1]",
  "[2]": "Beta",
  "Beta": "[2]",
  "[3]": "Gamma",
  "Gamma": "[3]"
}
"#;

/// Temporary project holding `doc.txt` with the given body
pub fn doc_fixture(body: &str) -> assert_fs::TempDir
{
    // Initialize the temporary project root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("doc.txt")
        .write_str(body)
        .expect("write doc");

    tmp
}

/// Same as [`doc_fixture`] plus a `map.json` mapping file
pub fn doc_with_mapping(
    body: &str,
    mapping: &str,
) -> assert_fs::TempDir
{
    let tmp = doc_fixture(body);

    tmp.child("map.json")
        .write_str(mapping)
        .expect("write mapping");

    tmp
}

/// `rmk` running inside `dir`, colors off and logging env cleared
pub fn rmk(dir: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("rmk").expect("rmk binary");
    cmd.current_dir(dir.path())
        .env_remove("REFMARK_LOG")
        .arg("--no-color");
    cmd
}
