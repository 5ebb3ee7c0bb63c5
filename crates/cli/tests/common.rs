// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A backend address nothing listens on.
pub const DEAD_BACKEND: &str = "http://127.0.0.1:9";

pub fn cq() -> Command {
    cargo_bin_cmd!("cq")
}

/// Helper to create an initialized temp directory whose backend is down
pub fn init_temp() -> TempDir {
    init_temp_with_backend(DEAD_BACKEND)
}

pub fn init_temp_with_backend(url: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    cq().arg("init")
        .arg("--backend")
        .arg(url)
        .current_dir(temp.path())
        .assert()
        .success();
    temp
}

/// Runs `cq` in `temp` with `args` plus `-o json`, returning the parsed output.
pub fn cq_json(temp: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = cq()
        .args(args)
        .args(["-o", "json"])
        .current_dir(temp.path())
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "cq {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Queues a patient registration and returns its provisional patient id.
pub fn register_patient(temp: &TempDir, first_name: &str) -> String {
    let action = cq_json(
        temp,
        &[
            "patient",
            "--first-name",
            first_name,
            "--last-name",
            "Okafor",
            "--dob",
            "1984-03-12",
        ],
    );
    action["patient_id"].as_str().unwrap().to_string()
}

/// Queues a prescription and returns the action id.
pub fn prescribe(temp: &TempDir, patient: &str) -> String {
    let action = cq_json(
        temp,
        &["prescribe", patient, "--med", "ibuprofen:400mg:as needed"],
    );
    action["id"].as_str().unwrap().to_string()
}

/// Action ids in send order, as `cq list` reports them.
pub fn queued_ids(temp: &TempDir) -> Vec<String> {
    let list = cq_json(temp, &["list"]);
    list.as_array()
        .unwrap()
        .iter()
        .map(|action| action["id"].as_str().unwrap().to_string())
        .collect()
}
