// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;
use common::*;

#[test]
fn patient_gets_provisional_id() {
    let temp = init_temp();

    cq().args([
        "patient",
        "--first-name",
        "Ada",
        "--last-name",
        "Okafor",
        "--dob",
        "1984-03-12",
        "--sex",
        "f",
    ])
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Queued create_patient"))
    .stdout(predicate::str::contains("tmp-"));
}

#[test]
fn actions_for_new_patient_queue_offline_in_order() {
    let temp = init_temp();
    let patient = register_patient(&temp, "Ada");
    let rx = prescribe(&temp, &patient);

    let cert = cq_json(
        &temp,
        &[
            "certify",
            &patient,
            "--purpose",
            "employment",
            "--fit",
            "--from",
            "2026-10-01",
            "--until",
            "2027-01-31",
            "--after",
            &rx,
        ],
    );
    assert_eq!(cert["kind"], "create_fitness_certificate");
    assert_eq!(cert["payload"]["valid_from"], "2026-10-01");
    assert_eq!(cert["depends_on"], rx.as_str());

    let list = cq_json(&temp, &["list", "--patient", &patient]);
    let kinds: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        [
            "create_patient",
            "create_prescription",
            "create_fitness_certificate"
        ]
    );
}

#[test]
fn prescription_carries_every_medication() {
    let temp = init_temp();

    let action = cq_json(
        &temp,
        &[
            "prescribe",
            "p-1029",
            "--med",
            "amoxicillin:500mg:3x daily:7 days",
            "--med",
            "ibuprofen:400mg:as needed",
            "--diagnosis",
            "otitis media",
        ],
    );
    let meds = action["payload"]["medications"].as_array().unwrap();
    assert_eq!(meds.len(), 2);
    assert_eq!(meds[0]["duration"], "7 days");
    assert_eq!(action["payload"]["diagnosis"], "otitis media");
}

#[test]
fn prescribe_rejects_bad_medication() {
    let temp = init_temp();

    cq().args(["prescribe", "p1", "--med", "ibuprofen"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("name:dosage:frequency"));

    assert!(queued_ids(&temp).is_empty());
}

#[test]
fn certify_needs_a_verdict() {
    let temp = init_temp();

    cq().args(["certify", "p1", "--purpose", "sports"])
        .current_dir(temp.path())
        .assert()
        .failure();

    cq().args(["certify", "p1", "--purpose", "sports", "--fit", "--unfit"])
        .current_dir(temp.path())
        .assert()
        .failure();
}

#[test]
fn certify_rejects_inverted_validity() {
    let temp = init_temp();

    cq().args([
        "certify",
        "p1",
        "--purpose",
        "sports",
        "--unfit",
        "--from",
        "2026-10-01",
        "--until",
        "2026-09-01",
    ])
    .current_dir(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("expires before it becomes valid"));
}

#[test]
fn update_needs_a_change() {
    let temp = init_temp();

    cq().args(["update", "p1", "--phone", " "])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("changes nothing"));

    cq().args(["update", "p1", "--phone", "+44 20 7946 0000"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued update_patient"));
}

#[test]
fn queue_survives_between_runs() {
    let temp = init_temp();
    let first = prescribe(&temp, "p1");
    let second = prescribe(&temp, "p2");

    assert_eq!(queued_ids(&temp), [first, second]);
    assert!(temp.path().join(".carequeue/offline_action_queue.json").exists());
}

#[test]
fn list_text_output() {
    let temp = init_temp();

    cq().arg("list")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout("No queued actions\n");

    let id = prescribe(&temp, "p1");
    cq().arg("list")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(id))
        .stdout(predicate::str::contains("create_prescription"));
}
