// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use cq_core::{
    Action, ActionId, ActionPayload, ConnectivityMonitor, MemoryStore, Medication, NewPatient,
    PatientUpdate, Prescription, Sex,
};

use super::engine::{EngineConfig, EngineEvent, SyncEngine};
use super::executor_tests::MockExecutor;

pub type TestEngine = SyncEngine<MockExecutor, Arc<MemoryStore>>;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn new_patient() -> NewPatient {
    NewPatient {
        first_name: "Ada".into(),
        last_name: "Okafor".into(),
        date_of_birth: date("1984-03-12"),
        sex: Some(Sex::Female),
        phone: None,
        address: None,
    }
}

/// A create-patient action with a fixed id and patient id.
pub fn create_patient(id: &str, patient: &str) -> Action {
    let mut action = Action::new(patient.into(), ActionPayload::CreatePatient(new_patient()));
    action.id = ActionId::from(id);
    action
}

/// A create-prescription action with a fixed id.
pub fn prescription_for(id: &str, patient: &str) -> Action {
    let mut action = Action::new(
        patient.into(),
        ActionPayload::CreatePrescription(Prescription {
            medications: vec![Medication {
                name: "Amoxicillin".into(),
                dosage: "500mg".into(),
                frequency: "3x daily".into(),
                duration: Some("7 days".into()),
            }],
            diagnosis: None,
            notes: None,
        }),
    );
    action.id = ActionId::from(id);
    action
}

/// An update-patient action with a fixed id.
pub fn update_for(id: &str, patient: &str) -> Action {
    let mut action = Action::new(
        patient.into(),
        ActionPayload::UpdatePatient(PatientUpdate {
            phone: Some("+254700000000".into()),
            ..PatientUpdate::default()
        }),
    );
    action.id = ActionId::from(id);
    action
}

/// Ids of the given actions, for comparing queue contents.
pub fn ids(actions: &[Action]) -> Vec<String> {
    actions.iter().map(|action| action.id.to_string()).collect()
}

/// Everything a test needs to drive an engine.
pub struct Harness {
    pub engine: TestEngine,
    pub executor: MockExecutor,
    pub store: Arc<MemoryStore>,
    pub monitor: Arc<ConnectivityMonitor>,
}

impl Harness {
    /// Engine with a 1ms throttle, not yet initialized.
    pub fn new(online: bool) -> Self {
        Self::with_store(online, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(online: bool, store: Arc<MemoryStore>) -> Self {
        let executor = MockExecutor::new();
        let monitor = Arc::new(ConnectivityMonitor::with_state(online));
        let engine = SyncEngine::new(
            executor.clone(),
            Arc::clone(&store),
            Arc::clone(&monitor),
            EngineConfig {
                throttle: Duration::from_millis(1),
            },
        );
        Harness {
            engine,
            executor,
            store,
            monitor,
        }
    }

    /// Initialized engine.
    pub fn started(online: bool) -> Self {
        let harness = Self::new(online);
        harness.engine.initialize().unwrap();
        harness
    }

    /// Waits for the engine to settle, failing the test after a few seconds.
    pub async fn settle(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.engine.settled())
            .await
            .expect("engine did not settle");
    }

    /// Records every event the engine emits from now on.
    pub fn record_events(&self) -> Arc<Mutex<Vec<EngineEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        self.engine
            .subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    /// Polls until `condition` holds, failing the test after a few seconds.
    pub async fn wait_until(&self, condition: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(self) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition never held");
    }
}
