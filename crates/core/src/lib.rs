// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cq-core: shared library for the carequeue offline action queue.
//!
//! This crate provides the action model, the connectivity monitor and the
//! queue stores used by the sync engine and the `cq` CLI.

pub mod action;
pub mod connectivity;
pub mod error;
pub mod observer;
pub mod status;
pub mod store;

pub use action::{
    Action, ActionId, ActionKind, ActionPayload, FitnessCertificate, Medication, NewPatient,
    PatientId, PatientUpdate, Prescription, Sex,
};
pub use connectivity::{ConnectivityMonitor, NetworkState};
pub use error::{Error, Result};
pub use observer::{Listener, Listeners, SubscriptionId};
pub use status::SyncStatus;
pub use store::{JsonFileStore, MemoryStore, QueueStore, QUEUE_STORE_KEY};
