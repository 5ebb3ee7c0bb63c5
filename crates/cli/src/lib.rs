// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! carequeue - offline-first queue of clinical actions.
//!
//! Clinical work (registering patients, prescriptions, fitness certificates,
//! demographic updates) is recorded as actions in a durable local queue and
//! delivered to the clinic backend once it is reachable.
//!
//! # Main Components
//!
//! - [`SyncEngine`] - Owns the queue, sends one action at a time, serializes
//!   work per patient and keeps failed actions for a later retry
//! - [`HttpExecutor`] - Sends an action to its backend endpoint with an
//!   idempotency key
//! - [`ReachabilityProbe`] - Feeds backend reachability into a
//!   [`ConnectivityMonitor`](cq_core::ConnectivityMonitor)
//! - [`Config`] - Backend location, endpoints and sync timing
//! - [`Error`] - Error types for all operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use carequeue::{EngineConfig, HttpExecutor, SyncEngine};
//! use cq_core::{ConnectivityMonitor, JsonFileStore};
//!
//! let monitor = Arc::new(ConnectivityMonitor::new());
//! let engine = SyncEngine::new(executor, JsonFileStore::in_dir(&work_dir), monitor, EngineConfig::default());
//! engine.initialize()?;
//! engine.enqueue(action)?;
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod sync;

pub use cli::{Cli, Command, DemographicsArgs, OutputArgs, OutputFormat};
pub use config::{find_work_dir, init_work_dir, Config};
pub use error::{Error, Result};
pub use sync::{
    EngineConfig, EngineEvent, HttpExecutor, PassOutcome, ReachabilityProbe, RemoteExecutor,
    SyncEngine,
};

use commands::enqueue;
use cq_core::{Action, ActionPayload};

/// Run a CLI command.
pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Init { backend } => commands::init::run(backend),
        Command::Patient {
            first_name,
            last_name,
            dob,
            sex,
            phone,
            address,
            output,
        } => {
            let patient =
                enqueue::new_patient(&first_name, &last_name, &dob, sex.as_deref(), phone, address)?;
            enqueue::run(Action::register_patient(patient), output.output)
        }
        Command::Prescribe {
            patient,
            medications,
            diagnosis,
            notes,
            after,
            output,
        } => {
            let prescription = enqueue::prescription(&medications, diagnosis, notes)?;
            let action = enqueue::for_patient(
                &patient,
                ActionPayload::CreatePrescription(prescription),
                after,
            );
            enqueue::run(action, output.output)
        }
        Command::Certify {
            patient,
            purpose,
            fit,
            unfit: _,
            valid_from,
            valid_until,
            remarks,
            after,
            output,
        } => {
            let certificate = enqueue::certificate(
                &purpose,
                fit,
                valid_from.as_deref(),
                valid_until.as_deref(),
                remarks,
                enqueue::today(),
            )?;
            let action = enqueue::for_patient(
                &patient,
                ActionPayload::CreateFitnessCertificate(certificate),
                after,
            );
            enqueue::run(action, output.output)
        }
        Command::Update {
            patient,
            changes,
            after,
            output,
        } => {
            let action = enqueue::for_patient(
                &patient,
                ActionPayload::UpdatePatient(enqueue::update(changes)),
                after,
            );
            enqueue::run(action, output.output)
        }
        Command::List { patient, output } => commands::list::run(patient, output.output),
        Command::Status { output } => commands::status::run(output.output),
        Command::Sync {
            timeout,
            watch,
            log_file: _,
        } => commands::sync::run(timeout, watch),
        Command::Discard { id } => commands::discard::run(&id),
        Command::Clear { yes } => commands::clear::run(yes),
    }
}
