// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline queue synchronization with the clinic backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐     ┌─────────────┐
//! │   Engine    │────►│ RemoteExecutor │────►│   Backend   │
//! │ (SyncEngine)│◄────│    (trait)     │◄────│   (HTTP)    │
//! └─────────────┘     └────────────────┘     └─────────────┘
//!    │       ▲
//!    ▼       │ online / offline
//! ┌───────┐ ┌───────────────────┐
//! │ Store │ │ ReachabilityProbe │
//! └───────┘ └───────────────────┘
//! ```
//!
//! # Features
//!
//! - Durable FIFO queue, rewritten whole on every change
//! - Per-patient ordering with independent progress across patients
//! - Idempotency key (the action id) on every delivery attempt
//! - Stalled patients retried on reconnect
//! - Injectable executor trait for testing

mod engine;
mod executor;
mod probe;

pub use engine::{EngineConfig, EngineEvent, PassOutcome, SyncEngine};
pub use executor::{
    check_response_body, ExecutorError, ExecutorResult, HttpExecutor, RemoteExecutor,
    RemoteRequest, IDEMPOTENCY_HEADER,
};
pub use probe::ReachabilityProbe;

#[cfg(test)]
mod test_helpers;



#[cfg(test)]
mod probe_tests;
