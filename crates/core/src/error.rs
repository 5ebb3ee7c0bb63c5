// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cq-core operations.

use thiserror::Error;

/// All possible errors that can occur in cq-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid action kind: '{0}'\n  hint: valid kinds are: create_patient, create_prescription, create_fitness_certificate, update_patient")]
    InvalidActionKind(String),

    #[error("invalid sex: '{0}'\n  hint: valid values are: female, male, other")]
    InvalidSex(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for cq-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
