// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the carequeue library.
///
/// Errors provide user-friendly messages with hints for common issues.
/// Backend failures are not here: they never reach the caller, they only
/// keep the action queued.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: run 'cq init' first")]
    NotInitialized,

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("sync engine used before initialize()")]
    EngineNotStarted,

    #[error("sync engine needs a Tokio runtime")]
    NoRuntime,

    #[error("action {0} is already queued\n  hint: action ids are idempotency keys and are never reused")]
    DuplicateAction(String),

    #[error("action not found in queue: {0}")]
    ActionNotFound(String),

    #[error("action {0} is being sent to the backend right now\n  hint: wait for the attempt to finish, then retry")]
    ActionInFlight(String),

    #[error("failed to clear the stored queue")]
    ClearFailed,

    #[error("failed to write the queue file\n  hint: check free space and permissions in .carequeue/")]
    QueueNotSaved,

    #[error("the queue is locked by another cq process\n  hint: a 'cq sync' is probably running; stop it or wait for it to finish")]
    QueueBusy,

    #[error("invalid medication '{0}'\n  hint: use name:dosage:frequency[:duration], e.g. 'amoxicillin:500mg:3x daily:7 days'")]
    InvalidMedication(String),

    #[error("invalid date '{0}'\n  hint: use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("refusing to clear {0} queued actions without --yes")]
    ConfirmationRequired(usize),

    #[error("config error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    Http(String),

    #[error(transparent)]
    Core(#[from] cq_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for carequeue operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
