// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote execution of queued actions.
//!
//! Provides a trait-based executor so the engine can run against:
//! - the real backend over HTTP ([`HttpExecutor`])
//! - mock executors in unit tests
//!
//! Every request carries the action id as its idempotency key, on every
//! attempt, so redelivery after a failure is safe to de-duplicate server-side.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cq_core::{Action, ActionId, ActionKind, ActionPayload};
use serde_json::{json, Value};

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Error type for remote execution. Every variant leaves the action queued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend rejected our credentials.
    #[error("not authorized to call the backend")]
    Unauthorized,

    /// Transport succeeded but the body reports the operation failed.
    #[error("backend reported failure: {0}")]
    LogicalFailure(String),

    /// No route is configured for this kind of action.
    #[error("no endpoint configured for {0}")]
    UnsupportedKind(ActionKind),

    /// The payload could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Result type for remote execution.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// A request to the backend, routed by kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub kind: ActionKind,
    pub idempotency_key: ActionId,
    pub body: Value,
}

impl RemoteRequest {
    /// Builds the request body the backend expects for this action.
    pub fn from_action(action: &Action) -> ExecutorResult<Self> {
        let encode = |e: serde_json::Error| ExecutorError::Encode(e.to_string());
        let patient_id = action.patient_id.as_str();

        let body = match &action.payload {
            ActionPayload::CreatePatient(patient) => {
                let mut body = serde_json::to_value(patient).map_err(encode)?;
                if let Value::Object(ref mut fields) = body {
                    fields.insert("client_patient_id".into(), json!(patient_id));
                }
                body
            }
            ActionPayload::CreatePrescription(prescription) => {
                let mut body = serde_json::to_value(prescription).map_err(encode)?;
                if let Value::Object(ref mut fields) = body {
                    fields.insert("patient_id".into(), json!(patient_id));
                }
                body
            }
            ActionPayload::CreateFitnessCertificate(certificate) => json!({
                "action": "create_certificate",
                "patient_id": patient_id,
                "data": serde_json::to_value(certificate).map_err(encode)?,
            }),
            ActionPayload::UpdatePatient(update) => json!({
                "patient_id": patient_id,
                "changes": serde_json::to_value(update).map_err(encode)?,
            }),
        };

        Ok(RemoteRequest {
            kind: action.kind(),
            idempotency_key: action.id.clone(),
            body,
        })
    }
}

/// Executes requests against the backend.
///
/// This trait abstracts over the actual backend so the engine can be tested
/// with mock implementations.
pub trait RemoteExecutor: Send + Sync {
    /// Executes one request. `Ok` means the backend applied it.
    fn execute(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = ExecutorResult<()>> + Send + '_>>;
}

impl<X: RemoteExecutor + ?Sized> RemoteExecutor for Arc<X> {
    fn execute(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = ExecutorResult<()>> + Send + '_>> {
        (**self).execute(request)
    }
}

/// Applies the logical-failure rule to a 2xx response body.
///
/// Only a JSON object with `"success": false` is a failure; an empty or
/// non-JSON body counts as success.
pub fn check_response_body(body: &str) -> ExecutorResult<()> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Ok(());
    };
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no reason given");
        return Err(ExecutorError::LogicalFailure(message.to_string()));
    }
    Ok(())
}

/// HTTP executor: POSTs each request as JSON to the endpoint for its kind.
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
    endpoints: HashMap<ActionKind, String>,
    token: Option<String>,
}

impl HttpExecutor {
    /// Creates an executor for `base_url` with per-kind endpoint paths.
    pub fn new(
        base_url: &str,
        endpoints: HashMap<ActionKind, String>,
        token: Option<String>,
        timeout: Duration,
    ) -> ExecutorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        Ok(HttpExecutor {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
            token,
        })
    }

    /// Full URL for a kind, if one is configured.
    pub fn endpoint_url(&self, kind: ActionKind) -> Option<String> {
        self.endpoints.get(&kind).map(|path| {
            if path.starts_with("http://") || path.starts_with("https://") {
                path.clone()
            } else {
                format!("{}/{}", self.base_url, path.trim_start_matches('/'))
            }
        })
    }
}

impl RemoteExecutor for HttpExecutor {
    fn execute(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = ExecutorResult<()>> + Send + '_>> {
        Box::pin(async move {
            let url = self
                .endpoint_url(request.kind)
                .ok_or(ExecutorError::UnsupportedKind(request.kind))?;

            let mut builder = self
                .client
                .post(&url)
                .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
                .json(&request.body);
            if let Some(token) = &self.token {
                builder = builder.bearer_auth(token);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ExecutorError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ExecutorError::Transport(e.to_string()))?;

            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(ExecutorError::Unauthorized);
            }
            if !status.is_success() {
                return Err(ExecutorError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            check_response_body(&body)
        })
    }
}
