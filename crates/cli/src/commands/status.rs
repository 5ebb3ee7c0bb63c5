// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use serde::Serialize;

use super::Workspace;
use crate::cli::OutputFormat;
use crate::error::Result;

/// What `cq status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    /// Queued actions per patient id.
    pub patients: BTreeMap<String, usize>,
    pub backend: String,
    pub reachable: bool,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let workspace = Workspace::open()?;
    let reachable = probe_backend(&workspace)?;
    let status = collect(&workspace, reachable)?;
    println!("{}", render(&status, output)?);
    Ok(())
}

/// One reachability probe of the configured backend.
pub fn probe_backend(workspace: &Workspace) -> Result<bool> {
    let probe = workspace.probe()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(probe.probe_once()).is_online())
}

pub fn collect(workspace: &Workspace, reachable: bool) -> Result<QueueStatus> {
    let actions = workspace.with_offline_engine(|engine| Ok(engine.snapshot()))?;
    let mut patients = BTreeMap::new();
    for action in &actions {
        *patients
            .entry(action.patient_id.to_string())
            .or_insert(0) += 1;
    }
    Ok(QueueStatus {
        queued: actions.len(),
        patients,
        backend: workspace.config.backend.url.clone(),
        reachable,
    })
}

pub fn render(status: &QueueStatus, output: OutputFormat) -> Result<String> {
    if output == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(status)?);
    }
    let reachability = if status.reachable {
        "reachable"
    } else {
        "unreachable"
    };
    let mut lines = vec![
        format!("Backend: {} ({})", status.backend, reachability),
        match status.queued {
            0 => "Queue: empty".to_string(),
            1 => "Queue: 1 action".to_string(),
            n => format!("Queue: {} actions", n),
        },
    ];
    for (patient, count) in &status.patients {
        lines.push(format!("  {:<16}  {}", patient, count));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
