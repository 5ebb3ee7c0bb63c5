// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cq_core::{Action, PatientId};

use super::Workspace;
use crate::cli::OutputFormat;
use crate::error::Result;

pub fn run(patient: Option<String>, output: OutputFormat) -> Result<()> {
    let workspace = Workspace::open()?;
    let actions = queued_actions(&workspace, patient.as_deref())?;
    println!("{}", render(&actions, output)?);
    Ok(())
}

/// Queued actions in send order, optionally for one patient.
pub fn queued_actions(workspace: &Workspace, patient: Option<&str>) -> Result<Vec<Action>> {
    workspace.with_offline_engine(|engine| {
        Ok(match patient {
            Some(patient) => engine.pending_actions_for(&PatientId::from(patient)),
            None => engine.snapshot(),
        })
    })
}

pub fn render(actions: &[Action], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(actions)?),
        OutputFormat::Text if actions.is_empty() => Ok("No queued actions".to_string()),
        OutputFormat::Text => Ok(actions
            .iter()
            .map(format_line)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn format_line(action: &Action) -> String {
    let mut line = format!(
        "{}  {:<26}  {:<16}  {}",
        action.id,
        action.kind().as_str(),
        action.patient_id.as_str(),
        action.created_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(dep) = &action.depends_on {
        line.push_str(&format!("  after {}", dep));
    }
    line
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
