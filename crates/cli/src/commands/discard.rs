// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cq_core::{Action, ActionId};

use super::Workspace;
use crate::error::Result;

pub fn run(id: &str) -> Result<()> {
    let workspace = Workspace::open()?;
    let action = discard(&workspace, id)?;
    println!(
        "Discarded {} {} for patient {}",
        action.kind(),
        action.id,
        action.patient_id
    );
    Ok(())
}

/// Removes one action from the stored queue.
pub fn discard(workspace: &Workspace, id: &str) -> Result<Action> {
    let _lock = workspace.lock_queue()?;
    let id = ActionId::from(id.trim());
    workspace.with_offline_engine(|engine| engine.discard(&id))
}

#[cfg(test)]
#[path = "discard_tests.rs"]
mod tests;
