// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Workspace;
use crate::error::{Error, Result};

pub fn run(yes: bool) -> Result<()> {
    let workspace = Workspace::open()?;
    match clear(&workspace, yes)? {
        0 => println!("Queue is already empty"),
        1 => println!("Dropped 1 queued action"),
        n => println!("Dropped {} queued actions", n),
    }
    Ok(())
}

/// Drops every queued action. Unsent work is only dropped when `confirmed`.
pub fn clear(workspace: &Workspace, confirmed: bool) -> Result<usize> {
    let _lock = workspace.lock_queue()?;
    workspace.with_offline_engine(|engine| {
        let queued = engine.queue_length();
        if queued > 0 && !confirmed {
            return Err(Error::ConfirmationRequired(queued));
        }
        engine.clear()
    })
}

#[cfg(test)]
#[path = "clear_tests.rs"]
mod tests;
