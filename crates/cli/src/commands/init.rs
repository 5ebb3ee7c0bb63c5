// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::config::{init_work_dir, Config};
use crate::error::Result;

pub fn run(backend: Option<String>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = init(&cwd, backend.as_deref())?;
    println!("Initialized queue in {}", cwd.join(".carequeue").display());
    println!("Backend: {}", config.backend.url);
    Ok(())
}

/// Creates `.carequeue/` under `path` and returns the config written there.
pub fn init(path: &Path, backend: Option<&str>) -> Result<Config> {
    let work_dir = init_work_dir(path, backend)?;
    Config::load(&work_dir)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
