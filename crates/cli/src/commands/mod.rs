// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod clear;
pub mod discard;
pub mod enqueue;
pub mod init;
pub mod list;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use cq_core::{ConnectivityMonitor, JsonFileStore};
use fs2::FileExt;

use crate::config::{find_work_dir, queue_lock_path, Config};
use crate::error::{Error, Result};
use crate::sync::{EngineConfig, HttpExecutor, ReachabilityProbe, SyncEngine};

/// The engine as the CLI runs it: HTTP to the backend, queue in `.carequeue/`.
pub type LocalEngine = SyncEngine<HttpExecutor, JsonFileStore>;

/// An initialized `.carequeue/` directory and its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub work_dir: PathBuf,
    pub config: Config,
}

/// Exclusive hold on the queue file. Released on drop.
#[derive(Debug)]
pub struct QueueLock {
    _file: File,
}

impl Workspace {
    /// Finds the workspace from the current directory.
    pub fn open() -> Result<Self> {
        Self::at(find_work_dir()?)
    }

    pub fn at(work_dir: PathBuf) -> Result<Self> {
        let config = Config::load(&work_dir)?;
        Ok(Workspace { work_dir, config })
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::in_dir(&self.work_dir)
    }

    pub fn executor(&self) -> Result<HttpExecutor> {
        HttpExecutor::new(
            &self.config.backend.url,
            self.config.backend.endpoints.routes(),
            self.config.token(),
            self.config.request_timeout(),
        )
        .map_err(|e| Error::Http(e.to_string()))
    }

    pub fn probe(&self) -> Result<ReachabilityProbe> {
        let sync = &self.config.sync;
        ReachabilityProbe::for_url(
            &self.config.backend_url()?,
            sync.probe_interval(),
            sync.probe_timeout(),
            sync.probe_failure_threshold,
        )
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            throttle: self.config.sync.throttle(),
        }
    }

    /// Takes the writer lock, failing right away if another process holds it.
    pub fn lock_queue(&self) -> Result<QueueLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(queue_lock_path(&self.work_dir))?;
        file.try_lock_exclusive().map_err(|_| Error::QueueBusy)?;
        Ok(QueueLock { _file: file })
    }

    /// Runs `f` against an engine that never sees the backend as reachable,
    /// so changes are persisted but nothing is sent.
    pub fn with_offline_engine<T>(&self, f: impl FnOnce(&LocalEngine) -> Result<T>) -> Result<T> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let _guard = runtime.enter();
        let monitor = Arc::new(ConnectivityMonitor::with_state(false));
        let engine = SyncEngine::new(self.executor()?, self.store(), monitor, self.engine_config());
        engine.initialize()?;
        let result = f(&engine);
        engine.shutdown();
        result
    }
}
