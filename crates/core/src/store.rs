// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for the ordered action queue.
//!
//! The queue is persisted as one JSON array under a fixed key and is always
//! rewritten whole; there is no append or partial update. Stores never return
//! errors to the engine: a failed read degrades to an empty queue and a failed
//! write is reported as `false`, both logged.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::action::Action;
use crate::error::Result;

/// Key under which the queue is stored.
pub const QUEUE_STORE_KEY: &str = "offline_action_queue";

/// Load/save/clear contract over the serialized queue.
pub trait QueueStore: Send + Sync {
    /// Returns the stored queue, or an empty one if nothing usable is stored.
    fn load(&self) -> Vec<Action>;

    /// Replaces the stored queue. Returns false if the write failed.
    fn save(&self, actions: &[Action]) -> bool;

    /// Deletes everything stored. Returns false if the delete failed.
    fn clear(&self) -> bool;
}

impl<S: QueueStore + ?Sized> QueueStore for Arc<S> {
    fn load(&self) -> Vec<Action> {
        (**self).load()
    }

    fn save(&self, actions: &[Action]) -> bool {
        (**self).save(actions)
    }

    fn clear(&self) -> bool {
        (**self).clear()
    }
}

/// Queue stored as a JSON file in a directory.
///
/// Writes go to a temp file that is fsynced and renamed over the target, so a
/// crash mid-write leaves the previous queue intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `<dir>/offline_action_queue.json`.
    pub fn in_dir(dir: &Path) -> Self {
        JsonFileStore {
            path: dir.join(format!("{}.json", QUEUE_STORE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable queue file is moved before it is treated as empty.
    pub fn quarantine_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn try_load(&self) -> Result<Option<Vec<Action>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn try_save(&self, actions: &[Action]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(actions)?;
        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn quarantine(&self) {
        let target = self.quarantine_path();
        match fs::rename(&self.path, &target) {
            Ok(()) => tracing::warn!("moved unreadable queue file to {}", target.display()),
            Err(e) => tracing::warn!("failed to move unreadable queue file aside: {}", e),
        }
    }
}

impl QueueStore for JsonFileStore {
    fn load(&self) -> Vec<Action> {
        match self.try_load() {
            Ok(Some(actions)) => actions,
            Ok(None) => Vec::new(),
            Err(crate::Error::Json(e)) => {
                tracing::warn!("queue file {} is corrupt: {}", self.path.display(), e);
                self.quarantine();
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("failed to read queue file {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, actions: &[Action]) -> bool {
        match self.try_save(actions) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to write queue file {}: {}", self.path.display(), e);
                let _ = fs::remove_file(self.temp_path());
                false
            }
        }
    }

    fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                tracing::warn!("failed to delete queue file {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

/// In-process store holding the serialized queue in memory.
///
/// Goes through the same JSON encoding as [`JsonFileStore`]. Saves can be made
/// to fail on demand, and loads and saves are counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds the given queue.
    pub fn with_actions(actions: &[Action]) -> Self {
        let store = Self::new();
        *store.blob() = serde_json::to_string(actions).ok();
        store
    }

    /// A store holding raw bytes, for exercising corrupt input.
    pub fn with_raw(raw: &str) -> Self {
        let store = Self::new();
        *store.blob() = Some(raw.to_string());
        store
    }

    fn blob(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.blob.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Release);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }

    /// What a fresh process would load, without counting as a load.
    pub fn stored(&self) -> Vec<Action> {
        self.blob()
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Vec<Action> {
        self.loads.fetch_add(1, Ordering::AcqRel);
        let blob = self.blob();
        let Some(raw) = blob.as_deref() else {
            return Vec::new();
        };
        match serde_json::from_str(raw) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!("stored queue is corrupt: {}", e);
                Vec::new()
            }
        }
    }

    fn save(&self, actions: &[Action]) -> bool {
        if self.fail_saves.load(Ordering::Acquire) {
            tracing::warn!("failed to write queue: store rejected the write");
            return false;
        }
        match serde_json::to_string(actions) {
            Ok(raw) => {
                *self.blob() = Some(raw);
                self.saves.fetch_add(1, Ordering::AcqRel);
                true
            }
            Err(e) => {
                tracing::warn!("failed to encode queue: {}", e);
                false
            }
        }
    }

    fn clear(&self) -> bool {
        *self.blob() = None;
        true
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
