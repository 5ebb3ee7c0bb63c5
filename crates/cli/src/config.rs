// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration management.
//!
//! Configuration is stored in `.carequeue/config.toml` and includes:
//! - `backend`: where queued actions are sent, and how to authenticate
//! - `sync`: pacing of the sync loop and of the reachability probe
//!
//! The queue file and the writer lock live in the same directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cq_core::ActionKind;

use crate::error::{Error, Result};

const WORK_DIR_NAME: &str = ".carequeue";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOCK_FILE_NAME: &str = "queue.lock";
const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Default backend for a fresh project (a local development server).
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";

/// Project configuration stored in `.carequeue/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL that relative endpoint paths are joined to.
    #[serde(default = "default_url")]
    pub url: String,
    /// Environment variable holding the bearer token. The token itself is
    /// never written to disk.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Endpoint path (or absolute URL) per action kind. An empty string leaves
/// the kind unrouted; such actions fail and stay queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_create_patient")]
    pub create_patient: String,
    #[serde(default = "default_create_prescription")]
    pub create_prescription: String,
    #[serde(default = "default_create_fitness_certificate")]
    pub create_fitness_certificate: String,
    #[serde(default = "default_update_patient")]
    pub update_patient: String,
}

/// Sync loop and probe pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between consecutive passes in milliseconds (default: 1000).
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// How often the backend's reachability is probed (default: 5000).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Max time to wait for one probe connection (default: 2000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Consecutive failed probes before reporting offline (default: 2).
    #[serde(default = "default_probe_failure_threshold")]
    pub probe_failure_threshold: u32,
}

fn default_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_token_env() -> String {
    "CAREQUEUE_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_create_patient() -> String {
    "/functions/v1/create-patient".to_string()
}

fn default_create_prescription() -> String {
    "/functions/v1/create-prescription".to_string()
}

fn default_create_fitness_certificate() -> String {
    "/functions/v1/certificates".to_string()
}

fn default_update_patient() -> String {
    "/functions/v1/update-patient".to_string()
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe_failure_threshold() -> u32 {
    2
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: default_url(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            create_patient: default_create_patient(),
            create_prescription: default_create_prescription(),
            create_fitness_certificate: default_create_fitness_certificate(),
            update_patient: default_update_patient(),
        }
    }
}

impl Endpoints {
    /// Configured routes, without the kinds left empty.
    pub fn routes(&self) -> HashMap<ActionKind, String> {
        [
            (ActionKind::CreatePatient, &self.create_patient),
            (ActionKind::CreatePrescription, &self.create_prescription),
            (
                ActionKind::CreateFitnessCertificate,
                &self.create_fitness_certificate,
            ),
            (ActionKind::UpdatePatient, &self.update_patient),
        ]
        .into_iter()
        .filter(|(_, path)| !path.trim().is_empty())
        .map(|(kind, path)| (kind, path.clone()))
        .collect()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            throttle_ms: default_throttle_ms(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_failure_threshold: default_probe_failure_threshold(),
        }
    }
}

impl SyncConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Config {
    /// Creates a config pointing at the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is not a valid http(s) URL.
    pub fn new(backend_url: &str) -> Result<Self> {
        let config = Config {
            backend: BackendConfig {
                url: backend_url.trim_end_matches('/').to_string(),
                ..BackendConfig::default()
            },
            sync: SyncConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the given `.carequeue/` directory.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given `.carequeue/` directory.
    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let config_path = work_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Checks the values that cannot be fixed up at use time.
    pub fn validate(&self) -> Result<()> {
        self.backend_url()?;
        if self.backend.request_timeout_secs == 0 {
            return Err(Error::Config(
                "backend.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.probe_timeout_ms == 0 {
            return Err(Error::Config(
                "sync.probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The backend base URL, parsed.
    pub fn backend_url(&self) -> Result<reqwest::Url> {
        let url = reqwest::Url::parse(&self.backend.url).map_err(|e| {
            Error::Config(format!("invalid backend url '{}': {}", self.backend.url, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config(format!(
                "invalid backend url '{}': scheme must be http or https, not {}",
                self.backend.url, other
            ))),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    /// The bearer token from the configured environment variable, if set.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.backend.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Find the .carequeue directory by walking up from the current directory
pub fn find_work_dir() -> Result<PathBuf> {
    find_work_dir_from(&std::env::current_dir()?)
}

/// Find the .carequeue directory by walking up from `start`
pub fn find_work_dir_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let work_dir = current.join(WORK_DIR_NAME);
        if work_dir.is_dir() {
            return Ok(work_dir);
        }
        if !current.pop() {
            return Err(Error::NotInitialized);
        }
    }
}

/// Path of the advisory lock serializing queue writers.
pub fn queue_lock_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOCK_FILE_NAME)
}

/// Initialize a new .carequeue directory at the given path
pub fn init_work_dir(path: &Path, backend_url: Option<&str>) -> Result<PathBuf> {
    let work_dir = path.join(WORK_DIR_NAME);

    if work_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(Error::AlreadyInitialized(work_dir.display().to_string()));
    }

    let config = Config::new(backend_url.unwrap_or(DEFAULT_BACKEND_URL))?;
    fs::create_dir_all(&work_dir)?;
    config.save(&work_dir)?;
    write_gitignore(&work_dir)?;

    Ok(work_dir)
}

/// Write a .gitignore file to the work directory.
///
/// Queued patient data and runtime files never belong in version control.
pub fn write_gitignore(work_dir: &Path) -> Result<()> {
    let gitignore_path = work_dir.join(GITIGNORE_FILE_NAME);
    let content = "# Queued actions (patient data)\n*.json\n*.json.tmp\n*.json.corrupt\n\n# Runtime state\nqueue.lock\n*.log\n";
    fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
