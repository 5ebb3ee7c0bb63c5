// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Backend reachability probing for the connectivity monitor.
//!
//! A background task periodically opens a TCP connection to the backend and
//! feeds the result to a [`ConnectivityMonitor`]. A single success reports
//! online; offline is only reported after several consecutive failures, so
//! one dropped packet does not flap the engine.

use std::sync::Arc;
use std::time::Duration;

use cq_core::{ConnectivityMonitor, NetworkState};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Periodic TCP reachability check against one `host:port`.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    target: String,
    interval: Duration,
    timeout: Duration,
    failure_threshold: u32,
}

impl ReachabilityProbe {
    pub fn new(
        target: impl Into<String>,
        interval: Duration,
        timeout: Duration,
        failure_threshold: u32,
    ) -> Self {
        ReachabilityProbe {
            target: target.into(),
            interval,
            timeout,
            failure_threshold,
        }
    }

    /// Probes the host and port of a backend URL (scheme default port if none).
    pub fn for_url(
        url: &Url,
        interval: Duration,
        timeout: Duration,
        failure_threshold: u32,
    ) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("backend url has no host: {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("backend url has no port: {}", url)))?;
        Ok(Self::new(
            format!("{}:{}", host, port),
            interval,
            timeout,
            failure_threshold,
        ))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Tries one connection. A link is assumed; only the backend's
    /// reachability is in question.
    pub async fn probe_once(&self) -> NetworkState {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => NetworkState::reachable(),
            Ok(Err(e)) => {
                debug!("probe of {} failed: {}", self.target, e);
                NetworkState::unreachable()
            }
            Err(_) => {
                debug!("probe of {} timed out after {:?}", self.target, self.timeout);
                NetworkState::unreachable()
            }
        }
    }

    /// Runs the probe until `cancel` fires, reporting into `monitor`.
    pub fn spawn(
        self,
        monitor: Arc<ConnectivityMonitor>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut debounce = Debounce::new(self.failure_threshold);
            loop {
                let state = tokio::select! {
                    _ = cancel.cancelled() => break,
                    state = self.probe_once() => state,
                };
                if let Some(report) = debounce.record(state) {
                    monitor.observe(report);
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            debug!("reachability probe for {} stopped", self.target);
        })
    }
}

/// Holds back failures until `threshold` of them arrive in a row.
#[derive(Debug)]
pub(crate) struct Debounce {
    threshold: u32,
    failures: u32,
}

impl Debounce {
    pub(crate) fn new(threshold: u32) -> Self {
        Debounce {
            threshold: threshold.max(1),
            failures: 0,
        }
    }

    /// Returns the state to report, if any.
    pub(crate) fn record(&mut self, state: NetworkState) -> Option<NetworkState> {
        if state.is_online() {
            self.failures = 0;
            return Some(state);
        }
        self.failures = self.failures.saturating_add(1);
        (self.failures >= self.threshold).then_some(state)
    }
}
