// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `cq sync`: run the engine against the real backend until there is
//! nothing left it can do, or until interrupted with `--watch`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cq_core::{ConnectivityMonitor, PatientId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Workspace;
use crate::error::Result;
use crate::sync::{EngineEvent, ReachabilityProbe, RemoteExecutor, SyncEngine};

/// When a sync run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// Once the engine settles, or after the limit.
    Settled(Option<Duration>),
    /// On Ctrl-C.
    Interrupted,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sent: usize,
    pub failed: usize,
    pub remaining: usize,
    pub stalled: Vec<PatientId>,
    pub reachable: bool,
    pub timed_out: bool,
}

pub fn run(timeout: Option<u64>, watch: bool) -> Result<()> {
    let workspace = Workspace::open()?;
    let _lock = workspace.lock_queue()?;
    let executor = workspace.executor()?;
    let probe = workspace.probe()?;
    let until = if watch {
        Until::Interrupted
    } else {
        Until::Settled(timeout.map(Duration::from_secs))
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(sync_with(&workspace, executor, probe, until))?;
    println!("{}", format_report(&report, &workspace.config.backend.url));
    Ok(())
}

/// Drives the engine over the stored queue. The caller holds the writer lock.
pub async fn sync_with<E>(
    workspace: &Workspace,
    executor: E,
    probe: ReachabilityProbe,
    until: Until,
) -> Result<SyncReport>
where
    E: RemoteExecutor + 'static,
{
    // Probe once up front so a reachable backend is known before the
    // engine decides whether it has anything to do.
    let initial = probe.probe_once().await;
    if !initial.is_online() {
        warn!("backend {} is unreachable", probe.target());
    }
    let monitor = Arc::new(ConnectivityMonitor::with_state(initial.is_online()));

    let engine = SyncEngine::new(
        executor,
        workspace.store(),
        Arc::clone(&monitor),
        workspace.engine_config(),
    );
    let sent = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    {
        let sent = Arc::clone(&sent);
        let failed = Arc::clone(&failed);
        engine.subscribe(move |event| match event {
            EngineEvent::Completed(id) => {
                info!("sent {}", id);
                sent.fetch_add(1, Ordering::Relaxed);
            }
            EngineEvent::Retained { id, error } => {
                warn!("{} kept in queue: {}", id, error);
                failed.fetch_add(1, Ordering::Relaxed);
            }
            EngineEvent::PersistFailed => warn!("queue file could not be updated"),
            _ => {}
        });
    }
    engine.initialize()?;

    let cancel = CancellationToken::new();
    let prober = probe.spawn(Arc::clone(&monitor), cancel.clone());

    let mut timed_out = false;
    match until {
        Until::Settled(None) => engine.settled().await,
        Until::Settled(Some(limit)) => {
            timed_out = tokio::time::timeout(limit, engine.settled())
                .await
                .is_err();
        }
        Until::Interrupted => {
            info!("syncing until interrupted");
            tokio::signal::ctrl_c().await?;
            info!("interrupted");
        }
    }

    cancel.cancel();
    engine.shutdown();
    stop_probe(prober).await;

    Ok(SyncReport {
        sent: sent.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        remaining: engine.queue_length(),
        stalled: engine.stalled_patients(),
        reachable: monitor.is_connected(),
        timed_out,
    })
}

/// Waits for the background probe. A panic in it is logged, not propagated.
async fn stop_probe(prober: JoinHandle<()>) -> bool {
    match prober.await {
        Ok(()) => true,
        Err(e) => {
            warn!("reachability probe stopped abnormally: {}", e);
            false
        }
    }
}

pub fn format_report(report: &SyncReport, backend: &str) -> String {
    let mut lines = Vec::new();
    if !report.reachable {
        lines.push(format!("Backend {} is unreachable", backend));
    }
    if report.sent > 0 || report.failed > 0 {
        lines.push(format!(
            "Sent {}, failed {}",
            plural(report.sent, "action"),
            report.failed
        ));
    }
    lines.push(match report.remaining {
        0 => "Queue is empty".to_string(),
        n => format!("{} still queued", plural(n, "action")),
    });
    if !report.stalled.is_empty() {
        let stalled: Vec<_> = report.stalled.iter().map(PatientId::as_str).collect();
        lines.push(format!(
            "Held back after a failure: {} (retried on the next sync)",
            stalled.join(", ")
        ));
    }
    if report.timed_out {
        lines.push("Stopped at the time limit".to_string());
    }
    lines.join("\n")
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
