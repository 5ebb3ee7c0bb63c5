// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the reachability probe.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use cq_core::{ConnectivityMonitor, NetworkState};
use reqwest::Url;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use yare::parameterized;

use super::probe::{Debounce, ReachabilityProbe};

const FAST: Duration = Duration::from_millis(10);
const TIMEOUT: Duration = Duration::from_millis(500);

/// Returns an address nothing is listening on.
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[parameterized(
    https_default = { "https://clinic.example.org/api", "clinic.example.org:443" },
    http_default = { "http://clinic.example.org", "clinic.example.org:80" },
    explicit_port = { "http://localhost:54321/functions/v1", "localhost:54321" },
    ipv4 = { "http://10.0.0.7:8080", "10.0.0.7:8080" },
)]
fn for_url_derives_target(url: &str, expected: &str) {
    let url = Url::parse(url).unwrap();
    let probe = ReachabilityProbe::for_url(&url, FAST, TIMEOUT, 2).unwrap();
    assert_eq!(probe.target(), expected);
}

#[test]
fn for_url_rejects_url_without_host() {
    let url = Url::parse("mailto:ops@clinic.example.org").unwrap();
    assert!(ReachabilityProbe::for_url(&url, FAST, TIMEOUT, 2).is_err());
}

#[test]
fn debounce_reports_online_immediately() {
    let mut debounce = Debounce::new(3);
    assert_eq!(
        debounce.record(NetworkState::reachable()),
        Some(NetworkState::reachable())
    );
}

#[test]
fn debounce_holds_failures_until_threshold() {
    let mut debounce = Debounce::new(3);
    assert_eq!(debounce.record(NetworkState::unreachable()), None);
    assert_eq!(debounce.record(NetworkState::unreachable()), None);
    assert_eq!(
        debounce.record(NetworkState::unreachable()),
        Some(NetworkState::unreachable())
    );
    // Stays reported while the failures continue.
    assert!(debounce.record(NetworkState::unreachable()).is_some());
}

#[test]
fn debounce_success_resets_failure_count() {
    let mut debounce = Debounce::new(2);
    assert_eq!(debounce.record(NetworkState::unreachable()), None);
    debounce.record(NetworkState::reachable());
    assert_eq!(debounce.record(NetworkState::unreachable()), None);
}

#[test]
fn debounce_zero_threshold_behaves_like_one() {
    let mut debounce = Debounce::new(0);
    assert!(debounce.record(NetworkState::unreachable()).is_some());
}

#[tokio::test]
async fn probe_once_reachable_when_listening() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let probe = ReachabilityProbe::new(addr, FAST, TIMEOUT, 1);

    assert_eq!(probe.probe_once().await, NetworkState::reachable());
}

#[tokio::test]
async fn probe_once_unreachable_when_nothing_listens() {
    let probe = ReachabilityProbe::new(closed_port().await, FAST, TIMEOUT, 1);

    let state = probe.probe_once().await;
    assert!(!state.is_online());
    assert_eq!(state.is_internet_reachable, Some(false));
}

#[tokio::test]
async fn spawned_probe_reports_offline_then_stops_on_cancel() {
    let monitor = Arc::new(ConnectivityMonitor::new());
    let cancel = CancellationToken::new();
    let probe = ReachabilityProbe::new(closed_port().await, FAST, TIMEOUT, 2);

    let handle = probe.spawn(Arc::clone(&monitor), cancel.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while monitor.is_connected() {
            tokio::time::sleep(FAST).await;
        }
    })
    .await
    .expect("monitor never went offline");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("probe did not stop")
        .unwrap();
}

#[tokio::test]
async fn spawned_probe_reports_online() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let monitor = Arc::new(ConnectivityMonitor::with_state(false));
    let cancel = CancellationToken::new();

    let probe = ReachabilityProbe::new(addr, FAST, TIMEOUT, 2);

    let handle = probe.spawn(Arc::clone(&monitor), cancel.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !monitor.is_connected() {
            tokio::time::sleep(FAST).await;
        }
    })
    .await
    .expect("monitor never came online");

    cancel.cancel();
    handle.await.unwrap();
}
