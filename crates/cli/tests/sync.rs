// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;
use common::*;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// Minimal backend answering every request with `status`. Records the
/// request line and idempotency header of each request.
struct FakeBackend {
    url: String,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeBackend {
    fn start(status: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, status, &log));
            }
        });
        FakeBackend { url, seen }
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

fn handle(mut stream: TcpStream, status: &str, log: &Mutex<Vec<(String, String)>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        match stream.read(&mut chunk) {
            // Reachability probes connect and hang up.
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let header = |name: &str| {
        head.lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case(name).then(|| value.trim().to_string())
            })
            .unwrap_or_default()
    };
    let length: usize = header("content-length").parse().unwrap_or(0);
    while buf.len() < head_end + length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request_line = head.lines().next().unwrap_or_default().to_string();
    log.lock()
        .unwrap()
        .push((request_line, header("idempotency-key")));

    let body = r#"{"success":true}"#;
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

#[test]
fn sync_with_unreachable_backend_keeps_queue() {
    let temp = init_temp();
    let id = prescribe(&temp, "p1");

    cq().args(["sync", "--timeout", "20"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is unreachable"))
        .stdout(predicate::str::contains("1 action still queued"));

    assert_eq!(queued_ids(&temp), [id]);
}

#[test]
fn sync_delivers_in_order_with_idempotency_keys() {
    let backend = FakeBackend::start("200 OK");
    let temp = init_temp_with_backend(&backend.url);
    let patient = register_patient(&temp, "Ada");
    let rx = prescribe(&temp, &patient);
    let before = queued_ids(&temp);

    cq().args(["sync", "--timeout", "30"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Sent 2 actions, failed 0"))
        .stdout(predicate::str::contains("Queue is empty"));

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].0.starts_with("POST /functions/v1/create-patient "));
    assert!(requests[1].0.starts_with("POST /functions/v1/create-prescription "));
    let keys: Vec<_> = requests.into_iter().map(|(_, key)| key).collect();
    assert_eq!(keys, before);
    assert_eq!(keys[1], rx);
    assert!(queued_ids(&temp).is_empty());
}

#[test]
fn sync_keeps_rejected_actions() {
    let backend = FakeBackend::start("500 Internal Server Error");
    let temp = init_temp_with_backend(&backend.url);
    let first = prescribe(&temp, "p1");
    let second = prescribe(&temp, "p1");

    cq().args(["sync", "--timeout", "30"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 actions still queued"))
        .stdout(predicate::str::contains("Held back after a failure: p1"));

    // The failed head holds back the rest of that patient's work.
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(queued_ids(&temp), [first, second]);
}

#[test]
fn sync_refuses_while_another_holds_the_queue() {
    use fs2::FileExt;

    let temp = init_temp();
    let lock = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(temp.path().join(".carequeue/queue.lock"))
        .unwrap();
    lock.try_lock_exclusive().unwrap();

    cq().arg("sync")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked by another cq process"));
}
