// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;

#[test]
fn test_queued_actions_in_send_order() {
    let ctx = TestContext::new();
    ctx.queue_prescription("a1", "p1");
    ctx.queue_prescription("a2", "p2");
    ctx.queue_prescription("a3", "p1");

    let all = queued_actions(&ctx.workspace, None).unwrap();
    let ids: Vec<_> = all.iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, ["a1", "a2", "a3"]);

    let p1 = queued_actions(&ctx.workspace, Some("p1")).unwrap();
    let ids: Vec<_> = p1.iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, ["a1", "a3"]);
}

#[test]
fn test_listing_does_not_need_the_writer_lock() {
    let ctx = TestContext::new();
    ctx.queue_prescription("a1", "p1");
    let _held = ctx.workspace.lock_queue().unwrap();

    assert_eq!(queued_actions(&ctx.workspace, None).unwrap().len(), 1);
}

#[test]
fn test_render_empty_queue() {
    assert_eq!(render(&[], OutputFormat::Text).unwrap(), "No queued actions");
    assert_eq!(render(&[], OutputFormat::Json).unwrap(), "[]");
}

#[test]
fn test_render_text_one_line_per_action() {
    let ctx = TestContext::new();
    let first = ctx.queue_prescription("a1", "p1");
    let second = ctx.queue_prescription("a2", "p1").after(first.id.clone());

    let text = render(&[first, second], OutputFormat::Text).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a1  create_prescription"));
    assert!(lines[1].ends_with("after a1"));
}
