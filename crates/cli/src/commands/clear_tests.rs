// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::list::queued_actions;
use crate::commands::testing::TestContext;
use cq_core::{JsonFileStore, QueueStore};

#[test]
fn test_clear_requires_confirmation() {
    let ctx = TestContext::new();
    ctx.queue_prescription("a1", "p1");
    ctx.queue_prescription("a2", "p2");

    let err = clear(&ctx.workspace, false).unwrap_err();
    assert!(matches!(err, Error::ConfirmationRequired(2)));
    assert_eq!(queued_actions(&ctx.workspace, None).unwrap().len(), 2);
}

#[test]
fn test_clear_confirmed_drops_everything() {
    let ctx = TestContext::new();
    ctx.queue_prescription("a1", "p1");
    ctx.queue_prescription("a2", "p2");

    assert_eq!(clear(&ctx.workspace, true).unwrap(), 2);
    assert!(JsonFileStore::in_dir(&ctx.work_dir()).load().is_empty());
}

#[test]
fn test_clear_empty_queue_needs_no_confirmation() {
    let ctx = TestContext::new();
    assert_eq!(clear(&ctx.workspace, false).unwrap(), 0);
}
