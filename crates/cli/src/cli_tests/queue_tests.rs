// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::*;
use clap::Parser;

#[test]
fn parse_list_for_patient() {
    let cli = Cli::try_parse_from(["cq", "list", "-p", "p-1", "-o", "json"]).unwrap();
    match cli.command {
        Command::List { patient, output } => {
            assert_eq!(patient.as_deref(), Some("p-1"));
            assert_eq!(output.output, OutputFormat::Json);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn parse_list_defaults_to_text() {
    let cli = Cli::try_parse_from(["cq", "list"]).unwrap();
    match cli.command {
        Command::List { patient, output } => {
            assert_eq!(patient, None);
            assert_eq!(output.output, OutputFormat::Text);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn parse_sync_options() {
    let cli = Cli::try_parse_from(["cq", "sync", "--timeout", "30", "--log-file", "sync.log"])
        .unwrap();
    match cli.command {
        Command::Sync {
            timeout,
            watch,
            log_file,
        } => {
            assert_eq!(timeout, Some(30));
            assert!(!watch);
            assert_eq!(log_file, Some(std::path::PathBuf::from("sync.log")));
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn parse_sync_watch_conflicts_with_timeout() {
    assert!(Cli::try_parse_from(["cq", "sync", "--watch", "--timeout", "5"]).is_err());
}

#[test]
fn parse_clear_confirmation() {
    let cli = Cli::try_parse_from(["cq", "clear", "--yes"]).unwrap();
    assert!(matches!(cli.command, Command::Clear { yes: true }));

    let cli = Cli::try_parse_from(["cq", "clear"]).unwrap();
    assert!(matches!(cli.command, Command::Clear { yes: false }));
}

#[test]
fn parse_discard_requires_id() {
    assert!(Cli::try_parse_from(["cq", "discard"]).is_err());
    let cli = Cli::try_parse_from(["cq", "discard", "a-1"]).unwrap();
    assert!(matches!(cli.command, Command::Discard { id } if id == "a-1"));
}
