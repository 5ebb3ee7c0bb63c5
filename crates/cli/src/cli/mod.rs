// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

mod args;

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

pub use args::{DemographicsArgs, OutputArgs};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "cq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first queue of clinical actions, synced to the clinic backend")]
#[command(
    long_about = "Offline-first queue of clinical actions, synced to the clinic backend.\n\n\
    Record patients, prescriptions and certificates without a connection; \
    'cq sync' delivers them in order once the backend is reachable."
)]
pub struct Cli {
    /// Run as if cq was started in <path>
    #[arg(short = 'C', long = "directory", global = true, value_name = "path")]
    pub directory: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set up a queue in the current directory
    #[command(after_help = "\
Examples:
  cq init                                       Use the local development backend
  cq init --backend https://clinic.example.org  Use a hosted backend")]
    Init {
        /// Backend base URL
        #[arg(long, value_name = "URL")]
        backend: Option<String>,
    },

    /// Queue registration of a new patient
    #[command(after_help = "\
Examples:
  cq patient --first-name Ada --last-name Okafor --dob 1984-03-12 --sex f")]
    Patient {
        #[arg(long, value_parser = non_empty_string)]
        first_name: String,

        #[arg(long, value_parser = non_empty_string)]
        last_name: String,

        /// Date of birth
        #[arg(long, value_name = "YYYY-MM-DD")]
        dob: String,

        /// female, male or other (f, m, o)
        #[arg(long)]
        sex: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Queue a prescription for a patient
    #[command(after_help = "\
Examples:
  cq prescribe tmp-4f1c --med \"amoxicillin:500mg:3x daily:7 days\"
  cq prescribe p-1029 --med \"ibuprofen:400mg:as needed\" --diagnosis \"sprain\"")]
    Prescribe {
        /// Patient id (real or provisional)
        #[arg(value_parser = non_empty_string)]
        patient: String,

        /// Medication as name:dosage:frequency[:duration] (repeatable)
        #[arg(long = "med", value_name = "MED", required = true)]
        medications: Vec<String>,

        #[arg(long)]
        diagnosis: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Action this one depends on
        #[arg(long, value_name = "ACTION")]
        after: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Queue a fitness certificate for a patient
    #[command(group(ArgGroup::new("verdict").required(true).args(["fit", "unfit"])))]
    #[command(after_help = "\
Examples:
  cq certify p-1029 --purpose employment --fit --until 2027-01-31
  cq certify p-1029 --purpose sports --unfit --remarks \"review after physio\"")]
    Certify {
        /// Patient id (real or provisional)
        #[arg(value_parser = non_empty_string)]
        patient: String,

        /// What the certificate is for
        #[arg(long, value_parser = non_empty_string)]
        purpose: String,

        /// The patient is fit
        #[arg(long)]
        fit: bool,

        /// The patient is not fit
        #[arg(long)]
        unfit: bool,

        /// First day of validity (default: today)
        #[arg(long = "from", value_name = "YYYY-MM-DD")]
        valid_from: Option<String>,

        /// Last day of validity
        #[arg(long = "until", value_name = "YYYY-MM-DD")]
        valid_until: Option<String>,

        #[arg(long)]
        remarks: Option<String>,

        /// Action this one depends on
        #[arg(long, value_name = "ACTION")]
        after: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Queue changes to a patient's demographics
    #[command(arg_required_else_help = true)]
    Update {
        /// Patient id (real or provisional)
        #[arg(value_parser = non_empty_string)]
        patient: String,

        #[command(flatten)]
        changes: DemographicsArgs,

        /// Action this one depends on
        #[arg(long, value_name = "ACTION")]
        after: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List queued actions in send order
    List {
        /// Only actions for this patient
        #[arg(long, short)]
        patient: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show queue size and backend reachability
    Status {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Send queued actions to the backend
    #[command(after_help = "\
Examples:
  cq sync                   Send what can be sent, then exit
  cq sync --timeout 60      Give up after a minute
  cq sync --watch           Keep syncing until Ctrl-C")]
    Sync {
        /// Give up after this many seconds
        #[arg(long, value_name = "SECS", conflicts_with = "watch")]
        timeout: Option<u64>,

        /// Keep running and sync whenever the backend is reachable
        #[arg(long)]
        watch: bool,

        /// Append logs to this file instead of stderr
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },

    /// Remove one queued action
    Discard {
        /// Action id
        #[arg(value_parser = non_empty_string)]
        id: String,
    },

    /// Drop every queued action
    Clear {
        /// Confirm dropping unsent actions
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
