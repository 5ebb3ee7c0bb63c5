// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Building clinical actions from command-line input and queueing them.
//!
//! Queueing never talks to the backend. The action is appended to the
//! stored queue under the writer lock and left for `cq sync` to deliver.

use chrono::{Local, NaiveDate};
use cq_core::{
    Action, ActionId, ActionPayload, FitnessCertificate, Medication, NewPatient, PatientId,
    PatientUpdate, Prescription, Sex,
};

use super::Workspace;
use crate::cli::{DemographicsArgs, OutputFormat};
use crate::error::{Error, Result};

/// Queues `action` in the workspace found from the current directory.
pub fn run(action: Action, output: OutputFormat) -> Result<()> {
    let workspace = Workspace::open()?;
    let action = submit(&workspace, action)?;
    println!("{}", format_queued(&action, output)?);
    Ok(())
}

/// Appends `action` to the stored queue and returns it as stored.
pub fn submit(workspace: &Workspace, action: Action) -> Result<Action> {
    let _lock = workspace.lock_queue()?;
    let durable = workspace.with_offline_engine(|engine| engine.enqueue(action.clone()))?;
    if !durable {
        return Err(Error::QueueNotSaved);
    }
    Ok(action)
}

pub fn format_queued(action: &Action, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(action)?),
        OutputFormat::Text => {
            let mut text = format!(
                "Queued {} {} for patient {}",
                action.kind(),
                action.id,
                action.patient_id
            );
            if let Some(dep) = &action.depends_on {
                text.push_str(&format!(" (after {})", dep));
            }
            if action.patient_id.is_provisional() {
                text.push_str(&format!(
                    "\n  use '{}' for this patient until the backend assigns an id",
                    action.patient_id
                ));
            }
            Ok(text)
        }
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(input.to_string()))
}

/// Parses `name:dosage:frequency[:duration]`. The duration may itself
/// contain colons.
pub fn parse_medication(input: &str) -> Result<Medication> {
    let parts: Vec<&str> = input.splitn(4, ':').map(str::trim).collect();
    match parts.as_slice() {
        [name, dosage, frequency, rest @ ..]
            if !name.is_empty() && !dosage.is_empty() && !frequency.is_empty() =>
        {
            let duration = rest.first().filter(|d| !d.is_empty());
            Ok(Medication {
                name: name.to_string(),
                dosage: dosage.to_string(),
                frequency: frequency.to_string(),
                duration: duration.map(|d| d.to_string()),
            })
        }
        _ => Err(Error::InvalidMedication(input.to_string())),
    }
}

pub fn new_patient(
    first_name: &str,
    last_name: &str,
    dob: &str,
    sex: Option<&str>,
    phone: Option<String>,
    address: Option<String>,
) -> Result<NewPatient> {
    let sex = sex.map(str::parse::<Sex>).transpose()?;
    Ok(NewPatient {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        date_of_birth: parse_date(dob)?,
        sex,
        phone: non_blank(phone),
        address: non_blank(address),
    })
}

pub fn prescription(
    medications: &[String],
    diagnosis: Option<String>,
    notes: Option<String>,
) -> Result<Prescription> {
    let medications = medications
        .iter()
        .map(|m| parse_medication(m))
        .collect::<Result<Vec<_>>>()?;
    Ok(Prescription {
        medications,
        diagnosis: non_blank(diagnosis),
        notes: non_blank(notes),
    })
}

/// Builds a certificate, valid from `today` unless `valid_from` says otherwise.
pub fn certificate(
    purpose: &str,
    fit: bool,
    valid_from: Option<&str>,
    valid_until: Option<&str>,
    remarks: Option<String>,
    today: NaiveDate,
) -> Result<FitnessCertificate> {
    Ok(FitnessCertificate {
        purpose: purpose.trim().to_string(),
        fit,
        valid_from: valid_from.map(parse_date).transpose()?.unwrap_or(today),
        valid_until: valid_until.map(parse_date).transpose()?,
        remarks: non_blank(remarks),
    })
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn update(changes: DemographicsArgs) -> PatientUpdate {
    PatientUpdate {
        first_name: non_blank(changes.first_name),
        last_name: non_blank(changes.last_name),
        phone: non_blank(changes.phone),
        address: non_blank(changes.address),
    }
}

/// Wraps a payload for an existing (or provisional) patient.
pub fn for_patient(patient: &str, payload: ActionPayload, after: Option<String>) -> Action {
    let action = Action::new(PatientId::from(patient.trim()), payload);
    match after {
        Some(dep) => action.after(ActionId::from(dep.trim())),
        None => action,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
