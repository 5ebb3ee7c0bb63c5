// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued clinical actions.
//!
//! An [`Action`] is one unit of backend work tied to exactly one patient. Its
//! [`ActionId`] doubles as the idempotency key sent on every delivery attempt,
//! so the backend can drop duplicate deliveries of the same action.
//!
//! Payloads are a closed sum type: the kind of an action is derived from its
//! payload variant, so the two can never disagree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Prefix for client-generated patient identifiers.
pub const PROVISIONAL_PREFIX: &str = "tmp-";

/// Unique identifier of a queued action, used as its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        ActionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        ActionId(s.to_string())
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        ActionId(s)
    }
}

/// Identifier of the patient an action applies to.
///
/// Patients created while offline get a provisional identifier (see
/// [`PatientId::provisional`]) until the backend assigns a real one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    /// Generates a client-side identifier for a patient not yet known to the backend.
    pub fn provisional() -> Self {
        PatientId(format!("{}{}", PROVISIONAL_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Returns true if this identifier was generated on the client.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(s: &str) -> Self {
        PatientId(s.to_string())
    }
}

impl From<String> for PatientId {
    fn from(s: String) -> Self {
        PatientId(s)
    }
}

/// The closed set of operations that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreatePatient,
    CreatePrescription,
    CreateFitnessCertificate,
    UpdatePatient,
}

impl ActionKind {
    /// All kinds, in declaration order.
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CreatePatient,
        ActionKind::CreatePrescription,
        ActionKind::CreateFitnessCertificate,
        ActionKind::UpdatePatient,
    ];

    /// Returns the string representation used in storage, config and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreatePatient => "create_patient",
            ActionKind::CreatePrescription => "create_prescription",
            ActionKind::CreateFitnessCertificate => "create_fitness_certificate",
            ActionKind::UpdatePatient => "update_patient",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "create_patient" => Ok(ActionKind::CreatePatient),
            "create_prescription" => Ok(ActionKind::CreatePrescription),
            "create_fitness_certificate" | "create_certificate" => {
                Ok(ActionKind::CreateFitnessCertificate)
            }
            "update_patient" => Ok(ActionKind::UpdatePatient),
            _ => Err(Error::InvalidActionKind(s.to_string())),
        }
    }
}

/// Administrative sex recorded at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
}

impl FromStr for Sex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "female" | "f" => Ok(Sex::Female),
            "male" | "m" => Ok(Sex::Male),
            "other" | "o" => Ok(Sex::Other),
            _ => Err(Error::InvalidSex(s.to_string())),
        }
    }
}

/// Demographics for a patient registered on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// One line of a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub medications: Vec<Medication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A medical fitness certificate issued to the patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessCertificate {
    pub purpose: String,
    pub fit: bool,
    pub valid_from: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Changes to an existing patient's demographics. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PatientUpdate {
    /// Returns true if no field would change.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
    }
}

/// Typed payload of an action, one variant per [`ActionKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ActionPayload {
    CreatePatient(NewPatient),
    CreatePrescription(Prescription),
    CreateFitnessCertificate(FitnessCertificate),
    UpdatePatient(PatientUpdate),
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::CreatePatient(_) => ActionKind::CreatePatient,
            ActionPayload::CreatePrescription(_) => ActionKind::CreatePrescription,
            ActionPayload::CreateFitnessCertificate(_) => ActionKind::CreateFitnessCertificate,
            ActionPayload::UpdatePatient(_) => ActionKind::UpdatePatient,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ActionPayload::CreatePatient(p) => {
                if p.first_name.trim().is_empty() || p.last_name.trim().is_empty() {
                    return Err(invalid("patient first and last name are required"));
                }
            }
            ActionPayload::CreatePrescription(rx) => {
                if rx.medications.is_empty() {
                    return Err(invalid("prescription has no medications"));
                }
                for med in &rx.medications {
                    if med.name.trim().is_empty() || med.dosage.trim().is_empty() {
                        return Err(invalid("every medication needs a name and a dosage"));
                    }
                }
            }
            ActionPayload::CreateFitnessCertificate(cert) => {
                if cert.purpose.trim().is_empty() {
                    return Err(invalid("certificate purpose is required"));
                }
                if let Some(until) = cert.valid_until {
                    if until < cert.valid_from {
                        return Err(invalid("certificate expires before it becomes valid"));
                    }
                }
            }
            ActionPayload::UpdatePatient(update) => {
                if update.is_empty() {
                    return Err(invalid("patient update changes nothing"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidAction(reason.to_string())
}

/// A unit of queued work for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Idempotency key, assigned at creation and never reused.
    pub id: ActionId,
    pub patient_id: PatientId,
    #[serde(flatten)]
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
    /// Action that should complete first. Carried for the backend and the UI;
    /// the engine does not hold an action back on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<ActionId>,
    /// Failed delivery attempts in this process.
    #[serde(default)]
    pub retry_count: u32,
}

impl Action {
    /// Creates an action with a fresh id stamped with the current time.
    pub fn new(patient_id: PatientId, payload: ActionPayload) -> Self {
        Action {
            id: ActionId::new(),
            patient_id,
            payload,
            created_at: Utc::now(),
            depends_on: None,
            retry_count: 0,
        }
    }

    /// Creates a create-patient action for a fresh provisional patient id.
    pub fn register_patient(patient: NewPatient) -> Self {
        Action::new(
            PatientId::provisional(),
            ActionPayload::CreatePatient(patient),
        )
    }

    /// Marks this action as depending on another one.
    pub fn after(mut self, dependency: ActionId) -> Self {
        self.depends_on = Some(dependency);
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// Checks the action is well-formed enough to be worth queuing.
    pub fn validate(&self) -> Result<()> {
        if self.patient_id.as_str().trim().is_empty() {
            return Err(invalid("patient id is required"));
        }
        if self.depends_on.as_ref() == Some(&self.id) {
            return Err(invalid("an action cannot depend on itself"));
        }
        self.payload.validate()
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
