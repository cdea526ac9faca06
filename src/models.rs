//! Domain models
//!
//! Rust structs for the persisted JSON documents. Field names serialize in
//! camelCase to stay byte-compatible with the documents written by earlier
//! versions of the app.

use crate::config::{DATE_FORMAT, MAX_CANCEL_REASON_LENGTH, MAX_NAME_LENGTH, TIME_FORMAT};
use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an appointment.
///
/// The only legal transitions are pending -> confirmed and
/// pending -> cancelled, both driven by the assigned doctor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl AppointmentStatus {
    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Pending, AppointmentStatus::Confirmed)
                | (AppointmentStatus::Pending, AppointmentStatus::Cancelled)
        )
    }
}

/// A scheduled patient-doctor encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub doctor_name: String,
    /// Free-text date in DD/MM/YYYY form
    pub date: String,
    /// Free-text time in HH:MM form
    pub time: String,
    pub specialty: String,
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Appointment {
    /// Validate the free-text date and time fields.
    ///
    /// Rejection happens before any write so a malformed appointment
    /// never reaches the store.
    pub fn validate(&self) -> Result<()> {
        if self.patient_id.trim().is_empty() {
            return Err(AppError::Validation("patientId must not be empty".into()));
        }
        if self.doctor_id.trim().is_empty() {
            return Err(AppError::Validation("doctorId must not be empty".into()));
        }
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            AppError::Validation(format!("invalid date '{}', expected DD/MM/YYYY", self.date))
        })?;
        NaiveTime::parse_from_str(&self.time, TIME_FORMAT).map_err(|_| {
            AppError::Validation(format!("invalid time '{}', expected HH:MM", self.time))
        })?;
        if let Some(reason) = &self.cancel_reason {
            if reason.len() > MAX_CANCEL_REASON_LENGTH {
                return Err(AppError::Validation("cancel reason too long".into()));
            }
        }
        Ok(())
    }
}

/// Role of a registered user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Doctor,
    Patient,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Patient => write!(f, "patient"),
        }
    }
}

/// A registered user of the app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Medical specialty, doctors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default)]
    pub image: String,
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub image: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(AppError::Validation("name too long".into()));
        }
        validate_email(&self.email)?;
        if self.role == UserRole::Doctor
            && self.specialty.as_deref().map_or(true, |s| s.trim().is_empty())
        {
            return Err(AppError::Validation("doctors require a specialty".into()));
        }
        Ok(())
    }
}

/// Profile edit request; only the present fields change
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub image: Option<String>,
}

/// Kind of notification, tied to the appointment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentReminder,
    #[serde(rename = "other")]
    General,
}

/// A notification delivered to one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Application settings; a single record shared by the whole app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_true")]
    pub auto_backup: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_true() -> bool {
    true
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_language() -> String {
    "pt-BR".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            auto_backup: true,
            theme: default_theme(),
            language: default_language(),
        }
    }
}

/// Partial settings update; only the present fields change
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsUpdate {
    pub notifications: Option<bool>,
    pub auto_backup: Option<bool>,
    pub theme: Option<String>,
    pub language: Option<String>,
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    });
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid email '{}'", email)))
    }
}
