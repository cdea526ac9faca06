//! Statistics service
//!
//! Aggregate counts and percentages over a doctor's appointments, shown on
//! the doctor dashboard.

use crate::error::Result;
use crate::models::AppointmentStatus;
use crate::repository::AppointmentRepository;
use serde::Serialize;
use std::collections::HashSet;

/// Per-status share of a doctor's appointments, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusPercentages {
    pub pending: f64,
    pub confirmed: f64,
    pub cancelled: f64,
}

/// Aggregates shown on the doctor dashboard
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatistics {
    pub total_appointments: usize,
    pub confirmed_appointments: usize,
    pub pending_appointments: usize,
    pub cancelled_appointments: usize,
    /// Distinct patients seen by this doctor
    pub total_patients: usize,
    pub status_percentages: StatusPercentages,
}

/// Service computing doctor-facing statistics
#[derive(Clone)]
pub struct StatisticsService {
    appointments: AppointmentRepository,
}

impl StatisticsService {
    pub fn new(appointments: AppointmentRepository) -> Self {
        Self { appointments }
    }

    /// Compute a doctor's dashboard statistics.
    ///
    /// Returns all-zero defaults when the doctor has no appointments.
    pub async fn doctor_statistics(&self, doctor_id: &str) -> Result<DoctorStatistics> {
        let appointments = self.appointments.list_for_doctor(doctor_id).await?;

        if appointments.is_empty() {
            return Ok(DoctorStatistics::default());
        }

        let total = appointments.len();
        let confirmed = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Confirmed)
            .count();
        let pending = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Pending)
            .count();
        let cancelled = total - confirmed - pending;

        let patients: HashSet<&str> = appointments.iter().map(|a| a.patient_id.as_str()).collect();

        Ok(DoctorStatistics {
            total_appointments: total,
            confirmed_appointments: confirmed,
            pending_appointments: pending,
            cancelled_appointments: cancelled,
            total_patients: patients.len(),
            status_percentages: StatusPercentages {
                pending: percentage(pending, total),
                confirmed: percentage(confirmed, total),
                cancelled: percentage(cancelled, total),
            },
        })
    }
}

/// count/total as a percentage, rounded to one decimal
fn percentage(count: usize, total: usize) -> f64 {
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}
