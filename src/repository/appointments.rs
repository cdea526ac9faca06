//! Appointment repository
//!
//! Whole-collection read-modify-write over the `appointments` document.
//! Appointments are never deleted; only their status changes.

use crate::config::APPOINTMENTS_KEY;
use crate::error::{AppError, Result};
use crate::models::{Appointment, AppointmentStatus};
use crate::storage::KvStore;

/// Repository for the appointments collection
#[derive(Clone)]
pub struct AppointmentRepository {
    store: KvStore,
}

impl AppointmentRepository {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<Vec<Appointment>> {
        Ok(self
            .store
            .get_json::<Vec<Appointment>>(APPOINTMENTS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, appointments: &[Appointment]) -> Result<()> {
        self.store.set_json(APPOINTMENTS_KEY, &appointments).await
    }

    /// List every stored appointment
    pub async fn list(&self) -> Result<Vec<Appointment>> {
        self.load().await
    }

    /// List appointments matching an arbitrary predicate
    pub async fn list_where<F>(&self, predicate: F) -> Result<Vec<Appointment>>
    where
        F: Fn(&Appointment) -> bool,
    {
        let all = self.load().await?;
        Ok(all.into_iter().filter(|a| predicate(a)).collect())
    }

    /// List appointments booked by a patient
    pub async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        self.list_where(|a| a.patient_id == patient_id).await
    }

    /// List appointments assigned to a doctor
    pub async fn list_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>> {
        self.list_where(|a| a.doctor_id == doctor_id).await
    }

    /// Get a single appointment by id
    pub async fn get(&self, id: &str) -> Result<Appointment> {
        let all = self.load().await?;
        all.into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::AppointmentNotFound(id.to_string()))
    }

    /// Append a new appointment and rewrite the collection
    pub async fn create(&self, appointment: Appointment) -> Result<Appointment> {
        appointment.validate()?;

        let mut all = self.load().await?;
        all.push(appointment.clone());
        self.save(&all).await?;

        tracing::debug!("Created appointment: {}", appointment.id);
        Ok(appointment)
    }

    /// Replace the status (and optional cancellation reason) of one record.
    ///
    /// Only pending appointments may transition; anything else is a
    /// validation error. A missing id is an explicit not-found error.
    pub async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
        reason: Option<String>,
    ) -> Result<Appointment> {
        let mut all = self.load().await?;

        let appointment = all
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::AppointmentNotFound(id.to_string()))?;

        if !appointment.status.can_transition_to(status) {
            return Err(AppError::Validation(format!(
                "cannot change appointment {} from {} to {}",
                id, appointment.status, status
            )));
        }

        appointment.status = status;
        if reason.is_some() {
            appointment.cancel_reason = reason;
        }
        let updated = appointment.clone();

        self.save(&all).await?;

        tracing::debug!("Updated appointment {} to {}", id, status);
        Ok(updated)
    }
}
