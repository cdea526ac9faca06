//! Booking service
//!
//! High-level appointment lifecycle: patients book, the assigned doctor
//! confirms or cancels, and every status-changing write is followed by
//! exactly one notification to the other party.
//!
//! Notification delivery is deliberately non-transactional: the appointment
//! write is authoritative and a failed notification write is logged and
//! swallowed.

use crate::error::{AppError, Result};
use crate::models::{Appointment, AppointmentStatus, User, UserRole};
use crate::repository::AppointmentRepository;
use crate::services::NotificationService;
use chrono::Utc;

/// Service orchestrating appointments and their notifications
#[derive(Clone)]
pub struct BookingService {
    appointments: AppointmentRepository,
    notifications: NotificationService,
}

impl BookingService {
    pub fn new(appointments: AppointmentRepository, notifications: NotificationService) -> Self {
        Self {
            appointments,
            notifications,
        }
    }

    pub fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    /// Book a pending appointment for `patient` with `doctor`.
    ///
    /// The id is the creation timestamp in milliseconds, matching the
    /// documents written by earlier versions of the app.
    pub async fn book(
        &self,
        patient: &User,
        doctor: &User,
        date: String,
        time: String,
    ) -> Result<Appointment> {
        if patient.role != UserRole::Patient {
            return Err(AppError::Validation(format!(
                "user {} is not a patient",
                patient.id
            )));
        }
        if doctor.role != UserRole::Doctor {
            return Err(AppError::Validation(format!(
                "user {} is not a doctor",
                doctor.id
            )));
        }

        let appointment = Appointment {
            id: Utc::now().timestamp_millis().to_string(),
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            date,
            time,
            specialty: doctor.specialty.clone().unwrap_or_default(),
            status: AppointmentStatus::Pending,
            cancel_reason: None,
        };

        let created = self.appointments.create(appointment).await?;
        tracing::info!("Booked appointment {} for patient {}", created.id, patient.id);

        if let Err(e) = self
            .notifications
            .notify_new_appointment(&created.doctor_id, &created)
            .await
        {
            tracing::warn!("Failed to notify doctor of new appointment: {}", e);
        }

        Ok(created)
    }

    /// Confirm a pending appointment; only the assigned doctor may do this
    pub async fn confirm(&self, doctor_id: &str, appointment_id: &str) -> Result<Appointment> {
        self.check_assigned_doctor(doctor_id, appointment_id).await?;

        let updated = self
            .appointments
            .update_status(appointment_id, AppointmentStatus::Confirmed, None)
            .await?;

        tracing::info!("Appointment {} confirmed by doctor {}", appointment_id, doctor_id);

        if let Err(e) = self
            .notifications
            .notify_appointment_confirmed(&updated.patient_id, &updated)
            .await
        {
            tracing::warn!("Failed to notify patient of confirmation: {}", e);
        }

        Ok(updated)
    }

    /// Cancel a pending appointment; only the assigned doctor may do this
    pub async fn cancel(
        &self,
        doctor_id: &str,
        appointment_id: &str,
        reason: Option<String>,
    ) -> Result<Appointment> {
        self.check_assigned_doctor(doctor_id, appointment_id).await?;

        let updated = self
            .appointments
            .update_status(appointment_id, AppointmentStatus::Cancelled, reason.clone())
            .await?;

        tracing::info!("Appointment {} cancelled by doctor {}", appointment_id, doctor_id);

        if let Err(e) = self
            .notifications
            .notify_appointment_cancelled(&updated.patient_id, &updated, reason.as_deref())
            .await
        {
            tracing::warn!("Failed to notify patient of cancellation: {}", e);
        }

        Ok(updated)
    }

    async fn check_assigned_doctor(&self, doctor_id: &str, appointment_id: &str) -> Result<()> {
        let appointment = self.appointments.get(appointment_id).await?;
        if appointment.doctor_id != doctor_id {
            return Err(AppError::Forbidden(format!(
                "doctor {} is not assigned to appointment {}",
                doctor_id, appointment_id
            )));
        }
        Ok(())
    }
}
