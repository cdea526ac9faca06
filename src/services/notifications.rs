//! Notification service
//!
//! Creates notification records for appointment lifecycle events and manages
//! the recipient-facing read/unread state. Also runs the background task that
//! feeds the unread-count badge.

use crate::config::{NOTIFICATIONS_KEY, UNREAD_POLL_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::models::{Appointment, Notification, NotificationKind};
use crate::storage::KvStore;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Service for the notifications collection
#[derive(Clone)]
pub struct NotificationService {
    store: KvStore,
}

impl NotificationService {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<Vec<Notification>> {
        Ok(self
            .store
            .get_json::<Vec<Notification>>(NOTIFICATIONS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, notifications: &[Notification]) -> Result<()> {
        self.store.set_json(NOTIFICATIONS_KEY, &notifications).await
    }

    /// Append one notification for `user_id`
    pub async fn send(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: String,
        message: String,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            title,
            message,
            created_at: Utc::now(),
            read: false,
        };

        let mut all = self.load().await?;
        all.push(notification.clone());
        self.save(&all).await?;

        tracing::debug!("Sent {:?} notification to user {}", kind, user_id);
        Ok(notification)
    }

    /// Tell a doctor a patient booked a new appointment
    pub async fn notify_new_appointment(
        &self,
        doctor_id: &str,
        appointment: &Appointment,
    ) -> Result<Notification> {
        self.send(
            doctor_id,
            NotificationKind::General,
            "Nova Consulta Agendada".to_string(),
            format!(
                "{} agendou uma consulta para {} às {}",
                appointment.patient_name, appointment.date, appointment.time
            ),
        )
        .await
    }

    /// Tell a patient their appointment was confirmed
    pub async fn notify_appointment_confirmed(
        &self,
        patient_id: &str,
        appointment: &Appointment,
    ) -> Result<Notification> {
        self.send(
            patient_id,
            NotificationKind::AppointmentConfirmed,
            "Consulta Confirmada".to_string(),
            format!(
                "Sua consulta com {} em {} às {} foi confirmada",
                appointment.doctor_name, appointment.date, appointment.time
            ),
        )
        .await
    }

    /// Tell a patient their appointment was cancelled
    pub async fn notify_appointment_cancelled(
        &self,
        patient_id: &str,
        appointment: &Appointment,
        reason: Option<&str>,
    ) -> Result<Notification> {
        let mut message = format!(
            "Sua consulta com {} em {} às {} foi cancelada",
            appointment.doctor_name, appointment.date, appointment.time
        );
        if let Some(reason) = reason {
            message.push_str(&format!(". Motivo: {}", reason));
        }

        self.send(
            patient_id,
            NotificationKind::AppointmentCancelled,
            "Consulta Cancelada".to_string(),
            message,
        )
        .await
    }

    /// List a user's notifications, newest first
    pub async fn get_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut mine: Vec<Notification> = self
            .load()
            .await?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect();

        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    /// Count a user's unread notifications
    pub async fn get_unread_count(&self, user_id: &str) -> Result<usize> {
        let all = self.load().await?;
        Ok(all.iter().filter(|n| n.user_id == user_id && !n.read).count())
    }

    /// Mark one notification as read; repeated calls are a no-op
    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let mut all = self.load().await?;

        let notification = all
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AppError::NotificationNotFound(id.to_string()))?;

        if notification.read {
            return Ok(());
        }

        notification.read = true;
        self.save(&all).await?;

        tracing::debug!("Marked notification as read: {}", id);
        Ok(())
    }

    /// Mark every notification for `user_id` as read
    pub async fn mark_all_as_read(&self, user_id: &str) -> Result<()> {
        let mut all = self.load().await?;

        let mut changed = false;
        for notification in all.iter_mut() {
            if notification.user_id == user_id && !notification.read {
                notification.read = true;
                changed = true;
            }
        }

        if changed {
            self.save(&all).await?;
        }

        tracing::debug!("Marked all notifications read for user: {}", user_id);
        Ok(())
    }

    /// Delete one notification
    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let mut all = self.load().await?;
        let before = all.len();

        all.retain(|n| n.id != id);
        if all.len() == before {
            return Err(AppError::NotificationNotFound(id.to_string()));
        }

        self.save(&all).await?;

        tracing::debug!("Deleted notification: {}", id);
        Ok(())
    }

    /// Start a background poll of the unread count for one user.
    ///
    /// The watcher holds the latest count; dropping it aborts the task,
    /// which is how a screen cancels polling on unmount. Poll failures are
    /// logged and skipped so a transient storage error never kills the badge.
    pub fn watch_unread(&self, user_id: &str, period: Duration) -> UnreadWatcher {
        let service = self.clone();
        let user_id = user_id.to_string();
        let (tx, rx) = watch::channel(0usize);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                match service.get_unread_count(&user_id).await {
                    Ok(count) => {
                        if tx.send(count).is_err() {
                            // Watcher dropped, stop polling
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error polling unread count: {}", e);
                    }
                }
            }
        });

        UnreadWatcher { rx, handle }
    }

    /// Start the poll with the default interval
    pub fn watch_unread_default(&self, user_id: &str) -> UnreadWatcher {
        self.watch_unread(user_id, Duration::from_secs(UNREAD_POLL_INTERVAL_SECS))
    }
}

/// Handle to the background unread-count poll
pub struct UnreadWatcher {
    rx: watch::Receiver<usize>,
    handle: tokio::task::JoinHandle<()>,
}

impl UnreadWatcher {
    /// Latest observed unread count
    pub fn count(&self) -> usize {
        *self.rx.borrow()
    }

    /// Wait for the next poll result
    pub async fn changed(&mut self) -> Result<usize> {
        self.rx
            .changed()
            .await
            .map_err(|_| AppError::Generic("unread poll stopped".to_string()))?;
        Ok(*self.rx.borrow())
    }
}

impl Drop for UnreadWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
