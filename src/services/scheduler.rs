//! Scheduler service
//!
//! Runs automatic backups on a cron schedule when the `autoBackup` setting
//! is enabled, writing snapshot files through the backup service.

use crate::error::{AppError, Result};
use crate::services::{BackupService, SettingsService};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Auto-backup frequency options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFrequency {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl BackupFrequency {
    /// Convert frequency to a six-field cron expression
    fn to_cron(self) -> String {
        match self {
            BackupFrequency::Minutes(m) => {
                if m == 1 {
                    "0 * * * * *".to_string()
                } else {
                    format!("0 */{} * * * *", m)
                }
            }
            BackupFrequency::Hours(h) => {
                if h == 1 {
                    "0 0 * * * *".to_string()
                } else {
                    format!("0 0 */{} * * *", h)
                }
            }
            BackupFrequency::Days(d) => {
                if d == 1 {
                    // Daily at 2 AM
                    "0 0 2 * * *".to_string()
                } else {
                    format!("0 0 2 */{} * *", d)
                }
            }
        }
    }
}

impl FromStr for BackupFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // Supports "5m", "2h", "3d" and legacy "daily", "weekly", "monthly"
        let s = s.trim().to_lowercase();

        match s.as_str() {
            "daily" => return Ok(BackupFrequency::Days(1)),
            "weekly" => return Ok(BackupFrequency::Days(7)),
            "monthly" => return Ok(BackupFrequency::Days(30)),
            _ => {}
        }

        if s.len() < 2 {
            return Err(format!("Invalid frequency: '{}'", s));
        }

        // char_indices gives a char-boundary offset; a plain byte slice
        // would panic on a multibyte trailing character
        let (split, unit) = s
            .char_indices()
            .last()
            .ok_or_else(|| format!("Invalid frequency: '{}'", s))?;
        let value: u32 = s[..split]
            .parse()
            .map_err(|_| format!("Invalid number in frequency: {}", s))?;

        if value == 0 {
            return Err("Frequency value must be greater than 0".to_string());
        }

        match unit {
            'm' => Ok(BackupFrequency::Minutes(value)),
            'h' => Ok(BackupFrequency::Hours(value)),
            'd' => Ok(BackupFrequency::Days(value)),
            _ => Err(format!(
                "Invalid frequency unit '{}'. Use 'm' (minutes), 'h' (hours), or 'd' (days)",
                unit
            )),
        }
    }
}

/// Scheduler for automatic backups
pub struct SchedulerService {
    scheduler: Arc<RwLock<JobScheduler>>,
    backup_service: Arc<BackupService>,
    settings_service: Arc<SettingsService>,
    backups_dir: PathBuf,
    current_job_id: Arc<RwLock<Option<Uuid>>>,
}

impl SchedulerService {
    pub async fn new(
        backup_service: BackupService,
        settings_service: SettingsService,
        backups_dir: PathBuf,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Backup(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            backup_service: Arc::new(backup_service),
            settings_service: Arc::new(settings_service),
            backups_dir,
            current_job_id: Arc::new(RwLock::new(None)),
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Backup(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Backup scheduler started");
        Ok(())
    }

    /// (Re)schedule automatic backups at the given frequency.
    ///
    /// Consults the persisted settings: when `autoBackup` is off, any
    /// existing job is removed and nothing is scheduled.
    pub async fn schedule_backup(&self, frequency: BackupFrequency) -> Result<()> {
        self.cancel_backup().await?;

        let settings = self.settings_service.app_settings().await?;
        if !settings.auto_backup {
            tracing::info!("Automatic backups disabled in settings");
            return Ok(());
        }

        let cron_expr = frequency.to_cron();
        let backup_service = Arc::clone(&self.backup_service);
        let backups_dir = self.backups_dir.clone();

        let job = Job::new_async(cron_expr.clone(), move |_uuid, _l| {
            let backup_service = Arc::clone(&backup_service);
            let backups_dir = backups_dir.clone();
            Box::pin(async move {
                tracing::info!("Running scheduled automatic backup");

                match backup_service.write_backup_file(&backups_dir).await {
                    Ok(path) => tracing::info!("Automatic backup created: {:?}", path),
                    Err(e) => tracing::error!("Automatic backup failed: {}", e),
                }
            })
        })
        .map_err(|e| AppError::Backup(format!("Failed to create backup job: {}", e)))?;

        let job_id = job.guid();

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Backup(format!("Failed to schedule job: {}", e)))?;

        let mut current_job = self.current_job_id.write().await;
        *current_job = Some(job_id);

        tracing::info!("Automatic backup scheduled: {:?} ({})", frequency, cron_expr);
        Ok(())
    }

    /// Cancel any scheduled backup job
    pub async fn cancel_backup(&self) -> Result<()> {
        let mut current_job = self.current_job_id.write().await;

        if let Some(job_id) = *current_job {
            let scheduler = self.scheduler.write().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Backup(format!("Failed to remove job: {}", e)))?;

            *current_job = None;
            tracing::info!("Automatic backup schedule cancelled");
        }

        Ok(())
    }

    /// Shutdown the scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Backup(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Backup scheduler shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppSettingsUpdate;
    use crate::storage::{initialize_storage, KvStore};
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    #[test]
    fn test_frequency_from_str() {
        assert_eq!("5m".parse::<BackupFrequency>().unwrap(), BackupFrequency::Minutes(5));
        assert_eq!("2h".parse::<BackupFrequency>().unwrap(), BackupFrequency::Hours(2));
        assert_eq!("3d".parse::<BackupFrequency>().unwrap(), BackupFrequency::Days(3));
        assert_eq!("daily".parse::<BackupFrequency>().unwrap(), BackupFrequency::Days(1));
        assert_eq!("weekly".parse::<BackupFrequency>().unwrap(), BackupFrequency::Days(7));
        assert_eq!("monthly".parse::<BackupFrequency>().unwrap(), BackupFrequency::Days(30));

        assert!("0m".parse::<BackupFrequency>().is_err());
        assert!("5x".parse::<BackupFrequency>().is_err());
        assert!("".parse::<BackupFrequency>().is_err());
    }

    #[test]
    fn test_frequency_multibyte_unit_rejected() {
        // Units outside ASCII must fail cleanly, not split mid-character
        assert!("1µ".parse::<BackupFrequency>().is_err());
        assert!("5分".parse::<BackupFrequency>().is_err());
        assert!("µ".parse::<BackupFrequency>().is_err());
    }

    #[test]
    fn test_frequency_to_cron() {
        assert_eq!(BackupFrequency::Minutes(1).to_cron(), "0 * * * * *");
        assert_eq!(BackupFrequency::Minutes(15).to_cron(), "0 */15 * * * *");
        assert_eq!(BackupFrequency::Hours(1).to_cron(), "0 0 * * * *");
        assert_eq!(BackupFrequency::Days(1).to_cron(), "0 0 2 * * *");
    }

    async fn create_test_scheduler(temp: &TempDir) -> (SchedulerService, SettingsService) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_storage(&pool).await.unwrap();

        let store = KvStore::new(pool);
        let settings = SettingsService::new(store.clone());
        let scheduler = SchedulerService::new(
            BackupService::new(store),
            settings.clone(),
            temp.path().join("backups"),
        )
        .await
        .unwrap();

        (scheduler, settings)
    }

    #[tokio::test]
    async fn test_schedule_and_cancel() {
        let temp = TempDir::new().unwrap();
        let (scheduler, _) = create_test_scheduler(&temp).await;

        scheduler.start().await.unwrap();
        scheduler
            .schedule_backup(BackupFrequency::Hours(1))
            .await
            .unwrap();

        assert!(scheduler.current_job_id.read().await.is_some());

        scheduler.cancel_backup().await.unwrap();
        assert!(scheduler.current_job_id.read().await.is_none());

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_skipped_when_auto_backup_disabled() {
        let temp = TempDir::new().unwrap();
        let (scheduler, settings) = create_test_scheduler(&temp).await;

        settings
            .update_app_settings(AppSettingsUpdate {
                auto_backup: Some(false),
                ..AppSettingsUpdate::default()
            })
            .await
            .unwrap();

        scheduler
            .schedule_backup(BackupFrequency::Minutes(1))
            .await
            .unwrap();

        assert!(scheduler.current_job_id.read().await.is_none());
    }
}
