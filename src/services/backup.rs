//! Backup service
//!
//! Exports all stored collections as one JSON blob with a SHA-256 checksum,
//! restores from such a blob after verifying the checksum, and owns the
//! irreversible clear operations.

use crate::config::{
    APPOINTMENTS_KEY, BACKUP_RETENTION_COUNT, BACKUP_VERSION, CURRENT_USER_KEY, NOTIFICATIONS_KEY,
    SETTINGS_KEY, USERS_KEY,
};
use crate::error::{AppError, Result};
use crate::models::{AppSettings, Appointment, Notification, User};
use crate::storage::KvStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Everything the app persists, in one document
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    pub version: String,
    pub timestamp: String,
    pub appointments: Vec<Appointment>,
    pub users: Vec<User>,
    pub notifications: Vec<Notification>,
    pub settings: AppSettings,
}

/// Exportable backup: payload plus its checksum
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope {
    pub checksum: String,
    pub payload: BackupPayload,
}

/// Storage usage summary for the settings screen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub total_keys: usize,
    pub cache_size: usize,
}

/// Service for backups and storage housekeeping
#[derive(Clone)]
pub struct BackupService {
    store: KvStore,
}

impl BackupService {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Serialize a full snapshot of all stored collections.
    ///
    /// The returned string is the exportable blob (shareable as a file).
    pub async fn create_backup(&self) -> Result<String> {
        tracing::info!("Creating backup snapshot");

        let payload = BackupPayload {
            version: BACKUP_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            appointments: self
                .store
                .get_json(APPOINTMENTS_KEY)
                .await?
                .unwrap_or_default(),
            users: self.store.get_json(USERS_KEY).await?.unwrap_or_default(),
            notifications: self
                .store
                .get_json(NOTIFICATIONS_KEY)
                .await?
                .unwrap_or_default(),
            settings: self.store.get_json(SETTINGS_KEY).await?.unwrap_or_default(),
        };

        let checksum = calculate_checksum(serde_json::to_string(&payload)?.as_bytes());
        let envelope = BackupEnvelope { checksum, payload };

        let blob = serde_json::to_string_pretty(&envelope)?;
        tracing::info!("Backup snapshot created ({} bytes)", blob.len());

        Ok(blob)
    }

    /// Restore every collection from a backup blob.
    ///
    /// The checksum is verified against a re-serialization of the payload
    /// before anything is written; a tampered or truncated blob restores
    /// nothing.
    pub async fn restore_backup(&self, blob: &str) -> Result<()> {
        tracing::info!("Restoring from backup snapshot");

        let envelope: BackupEnvelope = serde_json::from_str(blob)
            .map_err(|e| AppError::Restore(format!("invalid backup format: {}", e)))?;

        let actual = calculate_checksum(serde_json::to_string(&envelope.payload)?.as_bytes());
        if actual != envelope.checksum {
            return Err(AppError::Restore(format!(
                "checksum mismatch: expected {}, got {}",
                envelope.checksum, actual
            )));
        }

        let payload = envelope.payload;
        self.store.set_json(APPOINTMENTS_KEY, &payload.appointments).await?;
        self.store.set_json(USERS_KEY, &payload.users).await?;
        self.store.set_json(NOTIFICATIONS_KEY, &payload.notifications).await?;
        self.store.set_json(SETTINGS_KEY, &payload.settings).await?;

        tracing::info!(
            "Restore complete (backup version {}, taken {})",
            payload.version,
            payload.timestamp
        );
        Ok(())
    }

    /// Write a snapshot file into `backups_dir` and prune old ones
    pub async fn write_backup_file(&self, backups_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(backups_dir).await?;

        let blob = self.create_backup().await?;
        let filename = format!("backup_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = backups_dir.join(&filename);

        fs::write(&path, &blob).await?;
        tracing::info!("Backup written: {:?}", path);

        self.apply_retention(backups_dir).await?;

        Ok(path)
    }

    /// Keep only the newest BACKUP_RETENTION_COUNT snapshot files
    async fn apply_retention(&self, backups_dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(backups_dir).await?;
        let mut snapshots: Vec<PathBuf> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("backup_") && name.ends_with(".json") {
                snapshots.push(entry.path());
            }
        }

        if snapshots.len() <= BACKUP_RETENTION_COUNT {
            return Ok(());
        }

        // Timestamped names sort chronologically
        snapshots.sort();
        let excess = snapshots.len() - BACKUP_RETENTION_COUNT;
        for old in snapshots.into_iter().take(excess) {
            tracing::info!("Deleting old backup: {:?}", old);
            if let Err(e) = fs::remove_file(&old).await {
                tracing::warn!("Failed to delete backup {:?}: {}", old, e);
            }
        }

        Ok(())
    }

    /// Count stored keys and cache entries
    pub async fn storage_info(&self) -> Result<StorageInfo> {
        let keys = self.store.keys().await?;
        let cache_size = keys.iter().filter(|k| k.as_str() == CURRENT_USER_KEY).count();

        Ok(StorageInfo {
            total_keys: keys.len(),
            cache_size,
        })
    }

    /// Remove cached session state; domain collections survive.
    /// Irreversible, the caller is responsible for confirming.
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY).await?;
        tracing::info!("Cache cleared");
        Ok(())
    }

    /// Remove every persisted key.
    /// Irreversible, the caller is responsible for confirming.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await?;
        tracing::info!("All stored data cleared");
        Ok(())
    }
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, NotificationKind};
    use crate::repository::AppointmentRepository;
    use crate::services::{NotificationService, SettingsService};
    use crate::models::AppSettingsUpdate;
    use crate::storage::initialize_storage;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn create_test_store() -> KvStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_storage(&pool).await.unwrap();

        KvStore::new(pool)
    }

    fn appointment() -> Appointment {
        Appointment {
            id: "1700000000000".to_string(),
            patient_id: "7".to_string(),
            patient_name: "Ana Souza".to_string(),
            doctor_id: "2".to_string(),
            doctor_name: "Dr. João Silva".to_string(),
            date: "25/12/2024".to_string(),
            time: "10:00".to_string(),
            specialty: "Cardiologia".to_string(),
            status: AppointmentStatus::Pending,
            cancel_reason: None,
        }
    }

    async fn seed(store: &KvStore) {
        AppointmentRepository::new(store.clone())
            .create(appointment())
            .await
            .unwrap();
        NotificationService::new(store.clone())
            .send("7", NotificationKind::General, "t".to_string(), "m".to_string())
            .await
            .unwrap();
        SettingsService::new(store.clone())
            .update_app_settings(AppSettingsUpdate {
                theme: Some("dark".to_string()),
                ..AppSettingsUpdate::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_backup_contains_all_collections() {
        let store = create_test_store().await;
        seed(&store).await;

        let blob = BackupService::new(store).create_backup().await.unwrap();
        let envelope: BackupEnvelope = serde_json::from_str(&blob).unwrap();

        assert_eq!(envelope.payload.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(envelope.payload.appointments.len(), 1);
        assert_eq!(envelope.payload.notifications.len(), 1);
        assert_eq!(envelope.payload.settings.theme, "dark");
        assert!(!envelope.checksum.is_empty());
    }

    #[tokio::test]
    async fn test_backup_roundtrip() {
        let store = create_test_store().await;
        seed(&store).await;

        let service = BackupService::new(store.clone());
        let blob = service.create_backup().await.unwrap();

        service.clear_all().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());

        service.restore_backup(&blob).await.unwrap();

        let restored = AppointmentRepository::new(store.clone()).list().await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].patient_name, "Ana Souza");

        let settings = SettingsService::new(store).app_settings().await.unwrap();
        assert_eq!(settings.theme, "dark");
    }

    #[tokio::test]
    async fn test_restore_rejects_tampered_blob() {
        let store = create_test_store().await;
        seed(&store).await;

        let service = BackupService::new(store);
        let blob = service.create_backup().await.unwrap();

        let tampered = blob.replace("Ana Souza", "Someone Else");
        let result = service.restore_backup(&tampered).await;

        assert!(matches!(result, Err(AppError::Restore(_))));
    }

    #[tokio::test]
    async fn test_restore_rejects_garbage() {
        let store = create_test_store().await;
        let service = BackupService::new(store);

        assert!(matches!(
            service.restore_backup("not json at all").await,
            Err(AppError::Restore(_))
        ));
    }

    #[tokio::test]
    async fn test_write_backup_file_and_retention() {
        let store = create_test_store().await;
        seed(&store).await;

        let temp = TempDir::new().unwrap();
        let service = BackupService::new(store);

        let path = service.write_backup_file(temp.path()).await.unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("backup_"));

        // Simulate an over-full backups directory
        for i in 0..BACKUP_RETENTION_COUNT + 3 {
            let stale = temp.path().join(format!("backup_20200101_0000{:02}.json", i));
            fs::write(&stale, "{}").await.unwrap();
        }

        service.write_backup_file(temp.path()).await.unwrap();

        let mut remaining = 0;
        let mut entries = fs::read_dir(temp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.file_name().to_string_lossy().starts_with("backup_") {
                remaining += 1;
            }
        }
        assert_eq!(remaining, BACKUP_RETENTION_COUNT);
    }

    #[tokio::test]
    async fn test_clear_cache_keeps_domain_data() {
        let store = create_test_store().await;
        seed(&store).await;
        store.set("user", "{\"id\":\"7\"}").await.unwrap();

        let service = BackupService::new(store.clone());

        let info = service.storage_info().await.unwrap();
        assert_eq!(info.cache_size, 1);

        service.clear_cache().await.unwrap();

        assert!(store.get("user").await.unwrap().is_none());
        assert!(store.get("appointments").await.unwrap().is_some());

        let info = service.storage_info().await.unwrap();
        assert_eq!(info.cache_size, 0);
    }
}
