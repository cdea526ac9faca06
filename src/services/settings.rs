//! Settings service
//!
//! Read-modify-write of the single application settings document, defaulting
//! to the fixed initial record when absent.

use crate::config::SETTINGS_KEY;
use crate::error::Result;
use crate::models::{AppSettings, AppSettingsUpdate};
use crate::storage::KvStore;

/// Service for the application settings record
#[derive(Clone)]
pub struct SettingsService {
    store: KvStore,
}

impl SettingsService {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Load settings, falling back to the default record when absent
    pub async fn app_settings(&self) -> Result<AppSettings> {
        Ok(self
            .store
            .get_json::<AppSettings>(SETTINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Apply a partial update and persist the merged record
    pub async fn update_app_settings(&self, update: AppSettingsUpdate) -> Result<AppSettings> {
        let mut settings = self.app_settings().await?;

        if let Some(notifications) = update.notifications {
            settings.notifications = notifications;
        }
        if let Some(auto_backup) = update.auto_backup {
            settings.auto_backup = auto_backup;
        }
        if let Some(theme) = update.theme {
            settings.theme = theme;
        }
        if let Some(language) = update.language {
            settings.language = language;
        }

        self.store.set_json(SETTINGS_KEY, &settings).await?;

        tracing::info!("Settings updated");
        Ok(settings)
    }
}
