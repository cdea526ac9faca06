//! Application configuration constants
//!
//! Central location for storage keys, resource limits and validation
//! boundaries used throughout the crate.

// ===== Storage Keys =====

/// Key holding the JSON array of all appointments
pub const APPOINTMENTS_KEY: &str = "appointments";
/// Key holding the JSON array of all registered users
pub const USERS_KEY: &str = "users";
/// Key holding the JSON array of all notifications
pub const NOTIFICATIONS_KEY: &str = "notifications";
/// Key holding the current-user snapshot used for offline profile restore
pub const CURRENT_USER_KEY: &str = "user";
/// Key holding the single application settings document
pub const SETTINGS_KEY: &str = "settings";

// ===== Storage Limits =====

/// Upper bound on any single storage operation. A stalled store must
/// surface a transient error instead of blocking the caller forever.
pub const STORAGE_TIMEOUT_SECS: u64 = 5;

// ===== Notification Polling =====

/// Interval between unread-count polls, in seconds
pub const UNREAD_POLL_INTERVAL_SECS: u64 = 30;

// ===== Validation Boundaries =====

/// Appointment dates are free-text but must parse with this format
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Appointment times are free-text but must parse with this format
pub const TIME_FORMAT: &str = "%H:%M";

/// Maximum length for user-provided names
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length for a cancellation reason
pub const MAX_CANCEL_REASON_LENGTH: usize = 500;

// ===== Auto-Backup =====

/// Number of snapshot files kept on disk by the auto-backup scheduler
pub const BACKUP_RETENTION_COUNT: usize = 10;

/// Snapshot format version written into every backup blob
pub const BACKUP_VERSION: &str = env!("CARGO_PKG_VERSION");
