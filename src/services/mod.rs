//! Services module
//!
//! Business logic services that coordinate between a UI layer and the
//! repositories.

pub mod backup;
pub mod booking;
pub mod notifications;
pub mod scheduler;
pub mod settings;
pub mod statistics;

pub use backup::BackupService;
pub use booking::BookingService;
pub use notifications::NotificationService;
pub use scheduler::SchedulerService;
pub use settings::SettingsService;
pub use statistics::StatisticsService;
