pub mod config;
pub mod cron;
pub mod db;
pub mod dune;
pub mod extract;
pub mod sync;

pub use config::Settings;
pub use cron::{CronScheduler, CronSettings};
pub use db::{MemoryStore, PostgresClient, SnapshotStore};
pub use dune::{DuneClient, QuerySource};
pub use sync::{SyncError, SyncOrchestrator, SyncReport, SyncStatus};
