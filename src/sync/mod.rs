//! Sync orchestration: gate, sub-syncs and run bookkeeping.

mod error;
pub mod jobs;
mod orchestrator;
pub mod state;

pub use error::{minutes_remaining, SyncError, SyncStage};
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use state::SyncStatus;
