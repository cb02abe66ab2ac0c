pub mod database;
pub mod raw_store;
pub mod records;
pub mod sync_tracker;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use raw_store::{RawStore, StoredFile};
pub use records::{BillDetails, UpsertOutcome};
pub use sync_tracker::{SyncStateRow, SyncStatus, SyncTracker};
