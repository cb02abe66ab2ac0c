//! Sync State Tracker
//!
//! One `sync_status` row per logical endpoint records the last run's
//! status and the last *successful* watermark. Stages mark a run
//! `in_progress` before work begins and `success`/`failed` after.
//!
//! Incremental scope is always derived from `last_success_timestamp`,
//! which only a successful run advances. A crash that leaves a stale
//! `in_progress` row therefore never causes the next run to trust a
//! partial offset and silently skip records.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::database::SharedDatabase;
use crate::types::Result;

/// Status of an endpoint's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    InProgress,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A full sync-state row, for the status display.
#[derive(Debug, Clone)]
pub struct SyncStateRow {
    pub endpoint: String,
    pub last_sync_timestamp: String,
    pub last_success_timestamp: Option<String>,
    pub last_successful_offset: u64,
    pub status: String,
    pub last_error: Option<String>,
}

/// Repository over the `sync_status` table. Injected into each stage so
/// tests can run against an in-memory database.
#[derive(Clone)]
pub struct SyncTracker {
    db: SharedDatabase,
}

impl SyncTracker {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Watermark of the last successful run, if any. Rows left
    /// `in_progress` or `failed` by a prior run do not move this.
    pub fn last_successful_sync(&self, endpoint: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.db.connection()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_success_timestamp FROM sync_status WHERE endpoint = ?1",
                params![endpoint],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(raw.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|ts| ts.with_timezone(&Utc))
        }))
    }

    /// Record a run-status transition for an endpoint.
    pub fn set_status(
        &self,
        endpoint: &str,
        status: SyncStatus,
        offset: u64,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let success_ts = (status == SyncStatus::Success).then_some(now.clone());
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO sync_status (
                 endpoint, last_sync_timestamp, last_success_timestamp,
                 last_successful_offset, status, last_error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (endpoint) DO UPDATE SET
                 last_sync_timestamp = excluded.last_sync_timestamp,
                 last_success_timestamp =
                     COALESCE(excluded.last_success_timestamp, last_success_timestamp),
                 last_successful_offset = excluded.last_successful_offset,
                 status = excluded.status,
                 last_error = excluded.last_error",
            params![
                endpoint,
                now,
                success_ts,
                offset as i64,
                status.as_str(),
                error
            ],
        )?;
        debug!(endpoint, status = status.as_str(), offset, "Sync status updated");
        Ok(())
    }

    /// All sync-state rows, for the status command.
    pub fn all(&self) -> Result<Vec<SyncStateRow>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT endpoint, last_sync_timestamp, last_success_timestamp,
                    last_successful_offset, status, last_error
             FROM sync_status ORDER BY endpoint",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SyncStateRow {
                    endpoint: row.get(0)?,
                    last_sync_timestamp: row.get(1)?,
                    last_success_timestamp: row.get(2)?,
                    last_successful_offset: row.get::<_, i64>(3)? as u64,
                    status: row.get(4)?,
                    last_error: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn tracker() -> SyncTracker {
        SyncTracker::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_no_prior_sync_means_full() {
        let t = tracker();
        assert!(t.last_successful_sync("bill").unwrap().is_none());
    }

    #[test]
    fn test_success_advances_watermark() {
        let t = tracker();
        t.set_status("bill", SyncStatus::InProgress, 0, None).unwrap();
        assert!(t.last_successful_sync("bill").unwrap().is_none());

        t.set_status("bill", SyncStatus::Success, 250, None).unwrap();
        assert!(t.last_successful_sync("bill").unwrap().is_some());
    }

    #[test]
    fn test_stale_in_progress_does_not_move_watermark() {
        let t = tracker();
        t.set_status("bill", SyncStatus::Success, 0, None).unwrap();
        let watermark = t.last_successful_sync("bill").unwrap().unwrap();

        // Simulated crash: a later run dies mid-fetch at offset 500
        t.set_status("bill", SyncStatus::InProgress, 500, None)
            .unwrap();
        let after_crash = t.last_successful_sync("bill").unwrap().unwrap();
        assert_eq!(watermark, after_crash);

        // A failure report keeps the old watermark too
        t.set_status("bill", SyncStatus::Failed, 500, Some("boom"))
            .unwrap();
        assert_eq!(t.last_successful_sync("bill").unwrap().unwrap(), watermark);

        let rows = t.all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "failed");
        assert_eq!(rows[0].last_error.as_deref(), Some("boom"));
        assert_eq!(rows[0].last_successful_offset, 500);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [SyncStatus::InProgress, SyncStatus::Success, SyncStatus::Failed] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SyncStatus::parse("bogus"), None);
    }
}
