//! Bill list fetch stage.
//!
//! Streams the paginated bill list from the upstream API, stages the raw
//! response, and applies idempotent per-record upserts. Sync scope comes
//! from the tracker's last successful watermark minus a look-back window
//! unless forced full or explicitly bounded.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{FetchOptions, FetchStats};
use crate::api::ApiClient;
use crate::constants::{BILLS_ENDPOINT, is_historical_congress};
use crate::storage::{RawStore, SharedDatabase, SyncStatus, SyncTracker, records};
use crate::types::{Bill, DetailPayload, Result, SelectionPolicy};

pub struct BillFetchStage {
    db: SharedDatabase,
    raw: RawStore,
    api: Arc<ApiClient>,
    tracker: SyncTracker,
    lookback_days: i64,
    selection_policy: SelectionPolicy,
}

impl BillFetchStage {
    pub fn new(
        db: SharedDatabase,
        raw: RawStore,
        api: Arc<ApiClient>,
        tracker: SyncTracker,
        lookback_days: i64,
        selection_policy: SelectionPolicy,
    ) -> Self {
        Self {
            db,
            raw,
            api,
            tracker,
            lookback_days,
            selection_policy,
        }
    }

    /// Run one fetch pass. Updates the sync tracker around the work; a
    /// run-level failure re-raises after recording `failed`.
    pub async fn run(&self, options: &FetchOptions) -> Result<FetchStats> {
        let window_start = self.resolve_window_start(options)?;
        self.tracker
            .set_status(BILLS_ENDPOINT, SyncStatus::InProgress, 0, None)?;

        match self.fetch_and_store(options, window_start).await {
            Ok(stats) => {
                self.tracker.set_status(
                    BILLS_ENDPOINT,
                    SyncStatus::Success,
                    stats.total() as u64,
                    None,
                )?;
                info!(endpoint = BILLS_ENDPOINT, %stats, "Bill fetch complete");
                Ok(stats)
            }
            Err(e) => {
                self.tracker.set_status(
                    BILLS_ENDPOINT,
                    SyncStatus::Failed,
                    0,
                    Some(&e.to_string()),
                )?;
                Err(e)
            }
        }
    }

    /// Incremental window: last successful watermark minus the look-back
    /// window, unless the caller forced a full run or gave explicit
    /// bounds. No prior success means a full sync.
    fn resolve_window_start(
        &self,
        options: &FetchOptions,
    ) -> Result<Option<chrono::DateTime<Utc>>> {
        if options.force_full || options.start_date.is_some() || options.congress.is_some() {
            return Ok(options
                .start_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()));
        }
        match self.tracker.last_successful_sync(BILLS_ENDPOINT)? {
            Some(watermark) => {
                let from = watermark - Duration::days(self.lookback_days);
                info!(from = %from, "Running incremental sync");
                Ok(Some(from))
            }
            None => {
                info!("No previous successful sync found, running full sync");
                Ok(None)
            }
        }
    }

    async fn fetch_and_store(
        &self,
        options: &FetchOptions,
        window_start: Option<chrono::DateTime<Utc>>,
    ) -> Result<FetchStats> {
        let mut params: Vec<(String, String)> =
            vec![("sort".into(), "updateDate desc".into())];
        if let Some(from) = window_start {
            params.push((
                "fromDateTime".into(),
                from.format("%Y-%m-%dT00:00:00Z").to_string(),
            ));
        }
        if let Some(to) = options.end_date {
            params.push(("toDateTime".into(), format!("{to}T23:59:59Z")));
        }

        let path = match options.congress {
            Some(congress) => format!("bill/{congress}"),
            None => "bill".to_string(),
        };

        let mut bill_records = self.api.get_paginated(&path, &params, "bills").await?;
        if let Some(limit) = options.limit {
            bill_records.truncate(limit);
        }
        info!(count = bill_records.len(), "Fetched bill records");

        // Stage the full response before touching the relational store
        let fetched_at = Utc::now();
        self.raw.save(
            &json!({"bills": bill_records, "fetchDate": fetched_at.to_rfc3339()}),
            &[
                "bill",
                "list",
                &format!("bills_{}.json", fetched_at.format("%Y%m%d_%H%M%S")),
            ],
        )?;
        self.raw.purge_backups(crate::constants::RAW_BACKUP_RETENTION_DAYS)?;

        let mut stats = FetchStats::default();
        for record in &bill_records {
            match self.upsert_record(record) {
                Ok((outcome, historical)) => {
                    match outcome {
                        records::UpsertOutcome::Inserted => stats.inserted += 1,
                        records::UpsertOutcome::Updated => stats.updated += 1,
                        records::UpsertOutcome::Skipped => stats.skipped += 1,
                    }
                    if historical {
                        stats.historical += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to upsert bill record");
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Upsert one list record in its own transaction, so a mid-page
    /// failure only loses the in-flight record's commit.
    fn upsert_record(&self, record: &Value) -> Result<(records::UpsertOutcome, bool)> {
        // Some list payloads wrap the record under a 'bill' field, which
        // for legacy congresses may itself be an entry array.
        let resolved = if record.get("bill").is_some() {
            DetailPayload::from_response(record, "bill")?
                .resolve(self.selection_policy, "bill list record")?
        } else {
            record.clone()
        };

        let bill = Bill::from_record(&resolved)?;
        let historical = is_historical_congress(bill.congress);
        let outcome = self
            .db
            .transaction(|conn| records::upsert_bill(conn, &bill))?;
        Ok((outcome, historical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use serde_json::json;

    fn stage(db: SharedDatabase, dir: &std::path::Path) -> BillFetchStage {
        let api = Arc::new(ApiClient::new(&crate::api::ApiClientConfig::default()).unwrap());
        BillFetchStage::new(
            db.clone(),
            RawStore::new(dir),
            api,
            SyncTracker::new(db),
            7,
            SelectionPolicy::MostRecentUpdate,
        )
    }

    fn record(number: &str, update_date: &str) -> Value {
        json!({
            "type": "HR",
            "number": number,
            "congress": 117,
            "title": format!("Bill {number}"),
            "latestAction": {"text": "Introduced in House", "actionDate": "2021-01-04"},
            "updateDate": update_date
        })
    }

    #[test]
    fn test_upsert_record_idempotent() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(db.clone(), dir.path());

        let rec = record("21", "2021-06-15T14:30:00Z");
        let (first, historical) = stage.upsert_record(&rec).unwrap();
        assert_eq!(first, records::UpsertOutcome::Inserted);
        assert!(!historical);

        // Second pass with no upstream change: all skipped
        let (second, _) = stage.upsert_record(&rec).unwrap();
        assert_eq!(second, records::UpsertOutcome::Skipped);
    }

    #[test]
    fn test_upsert_wrapped_historical_array() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(db.clone(), dir.path());

        let rec = json!({"bill": [
            {"type": "HR", "number": "9", "congress": 12, "title": "Old",
             "updateDate": "2020-01-01"},
            {"type": "HR", "number": "9", "congress": 12, "title": "Older entry, newer update",
             "updateDate": "2021-06-15"}
        ]});
        let (outcome, historical) = stage.upsert_record(&rec).unwrap();
        assert_eq!(outcome, records::UpsertOutcome::Inserted);
        assert!(historical);

        let conn = db.connection().unwrap();
        let title: String = conn
            .query_row(
                "SELECT bill_title FROM bills WHERE congress = 12 AND bill_number = 'HR9'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(title, "Older entry, newer update");
    }

    #[test]
    fn test_window_prefers_explicit_dates() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(db.clone(), dir.path());

        let options = FetchOptions {
            start_date: chrono::NaiveDate::from_ymd_opt(2023, 3, 1),
            ..FetchOptions::default()
        };
        let window = stage.resolve_window_start(&options).unwrap().unwrap();
        assert_eq!(window.date_naive().to_string(), "2023-03-01");
    }

    #[test]
    fn test_window_ignores_stale_in_progress() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(db.clone(), dir.path());

        stage
            .tracker
            .set_status(BILLS_ENDPOINT, SyncStatus::Success, 0, None)
            .unwrap();
        let expected = stage
            .resolve_window_start(&FetchOptions::default())
            .unwrap()
            .unwrap();

        // A crashed later run leaves in_progress at offset 500; the
        // window must still derive from the last success.
        stage
            .tracker
            .set_status(BILLS_ENDPOINT, SyncStatus::InProgress, 500, None)
            .unwrap();
        let actual = stage
            .resolve_window_start(&FetchOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_window_full_sync_when_no_history() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(db, dir.path());
        assert!(
            stage
                .resolve_window_start(&FetchOptions::default())
                .unwrap()
                .is_none()
        );
    }
}
