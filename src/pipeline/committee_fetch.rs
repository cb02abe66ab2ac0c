//! Committee fetch stage.
//!
//! Syncs the committee roster, including the committee → subcommittee
//! hierarchy. Parents are upserted before subcommittees so the
//! self-referential parent link always resolves.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{FetchOptions, FetchStats};
use crate::api::ApiClient;
use crate::constants::COMMITTEES_ENDPOINT;
use crate::storage::{RawStore, SharedDatabase, SyncStatus, SyncTracker, records};
use crate::types::{Chamber, Committee, Result};

pub struct CommitteeFetchStage {
    db: SharedDatabase,
    raw: RawStore,
    api: Arc<ApiClient>,
    tracker: SyncTracker,
}

impl CommitteeFetchStage {
    pub fn new(
        db: SharedDatabase,
        raw: RawStore,
        api: Arc<ApiClient>,
        tracker: SyncTracker,
    ) -> Self {
        Self {
            db,
            raw,
            api,
            tracker,
        }
    }

    pub async fn run(&self, options: &FetchOptions, chamber: Option<Chamber>) -> Result<FetchStats> {
        self.tracker
            .set_status(COMMITTEES_ENDPOINT, SyncStatus::InProgress, 0, None)?;

        match self.fetch_and_store(options, chamber).await {
            Ok(stats) => {
                self.tracker.set_status(
                    COMMITTEES_ENDPOINT,
                    SyncStatus::Success,
                    stats.total() as u64,
                    None,
                )?;
                info!(endpoint = COMMITTEES_ENDPOINT, %stats, "Committee fetch complete");
                Ok(stats)
            }
            Err(e) => {
                self.tracker.set_status(
                    COMMITTEES_ENDPOINT,
                    SyncStatus::Failed,
                    0,
                    Some(&e.to_string()),
                )?;
                Err(e)
            }
        }
    }

    async fn fetch_and_store(
        &self,
        options: &FetchOptions,
        chamber: Option<Chamber>,
    ) -> Result<FetchStats> {
        let path = match chamber {
            Some(Chamber::House) => "committee/house".to_string(),
            Some(Chamber::Senate) => "committee/senate".to_string(),
            None => "committee".to_string(),
        };

        let mut committee_records = self.api.get_paginated(&path, &[], "committees").await?;
        if let Some(limit) = options.limit {
            committee_records.truncate(limit);
        }
        info!(count = committee_records.len(), "Fetched committee records");

        let fetched_at = Utc::now();
        self.raw.save(
            &json!({"committees": committee_records, "fetchDate": fetched_at.to_rfc3339()}),
            &[
                "committee",
                "list",
                &format!("committees_{}.json", fetched_at.format("%Y%m%d_%H%M%S")),
            ],
        )?;

        let mut committees: Vec<Committee> = Vec::new();
        let mut stats = FetchStats::default();
        for record in &committee_records {
            match Committee::from_record(record) {
                Some(committee) => committees.push(committee),
                None => {
                    warn!("Committee record missing system code, skipping");
                    stats.errors += 1;
                }
            }
        }
        // Parents first so subcommittee parent links resolve
        committees.sort_by_key(Committee::is_subcommittee);

        for committee in &committees {
            match self
                .db
                .transaction(|conn| records::upsert_committee(conn, committee))
            {
                Ok(records::UpsertOutcome::Inserted) => stats.inserted += 1,
                Ok(records::UpsertOutcome::Updated) => stats.updated += 1,
                Ok(records::UpsertOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!(
                        committee = %committee.system_code,
                        error = %e,
                        "Failed to upsert committee"
                    );
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }
}
