//! Member list fetch stage.
//!
//! Same incremental shape as the bill fetch: watermark-scoped paginated
//! list, raw staging, idempotent per-record upserts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::{FetchOptions, FetchStats};
use crate::api::ApiClient;
use crate::constants::MEMBERS_ENDPOINT;
use crate::storage::{RawStore, SharedDatabase, SyncStatus, SyncTracker, records};
use crate::types::{Member, Result};

pub struct MemberFetchStage {
    db: SharedDatabase,
    raw: RawStore,
    api: Arc<ApiClient>,
    tracker: SyncTracker,
    lookback_days: i64,
}

impl MemberFetchStage {
    pub fn new(
        db: SharedDatabase,
        raw: RawStore,
        api: Arc<ApiClient>,
        tracker: SyncTracker,
        lookback_days: i64,
    ) -> Self {
        Self {
            db,
            raw,
            api,
            tracker,
            lookback_days,
        }
    }

    pub async fn run(&self, options: &FetchOptions) -> Result<FetchStats> {
        self.tracker
            .set_status(MEMBERS_ENDPOINT, SyncStatus::InProgress, 0, None)?;

        match self.fetch_and_store(options).await {
            Ok(stats) => {
                self.tracker.set_status(
                    MEMBERS_ENDPOINT,
                    SyncStatus::Success,
                    stats.total() as u64,
                    None,
                )?;
                info!(endpoint = MEMBERS_ENDPOINT, %stats, "Member fetch complete");
                Ok(stats)
            }
            Err(e) => {
                self.tracker.set_status(
                    MEMBERS_ENDPOINT,
                    SyncStatus::Failed,
                    0,
                    Some(&e.to_string()),
                )?;
                Err(e)
            }
        }
    }

    async fn fetch_and_store(&self, options: &FetchOptions) -> Result<FetchStats> {
        let mut params: Vec<(String, String)> = Vec::new();
        if !options.force_full
            && options.start_date.is_none()
            && let Some(watermark) = self.tracker.last_successful_sync(MEMBERS_ENDPOINT)?
        {
            let from = watermark - Duration::days(self.lookback_days);
            info!(from = %from, "Running incremental member sync");
            params.push((
                "fromDateTime".into(),
                from.format("%Y-%m-%dT00:00:00Z").to_string(),
            ));
        } else if let Some(start) = options.start_date {
            params.push(("fromDateTime".into(), format!("{start}T00:00:00Z")));
        }

        let path = match options.congress {
            Some(congress) => format!("member/congress/{congress}"),
            None => "member".to_string(),
        };

        let mut member_records = self.api.get_paginated(&path, &params, "members").await?;
        if let Some(limit) = options.limit {
            member_records.truncate(limit);
        }
        info!(count = member_records.len(), "Fetched member records");

        let fetched_at = Utc::now();
        self.raw.save(
            &json!({"members": member_records, "fetchDate": fetched_at.to_rfc3339()}),
            &[
                "member",
                "list",
                &format!("members_{}.json", fetched_at.format("%Y%m%d_%H%M%S")),
            ],
        )?;

        let mut stats = FetchStats::default();
        for record in &member_records {
            let Some(member) = Member::from_record(record) else {
                warn!("Member record missing bioguide id, skipping");
                stats.errors += 1;
                continue;
            };
            match self
                .db
                .transaction(|conn| records::upsert_member(conn, &member))
            {
                Ok(records::UpsertOutcome::Inserted) => stats.inserted += 1,
                Ok(records::UpsertOutcome::Updated) => stats.updated += 1,
                Ok(records::UpsertOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!(member = %member.bioguide_id, error = %e, "Failed to upsert member");
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }
}
