//! Member enrichment stage.
//!
//! Associates members with the legislation they sponsored or
//! cosponsored. Both lists come from dedicated paginated sub-endpoints
//! and replace the member's join rows in one transaction.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::constants::MEMBER_DETAIL_ENDPOINT;
use crate::storage::{RawStore, SharedDatabase, SyncStatus, SyncTracker, records};
use crate::types::{BillKey, Result, SyncError};

/// Per-member enrichment report.
#[derive(Debug, Clone)]
pub struct MemberReport {
    pub bioguide_id: String,
    pub success: bool,
    pub sponsored: usize,
    pub cosponsored: usize,
    pub error: Option<String>,
}

/// Aggregate stats for an enrichment run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberEnrichStats {
    pub processed: usize,
    pub failed: usize,
}

pub struct MemberEnrichStage {
    db: SharedDatabase,
    raw: RawStore,
    api: Arc<ApiClient>,
    tracker: SyncTracker,
}

impl MemberEnrichStage {
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

    /// Members to enrich, current members first.
    pub fn worklist(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT bioguide_id FROM members
             ORDER BY current_member DESC, last_updated DESC
             LIMIT ?1",
        )?;
        let ids = stmt
            .query_map(rusqlite::params![limit as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub async fn process_batch(&self, worklist: &[String]) -> Result<MemberEnrichStats> {
        self.tracker
            .set_status(MEMBER_DETAIL_ENDPOINT, SyncStatus::InProgress, 0, None)?;

        let mut stats = MemberEnrichStats::default();
        for bioguide_id in worklist {
            let report = self.process_member(bioguide_id).await;
            if report.success {
                stats.processed += 1;
            } else {
                stats.failed += 1;
            }
        }

        self.tracker.set_status(
            MEMBER_DETAIL_ENDPOINT,
            SyncStatus::Success,
            stats.processed as u64,
            None,
        )?;
        info!(
            processed = stats.processed,
            failed = stats.failed,
            "Member enrichment complete"
        );
        Ok(stats)
    }

    /// Enrich one member. Entity-level failures land in the report.
    pub async fn process_member(&self, bioguide_id: &str) -> MemberReport {
        match self.enrich(bioguide_id).await {
            Ok((sponsored, cosponsored)) => MemberReport {
                bioguide_id: bioguide_id.to_string(),
                success: true,
                sponsored,
                cosponsored,
                error: None,
            },
            Err(e) => {
                error!(member = bioguide_id, error = %e, "Member enrichment failed");
                MemberReport {
                    bioguide_id: bioguide_id.to_string(),
                    success: false,
                    sponsored: 0,
                    cosponsored: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn enrich(&self, bioguide_id: &str) -> Result<(usize, usize)> {
        let sponsored_path = format!("member/{bioguide_id}/sponsored-legislation");
        let sponsored_raw = self
            .api
            .get_paginated(&sponsored_path, &[], "sponsoredLegislation")
            .await?;
        self.raw.save(
            &Value::Array(sponsored_raw.clone()),
            &["member", bioguide_id, "sponsored.json"],
        )?;
        let sponsored = legislation_keys(&sponsored_raw, "introducedDate");

        let cosponsored_path = format!("member/{bioguide_id}/cosponsored-legislation");
        let cosponsored_raw = self
            .api
            .get_paginated(&cosponsored_path, &[], "cosponsoredLegislation")
            .await?;
        self.raw.save(
            &Value::Array(cosponsored_raw.clone()),
            &["member", bioguide_id, "cosponsored.json"],
        )?;
        let cosponsored = legislation_keys(&cosponsored_raw, "cosponsoredDate");

        self.db.transaction(|conn| {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM members WHERE bioguide_id = ?1",
                    rusqlite::params![bioguide_id],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                return Err(SyncError::NotFound(format!(
                    "member {bioguide_id} not in store"
                )));
            }
            let s = records::replace_sponsored(conn, bioguide_id, &sponsored)?;
            let c = records::replace_cosponsored(conn, bioguide_id, &cosponsored)?;
            Ok((s, c))
        })
    }
}

/// Extract (bill key, date) pairs from a legislation list. Records
/// without a parseable key (amendments, reserved numbers) are skipped
/// with a log line.
fn legislation_keys(items: &[Value], date_field: &str) -> Vec<(BillKey, Option<String>)> {
    items
        .iter()
        .filter_map(|item| {
            let congress = item.get("congress").and_then(Value::as_u64)? as u16;
            let ty = item.get("type").and_then(Value::as_str)?;
            let number = match item.get("number")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => {
                    warn!("Legislation record with non-scalar number, skipping");
                    return None;
                }
            };
            let date = item
                .get(date_field)
                .and_then(Value::as_str)
                .map(|d| d[..d.len().min(10)].to_string());
            Some((BillKey::new(congress, ty, number), date))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legislation_keys_parse_and_skip() {
        let items = [
            json!({"congress": 117, "type": "HR", "number": "21", "introducedDate": "2021-01-04"}),
            json!({"congress": 117, "type": "S", "number": 42}),
            json!({"congress": 117, "amendmentNumber": "SA100"}),
        ];
        let keys = legislation_keys(&items, "introducedDate");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].0.bill_number(), "HR21");
        assert_eq!(keys[0].1.as_deref(), Some("2021-01-04"));
        assert_eq!(keys[1].1, None);
    }
}
