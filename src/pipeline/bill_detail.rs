//! Bill detail/enrichment stage.
//!
//! Fetches a bill's detail payload plus its dependent sub-resources
//! (actions, cosponsors, subjects, text versions, summaries) and applies
//! them in one transaction per bill. Several sub-resources are only
//! obtainable via dedicated calls even though the detail payload's shape
//! implies otherwise, so each has its own fetch.
//!
//! Historical records (legacy congress range) legitimately lack sponsor,
//! cosponsor, and summary data; those gaps log at debug severity and stay
//! out of the error counts.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::constants::{BILL_DETAIL_ENDPOINT, is_historical_congress};
use crate::storage::{BillDetails, RawStore, SharedDatabase, SyncStatus, SyncTracker, records};
use crate::types::bill::order_text_versions;
use crate::types::{
    Action, BillKey, Cosponsor, DetailPayload, Result, SelectionPolicy, SyncError, TextVersion,
};

/// Per-bill enrichment report.
#[derive(Debug, Clone)]
pub struct DetailReport {
    pub key: BillKey,
    pub success: bool,
    pub historical: bool,
    pub details_updated: bool,
    pub actions: usize,
    pub cosponsors: usize,
    pub subjects: usize,
    pub text_versions: usize,
    pub error: Option<String>,
}

impl DetailReport {
    fn new(key: BillKey) -> Self {
        Self {
            historical: is_historical_congress(key.congress()),
            key,
            success: true,
            details_updated: false,
            actions: 0,
            cosponsors: 0,
            subjects: 0,
            text_versions: 0,
            error: None,
        }
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Aggregate stats for a detail batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailStats {
    pub processed: usize,
    pub failed: usize,
}

/// Everything fetched for one bill before the transactional apply.
#[derive(Default)]
struct FetchedResources {
    actions: Option<Vec<Action>>,
    cosponsors: Option<Vec<Cosponsor>>,
    subjects: Option<Vec<String>>,
    text_versions: Option<Vec<TextVersion>>,
    summary: Option<String>,
}

pub struct BillDetailStage {
    db: SharedDatabase,
    raw: RawStore,
    api: Arc<ApiClient>,
    tracker: SyncTracker,
    selection_policy: SelectionPolicy,
}

impl BillDetailStage {
    pub fn new(
        db: SharedDatabase,
        raw: RawStore,
        api: Arc<ApiClient>,
        tracker: SyncTracker,
        selection_policy: SelectionPolicy,
    ) -> Self {
        Self {
            db,
            raw,
            api,
            tracker,
            selection_policy,
        }
    }

    /// Bills most recently touched by the list stage.
    pub fn recent_worklist(&self, limit: usize) -> Result<Vec<BillKey>> {
        self.keys_from_query(
            "SELECT congress, bill_number FROM bills
             ORDER BY last_updated DESC LIMIT ?1",
            limit,
        )
    }

    /// Bills missing detail or enrichment data.
    pub fn missing_worklist(&self, limit: usize) -> Result<Vec<BillKey>> {
        self.keys_from_query(
            "SELECT b.congress, b.bill_number FROM bills b
             WHERE b.text_versions IS NULL
                OR NOT EXISTS (SELECT 1 FROM bill_actions a
                               WHERE a.congress = b.congress AND a.bill_number = b.bill_number)
                OR NOT EXISTS (SELECT 1 FROM bill_subjects s
                               WHERE s.congress = b.congress AND s.bill_number = b.bill_number)
                OR (b.sponsor_id IS NOT NULL
                    AND NOT EXISTS (SELECT 1 FROM bill_cosponsors c
                                    WHERE c.congress = b.congress AND c.bill_number = b.bill_number))
             ORDER BY b.introduced_date DESC LIMIT ?1",
            limit,
        )
    }

    fn keys_from_query(&self, sql: &str, limit: usize) -> Result<Vec<BillKey>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut keys = Vec::with_capacity(rows.len());
        for (congress, bill_number) in rows {
            keys.push(BillKey::parse(congress, &bill_number)?);
        }
        Ok(keys)
    }

    /// Process a worklist, tracking the run in the sync tracker.
    pub async fn process_batch(&self, worklist: &[BillKey]) -> Result<DetailStats> {
        self.tracker
            .set_status(BILL_DETAIL_ENDPOINT, SyncStatus::InProgress, 0, None)?;

        let mut stats = DetailStats::default();
        for key in worklist {
            let report = self.process_bill(key).await;
            if report.success {
                stats.processed += 1;
            } else {
                stats.failed += 1;
            }
        }

        // Partial success is success: entity failures are counted, not fatal
        self.tracker.set_status(
            BILL_DETAIL_ENDPOINT,
            SyncStatus::Success,
            stats.processed as u64,
            None,
        )?;
        info!(
            processed = stats.processed,
            failed = stats.failed,
            "Detail batch complete"
        );
        Ok(stats)
    }

    /// Process one bill. Entity-level failures are captured in the
    /// report; they never abort a batch.
    pub async fn process_bill(&self, key: &BillKey) -> DetailReport {
        let report = DetailReport::new(key.clone());
        match self.enrich(key, report).await {
            Ok(report) => report,
            Err((report, e)) => {
                error!(bill = %key, error = %e, "Bill enrichment failed");
                report.failed(e.to_string())
            }
        }
    }

    async fn enrich(
        &self,
        key: &BillKey,
        mut report: DetailReport,
    ) -> std::result::Result<DetailReport, (DetailReport, SyncError)> {
        let congress = key.congress().to_string();
        let path_type = key.path_type();
        let number = key.number().to_string();

        let path = format!("bill/{congress}/{path_type}/{number}");
        let body = match self.api.get(&path, &[]).await {
            Ok(body) => body,
            Err(e) => return Err((report, e)),
        };
        if let Err(e) =
            self.raw
                .save(&body, &["bill", &congress, &path_type, &number, "details.json"])
        {
            return Err((report, e));
        }

        let record = match DetailPayload::from_response(&body, "bill")
            .and_then(|p| p.resolve(self.selection_policy, &key.to_string()))
        {
            Ok(record) => record,
            Err(e) => return Err((report, e)),
        };

        // Sponsor absence is expected for the legacy range
        if record.pointer("/sponsors/0/bioguideId").is_none() {
            if report.historical {
                debug!(bill = %key, "Historical record without sponsor data, expected gap");
            } else {
                warn!(bill = %key, "Modern record missing sponsor data");
            }
        }

        let resources = self.fetch_sub_resources(key, &record).await;
        let details = self.build_details(&record, &resources);

        let apply = self.db.transaction(|conn| {
            records::update_bill_details(conn, key, &details)?;
            let mut counts = (0, 0, 0);
            if let Some(actions) = &resources.actions {
                counts.0 = records::replace_actions(conn, key, actions)?;
            }
            if let Some(cosponsors) = &resources.cosponsors {
                counts.1 = records::replace_cosponsors(conn, key, cosponsors)?;
            }
            if let Some(subjects) = &resources.subjects {
                counts.2 = records::replace_subjects(conn, key, subjects)?;
            }
            Ok(counts)
        });
        match apply {
            Ok((actions, cosponsors, subjects)) => {
                report.actions = actions;
                report.cosponsors = cosponsors;
                report.subjects = subjects;
            }
            Err(e) => return Err((report, e)),
        }

        report.details_updated = true;
        report.text_versions = resources
            .text_versions
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0);
        info!(
            bill = %key,
            actions = report.actions,
            cosponsors = report.cosponsors,
            subjects = report.subjects,
            "Bill enriched"
        );
        Ok(report)
    }

    /// Stage a sub-resource response; a raw-store failure is logged but
    /// never blocks the enrichment itself.
    fn stage_raw(&self, key: &BillKey, body: &Value, segments: &[&str]) {
        if let Err(e) = self.raw.save(body, segments) {
            warn!(bill = %key, error = %e, "Failed to stage raw sub-resource");
        }
    }

    /// Fetch each dependent sub-resource through its dedicated endpoint.
    /// Individual failures log and leave that resource untouched (None),
    /// so the apply step never clobbers existing rows with a bad fetch.
    async fn fetch_sub_resources(&self, key: &BillKey, record: &Value) -> FetchedResources {
        let congress = key.congress().to_string();
        let path_type = key.path_type();
        let number = key.number().to_string();
        let mut resources = FetchedResources::default();

        if let Some(url) = record.pointer("/actions/url").and_then(Value::as_str) {
            match self.api.get(url, &[]).await {
                Ok(body) => {
                    self.stage_raw(
                        key,
                        &body,
                        &["bill", &congress, &path_type, &number, "actions.json"],
                    );
                    resources.actions = Some(
                        body.get("actions")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items
                                    .iter()
                                    .enumerate()
                                    .map(|(i, a)| Action::from_record(a, i as u32))
                                    .collect()
                            })
                            .unwrap_or_default(),
                    );
                }
                Err(e) => warn!(bill = %key, error = %e, "Failed to fetch actions"),
            }
        }

        if let Some(url) = record.pointer("/cosponsors/url").and_then(Value::as_str) {
            match self.api.get(url, &[]).await {
                Ok(body) => {
                    self.stage_raw(
                        key,
                        &body,
                        &["bill", &congress, &path_type, &number, "cosponsors.json"],
                    );
                    resources.cosponsors = Some(
                        body.get("cosponsors")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items.iter().filter_map(Cosponsor::from_record).collect()
                            })
                            .unwrap_or_default(),
                    );
                }
                Err(e) => warn!(bill = %key, error = %e, "Failed to fetch cosponsors"),
            }
        } else if report_gap_severity(key) {
            debug!(bill = %key, "Historical record without cosponsors link, expected gap");
        }

        if let Some(url) = record.pointer("/subjects/url").and_then(Value::as_str) {
            match self.api.get(url, &[]).await {
                Ok(body) => {
                    self.stage_raw(
                        key,
                        &body,
                        &["bill", &congress, &path_type, &number, "subjects.json"],
                    );
                    resources.subjects = Some(
                        body.pointer("/subjects/legislativeSubjects")
                            .and_then(Value::as_array)
                            .map(|items| {
                                items
                                    .iter()
                                    .filter_map(|s| s.get("name"))
                                    .filter_map(Value::as_str)
                                    .map(String::from)
                                    .collect()
                            })
                            .unwrap_or_default(),
                    );
                }
                Err(e) => warn!(bill = %key, error = %e, "Failed to fetch subjects"),
            }
        }

        if let Some(url) = record.pointer("/textVersions/url").and_then(Value::as_str) {
            match self.api.get(url, &[]).await {
                Ok(body) => {
                    self.stage_raw(
                        key,
                        &body,
                        &["bill", &congress, &path_type, &number, "text.json"],
                    );
                    resources.text_versions = Some(
                        crate::summary::text_link::parse_text_versions(&body),
                    );
                }
                Err(e) => warn!(bill = %key, error = %e, "Failed to fetch text versions"),
            }
        }

        if let Some(url) = record.pointer("/summaries/url").and_then(Value::as_str) {
            match self.api.get(url, &[]).await {
                Ok(body) => {
                    self.stage_raw(
                        key,
                        &body,
                        &["bill", &congress, &path_type, &number, "summaries.json"],
                    );
                    resources.summary = latest_upstream_summary(&body);
                }
                Err(e) => warn!(bill = %key, error = %e, "Failed to fetch summaries"),
            }
        } else if report_gap_severity(key) {
            debug!(bill = %key, "Historical record without summaries link, expected gap");
        }

        resources
    }

    fn build_details(&self, record: &Value, resources: &FetchedResources) -> BillDetails {
        let introduced_date = record
            .get("introducedDate")
            .and_then(Value::as_str)
            .map(String::from);

        let text_versions = resources.text_versions.clone().map(|mut versions| {
            let introduced = introduced_date
                .as_deref()
                .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            order_text_versions(&mut versions, introduced);
            versions
        });

        let titles = record.pointer("/titles/item").and_then(Value::as_array);
        let title_at = |i: usize| {
            titles
                .and_then(|t| t.get(i))
                .and_then(|t| t.get("title"))
                .and_then(Value::as_str)
                .map(String::from)
        };

        let related_bills = match record.get("relatedBills") {
            Some(Value::Array(items)) => Some(related_bill_numbers(items)),
            Some(Value::Object(map)) => map
                .get("item")
                .and_then(Value::as_array)
                .map(|items| related_bill_numbers(items)),
            _ => None,
        };

        BillDetails {
            title: record.get("title").and_then(Value::as_str).map(String::from),
            official_title: title_at(0),
            short_title: title_at(1),
            sponsor_id: record
                .pointer("/sponsors/0/bioguideId")
                .and_then(Value::as_str)
                .map(String::from),
            introduced_date,
            summary: resources.summary.clone(),
            policy_area: record
                .pointer("/policyArea/name")
                .and_then(Value::as_str)
                .map(String::from),
            text_versions,
            related_bills,
            api_url: record.get("url").and_then(Value::as_str).map(String::from),
        }
    }
}

fn report_gap_severity(key: &BillKey) -> bool {
    is_historical_congress(key.congress())
}

fn related_bill_numbers(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|rb| {
            let ty = rb.get("type")?.as_str()?;
            let number = match rb.get("number")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(format!("{}{}", ty.to_uppercase(), number))
        })
        .collect()
}

/// The most recent upstream-provided summary text, by action date.
fn latest_upstream_summary(body: &Value) -> Option<String> {
    body.get("summaries")
        .and_then(Value::as_array)?
        .iter()
        .max_by_key(|s| {
            s.get("actionDate")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .and_then(|s| s.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_upstream_summary_picks_newest() {
        let body = json!({"summaries": [
            {"actionDate": "2021-01-05", "text": "old summary"},
            {"actionDate": "2021-06-01", "text": "new summary"}
        ]});
        assert_eq!(latest_upstream_summary(&body).as_deref(), Some("new summary"));
    }

    #[test]
    fn test_latest_upstream_summary_empty() {
        assert!(latest_upstream_summary(&json!({})).is_none());
        assert!(latest_upstream_summary(&json!({"summaries": []})).is_none());
    }

    #[test]
    fn test_related_bill_numbers() {
        let items = [
            json!({"type": "hr", "number": "21"}),
            json!({"type": "S", "number": 99}),
            json!({"number": "5"}),
        ];
        assert_eq!(related_bill_numbers(&items), vec!["HR21", "S99"]);
    }
}
