//! Pipeline integration tests over fixture payloads.
//!
//! Exercises the fetch-upsert, enrichment-apply, and summarization
//! stages against an in-memory store, with a stub AI provider; no
//! network involved.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use legisync::api::{ApiClient, ApiClientConfig};
use legisync::storage::{BillDetails, Database, RawStore, SharedDatabase, records};
use legisync::summary::{
    AiProcessor, SummaryOutput, SummaryPipeline, SummaryState, UnknownTagPolicy,
    validate_response,
};
use legisync::types::bill::order_text_versions;
use legisync::types::{Action, Bill, BillKey, DetailPayload, Result, SelectionPolicy, TextVersion};

fn open_db() -> SharedDatabase {
    Arc::new(Database::open_in_memory().unwrap())
}

/// Stub provider that replays a canned JSON value through the same
/// validation gate a real provider uses.
struct StubProcessor {
    response: Value,
}

#[async_trait]
impl AiProcessor for StubProcessor {
    async fn analyze(&self, _text: &str, _categories: &[String]) -> Result<SummaryOutput> {
        validate_response(&self.response)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn summary_pipeline(db: SharedDatabase, raw_dir: &std::path::Path, response: Value) -> SummaryPipeline {
    SummaryPipeline::new(
        db,
        RawStore::new(raw_dir),
        Arc::new(ApiClient::new(&ApiClientConfig::default()).unwrap()),
        Arc::new(StubProcessor { response }),
        UnknownTagPolicy::Queue,
    )
}

fn modern_bill_record() -> Value {
    json!({
        "type": "HR",
        "number": "21",
        "congress": 117,
        "title": "An Act to improve rural broadband",
        "introducedDate": "2021-01-04",
        "latestAction": {
            "text": "Became Public Law No: 117-9.",
            "actionDate": "2021-04-14"
        },
        "sponsors": [{"bioguideId": "A000360"}],
        "policyArea": {"name": "Science, Technology, Communications"},
        "updateDate": "2021-06-15T14:30:00Z"
    })
}

#[test]
fn fetch_twice_is_idempotent() {
    let db = open_db();
    let conn = db.connection().unwrap();
    let bill = Bill::from_record(&modern_bill_record()).unwrap();

    assert_eq!(
        records::upsert_bill(&conn, &bill).unwrap(),
        records::UpsertOutcome::Inserted
    );
    // No upstream changes: second run skips everything
    assert_eq!(
        records::upsert_bill(&conn, &bill).unwrap(),
        records::UpsertOutcome::Skipped
    );
}

#[test]
fn natural_key_unique_across_case_variants() {
    let db = open_db();
    let conn = db.connection().unwrap();

    let mut record = modern_bill_record();
    record["updateDate"] = Value::Null;
    let upper = Bill::from_record(&record).unwrap();
    record["type"] = json!("hr");
    let lower = Bill::from_record(&record).unwrap();

    records::upsert_bill(&conn, &upper).unwrap();
    records::upsert_bill(&conn, &lower).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1, "hr21 and HR21 must resolve to the same row");
}

#[test]
fn historical_array_payload_resolves_to_most_recent() {
    let body = json!({"bill": [
        {"type": "HR", "number": "9", "congress": 12, "updateDate": "2020-01-01"},
        {"type": "HR", "number": "9", "congress": 12, "updateDate": "2021-06-15"}
    ]});
    let payload = DetailPayload::from_response(&body, "bill").unwrap();
    assert_eq!(payload.entry_count(), 2);

    let record = payload
        .resolve(SelectionPolicy::MostRecentUpdate, "12/HR9")
        .unwrap();
    assert_eq!(record["updateDate"], "2021-06-15");
}

#[test]
fn end_to_end_fetch_and_enrichment() {
    let db = open_db();
    let conn = db.connection().unwrap();
    let key = BillKey::new(117, "HR", "21");

    // Fetch pass: one modern bill
    let bill = Bill::from_record(&modern_bill_record()).unwrap();
    records::upsert_bill(&conn, &bill).unwrap();

    // Enrichment pass: three actions, two text versions
    let action_records = [
        json!({"actionDate": "2021-01-04", "text": "Introduced in House",
               "type": "IntroReferral"}),
        json!({"actionDate": "2021-03-20", "text": "Passed House", "type": "Floor"}),
        json!({"actionDate": "2021-04-14", "text": "Became Public Law No: 117-9.",
               "type": "President"}),
    ];
    let actions: Vec<Action> = action_records
        .iter()
        .enumerate()
        .map(|(i, a)| Action::from_record(a, i as u32))
        .collect();
    records::replace_actions(&conn, &key, &actions).unwrap();

    let mut versions: Vec<TextVersion> = [
        json!({"type": "Enrolled Bill", "date": null, "formats": []}),
        json!({"type": "Public Law", "date": "2021-04-14", "formats": []}),
    ]
    .iter()
    .map(TextVersion::from_record)
    .collect();
    order_text_versions(&mut versions, bill.introduced_date);
    records::update_bill_details(
        &conn,
        &key,
        &BillDetails {
            text_versions: Some(versions),
            ..BillDetails::default()
        },
    )
    .unwrap();

    // Exactly one item row with the normalized terminal status
    let (count, status): (i64, String) = conn
        .query_row(
            "SELECT COUNT(*), MAX(normalized_status) FROM bills",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(status, "Became Law");

    let action_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bill_actions WHERE congress = 117 AND bill_number = 'HR21'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(action_count, 3);

    let stored_versions: String = conn
        .query_row(
            "SELECT text_versions FROM bills WHERE bill_number = 'HR21'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let parsed: Vec<TextVersion> = serde_json::from_str(&stored_versions).unwrap();
    assert_eq!(parsed.len(), 2);
    // Null-date Enrolled Bill backfilled to the introduction date sorts first
    assert_eq!(parsed[0].version_type, "Enrolled Bill");
    assert!(parsed[0].is_initial_version);
}

#[tokio::test]
async fn nonconforming_ai_response_fails_before_commit() {
    let db = open_db();
    let conn = db.connection().unwrap();
    let key = BillKey::new(117, "HR", "21");
    records::upsert_bill(&conn, &Bill::from_record(&modern_bill_record()).unwrap()).unwrap();
    drop(conn);

    let raw_dir = tempfile::tempdir().unwrap();
    // Missing the required 'tags' field
    let pipeline = summary_pipeline(
        Arc::clone(&db),
        raw_dir.path(),
        json!({"summary": "a plausible but non-conforming response"}),
    );

    let outcome = pipeline
        .process_text(&key, "SECTION 1: text", "https://example.gov/hr21.xml", None)
        .await;
    assert_eq!(outcome.state, SummaryState::Failed);
    assert_eq!(outcome.failed_at, Some(SummaryState::AiResponseValidated));

    // Nothing may reach the store on a failed validation
    let conn = db.connection().unwrap();
    let summary: Option<String> = conn
        .query_row(
            "SELECT summary FROM bills WHERE bill_number = 'HR21'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(summary.is_none());
}

#[tokio::test]
async fn conforming_ai_response_commits_summary_tags_and_queue() {
    let db = open_db();
    let conn = db.connection().unwrap();
    let key = BillKey::new(117, "HR", "21");
    records::upsert_bill(&conn, &Bill::from_record(&modern_bill_record()).unwrap()).unwrap();
    drop(conn);

    let raw_dir = tempfile::tempdir().unwrap();
    let pipeline = summary_pipeline(
        Arc::clone(&db),
        raw_dir.path(),
        json!({
            "summary": "Expands rural broadband grants.",
            "tags": [
                {"category": "policy_areas", "value": "Infrastructure"},
                {"category": "key_topics", "value": "Funding"},
                {"category": "key_topics", "value": "Quantum Vibes"}
            ]
        }),
    );

    let outcome = pipeline
        .process_text(
            &key,
            "SECTION 1: text",
            "https://example.gov/hr21.xml",
            Some("https://example.gov/pl117-9.xml"),
        )
        .await;
    assert_eq!(outcome.state, SummaryState::Committed, "{:?}", outcome.error);

    let conn = db.connection().unwrap();
    let (summary, text_url, law_url): (String, String, String) = conn
        .query_row(
            "SELECT summary, text_url, law_url FROM bills WHERE bill_number = 'HR21'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(summary, "Expands rural broadband grants.");
    assert_eq!(text_url, "https://example.gov/hr21.xml");
    assert_eq!(law_url, "https://example.gov/pl117-9.xml");

    // Known tags linked; the unknown one queued, not inserted
    let tag_links: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bill_tags bt JOIN tags t ON t.id = bt.tag_id
             WHERE t.normalized_name IN ('infrastructure', 'funding')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tag_links, 2);

    let queued: (String, String) = conn
        .query_row(
            "SELECT category, value FROM tag_review_queue WHERE bill_number = 'HR21'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(queued.0, "key_topics");
    assert_eq!(queued.1, "quantum_vibes");

    let vocabulary_size: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM tags WHERE normalized_name = 'quantum_vibes'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(vocabulary_size, 0, "unknown tags must never enter the vocabulary");
}
