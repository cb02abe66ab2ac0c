//! Normalized record upserts.
//!
//! Every write keyed by a natural key goes through this module. Functions
//! take a `&Connection` so stages can compose them inside one
//! per-entity transaction via `Database::transaction`.
//!
//! Sub-resource lists (actions, cosponsors, subjects, sponsored and
//! cosponsored legislation) use replace semantics: the previous rows for
//! the entity are deleted and the new list inserted in the same
//! transaction, so a partial prior enrichment can never coexist with a
//! new one.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::types::bill::parse_update_timestamp;
use crate::types::{
    Action, Bill, BillKey, Committee, Cosponsor, Member, Result, SyncError, TagRecord,
    TextVersion, normalize_tag_name,
};

/// Outcome of a natural-key upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The stored record is at least as fresh as the incoming one.
    Skipped,
}

// =============================================================================
// Bills
// =============================================================================

/// Surrogate id for a bill, if present.
pub fn bill_id(conn: &Connection, key: &BillKey) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM bills WHERE congress = ?1 AND bill_number = ?2",
            params![key.congress(), key.bill_number()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Insert or update a bill from the list endpoint.
///
/// Skips when the stored upstream `update_date` is not older than the
/// incoming one, making repeat runs idempotent no-ops.
pub fn upsert_bill(conn: &Connection, bill: &Bill) -> Result<UpsertOutcome> {
    let key = bill.key();
    let existing: Option<(i64, Option<String>)> = conn
        .query_row(
            "SELECT id, update_date FROM bills WHERE congress = ?1 AND bill_number = ?2",
            params![key.congress(), key.bill_number()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    if let Some((_, Some(stored))) = &existing
        && let (Some(stored_ts), Some(incoming_ts)) =
            (parse_update_timestamp(stored), bill.update_date)
        && stored_ts >= incoming_ts
    {
        debug!(bill = %key, "Skipping bill, no upstream update");
        return Ok(UpsertOutcome::Skipped);
    }

    conn.execute(
        "INSERT INTO bills (
             congress, bill_number, bill_type, bill_title, sponsor_id,
             introduced_date, latest_action, latest_action_date,
             normalized_status, policy_area, update_date, last_updated
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT (congress, bill_number) DO UPDATE SET
             bill_title = excluded.bill_title,
             sponsor_id = excluded.sponsor_id,
             introduced_date = excluded.introduced_date,
             latest_action = excluded.latest_action,
             latest_action_date = excluded.latest_action_date,
             normalized_status = excluded.normalized_status,
             policy_area = excluded.policy_area,
             update_date = excluded.update_date,
             last_updated = excluded.last_updated",
        params![
            key.congress(),
            key.bill_number(),
            key.bill_type(),
            bill.title,
            bill.sponsor_id,
            bill.introduced_date.map(|d| d.to_string()),
            bill.latest_action_text,
            bill.latest_action_date.map(|d| d.to_string()),
            bill.status.as_str(),
            bill.policy_area,
            bill.update_date.map(|ts| ts.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )?;

    // Keep the policy-area tag association current
    if let Some(policy_area) = &bill.policy_area
        && let Some(id) = bill_id(conn, &key)?
    {
        let tag_id = get_or_create_tag(conn, "Policy Area", policy_area)?;
        link_bill_tag(conn, id, tag_id)?;
    }

    Ok(match existing {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    })
}

/// Detail-stage fields written on top of the list-stage row.
#[derive(Debug, Clone, Default)]
pub struct BillDetails {
    pub title: Option<String>,
    pub official_title: Option<String>,
    pub short_title: Option<String>,
    pub sponsor_id: Option<String>,
    pub introduced_date: Option<String>,
    pub summary: Option<String>,
    pub policy_area: Option<String>,
    pub text_versions: Option<Vec<TextVersion>>,
    pub related_bills: Option<Vec<String>>,
    pub api_url: Option<String>,
}

/// Apply detail enrichment to an existing bill row.
pub fn update_bill_details(conn: &Connection, key: &BillKey, details: &BillDetails) -> Result<()> {
    let id = bill_id(conn, key)?
        .ok_or_else(|| SyncError::NotFound(format!("bill {key} not in store")))?;

    let text_versions_json = details
        .text_versions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let related_bills_json = details
        .related_bills
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "UPDATE bills SET
             bill_title = COALESCE(?2, bill_title),
             official_title = COALESCE(?3, official_title),
             short_title = COALESCE(?4, short_title),
             sponsor_id = COALESCE(?5, sponsor_id),
             introduced_date = COALESCE(?6, introduced_date),
             summary = COALESCE(?7, summary),
             policy_area = COALESCE(?8, policy_area),
             text_versions = COALESCE(?9, text_versions),
             related_bills = COALESCE(?10, related_bills),
             api_url = COALESCE(?11, api_url),
             last_updated = ?12
         WHERE id = ?1",
        params![
            id,
            details.title,
            details.official_title,
            details.short_title,
            details.sponsor_id,
            details.introduced_date,
            details.summary,
            details.policy_area,
            text_versions_json,
            related_bills_json,
            details.api_url,
            Utc::now().to_rfc3339(),
        ],
    )?;

    if let Some(policy_area) = &details.policy_area {
        let tag_id = get_or_create_tag(conn, "Policy Area", policy_area)?;
        link_bill_tag(conn, id, tag_id)?;
    }
    Ok(())
}

/// Record the AI pipeline's output in one shot: summary text plus the
/// resolved text/law links.
pub fn set_bill_summary(
    conn: &Connection,
    key: &BillKey,
    summary: &str,
    text_url: Option<&str>,
    law_url: Option<&str>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE bills SET
             summary = ?3,
             text_url = COALESCE(?4, text_url),
             law_url = COALESCE(?5, law_url),
             last_updated = ?6
         WHERE congress = ?1 AND bill_number = ?2",
        params![
            key.congress(),
            key.bill_number(),
            summary,
            text_url,
            law_url,
            Utc::now().to_rfc3339(),
        ],
    )?;
    if changed == 0 {
        return Err(SyncError::NotFound(format!("bill {key} not in store")));
    }
    Ok(())
}

/// Replace a bill's action rows. `seq` preserves upstream response order
/// as the intra-day tiebreaker.
pub fn replace_actions(conn: &Connection, key: &BillKey, actions: &[Action]) -> Result<usize> {
    conn.execute(
        "DELETE FROM bill_actions WHERE congress = ?1 AND bill_number = ?2",
        params![key.congress(), key.bill_number()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO bill_actions (
             congress, bill_number, action_date, action_time,
             action_text, action_type, source_system, action_seq
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (congress, bill_number, action_date, action_text) DO UPDATE SET
             action_time = excluded.action_time,
             action_type = excluded.action_type,
             source_system = excluded.source_system",
    )?;
    let mut count = 0;
    for action in actions {
        count += stmt.execute(params![
            key.congress(),
            key.bill_number(),
            action.action_date.map(|d| d.to_string()),
            action.action_time,
            action.text,
            action.action_type,
            action.source_system,
            action.seq,
        ])?;
    }
    Ok(count)
}

/// Replace a bill's cosponsor rows.
pub fn replace_cosponsors(
    conn: &Connection,
    key: &BillKey,
    cosponsors: &[Cosponsor],
) -> Result<usize> {
    conn.execute(
        "DELETE FROM bill_cosponsors WHERE congress = ?1 AND bill_number = ?2",
        params![key.congress(), key.bill_number()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO bill_cosponsors (
             congress, bill_number, bioguide_id, full_name,
             party, state, district, sponsorship_date
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut count = 0;
    for cosponsor in cosponsors {
        count += stmt.execute(params![
            key.congress(),
            key.bill_number(),
            cosponsor.bioguide_id,
            cosponsor.full_name,
            cosponsor.party,
            cosponsor.state,
            cosponsor.district,
            cosponsor.sponsorship_date.map(|d| d.to_string()),
        ])?;
    }
    Ok(count)
}

/// Replace a bill's legislative-subject rows.
pub fn replace_subjects(conn: &Connection, key: &BillKey, subjects: &[String]) -> Result<usize> {
    conn.execute(
        "DELETE FROM bill_subjects WHERE congress = ?1 AND bill_number = ?2",
        params![key.congress(), key.bill_number()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO bill_subjects (congress, bill_number, subject_name)
         VALUES (?1, ?2, ?3)",
    )?;
    let mut count = 0;
    for subject in subjects {
        count += stmt.execute(params![key.congress(), key.bill_number(), subject])?;
    }
    Ok(count)
}

// =============================================================================
// Members
// =============================================================================

/// Insert or update a member, keyed by bioguide id.
pub fn upsert_member(conn: &Connection, member: &Member) -> Result<UpsertOutcome> {
    let existing: Option<Option<String>> = conn
        .query_row(
            "SELECT update_date FROM members WHERE bioguide_id = ?1",
            params![member.bioguide_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(Some(stored)) = &existing
        && let (Some(stored_ts), Some(incoming_ts)) =
            (parse_update_timestamp(stored), member.update_date)
        && stored_ts >= incoming_ts
    {
        return Ok(UpsertOutcome::Skipped);
    }

    conn.execute(
        "INSERT INTO members (
             bioguide_id, full_name, first_name, last_name, party,
             state, district, chamber, current_member, update_date, last_updated
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (bioguide_id) DO UPDATE SET
             full_name = excluded.full_name,
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             party = excluded.party,
             state = excluded.state,
             district = excluded.district,
             chamber = excluded.chamber,
             current_member = excluded.current_member,
             update_date = excluded.update_date,
             last_updated = excluded.last_updated",
        params![
            member.bioguide_id,
            member.full_name,
            member.first_name,
            member.last_name,
            member.party,
            member.state,
            member.district,
            member.chamber.map(|c| c.as_str()),
            member.current_member,
            member.update_date.map(|ts| ts.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(match existing {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    })
}

/// Replace a member's sponsored-legislation rows.
pub fn replace_sponsored(
    conn: &Connection,
    bioguide_id: &str,
    bills: &[(BillKey, Option<String>)],
) -> Result<usize> {
    conn.execute(
        "DELETE FROM sponsored_legislation WHERE bioguide_id = ?1",
        params![bioguide_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO sponsored_legislation
             (bioguide_id, congress, bill_number, introduced_date)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut count = 0;
    for (key, introduced) in bills {
        count += stmt.execute(params![
            bioguide_id,
            key.congress(),
            key.bill_number(),
            introduced,
        ])?;
    }
    Ok(count)
}

/// Replace a member's cosponsored-legislation rows.
pub fn replace_cosponsored(
    conn: &Connection,
    bioguide_id: &str,
    bills: &[(BillKey, Option<String>)],
) -> Result<usize> {
    conn.execute(
        "DELETE FROM cosponsored_legislation WHERE bioguide_id = ?1",
        params![bioguide_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO cosponsored_legislation
             (bioguide_id, congress, bill_number, cosponsored_date)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut count = 0;
    for (key, cosponsored) in bills {
        count += stmt.execute(params![
            bioguide_id,
            key.congress(),
            key.bill_number(),
            cosponsored,
        ])?;
    }
    Ok(count)
}

// =============================================================================
// Committees
// =============================================================================

/// Insert or update a committee, keyed by system code. Parents must be
/// upserted before their subcommittees for the self-reference to hold.
pub fn upsert_committee(conn: &Connection, committee: &Committee) -> Result<UpsertOutcome> {
    let existing: Option<Option<String>> = conn
        .query_row(
            "SELECT update_date FROM committees WHERE system_code = ?1",
            params![committee.system_code],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(Some(stored)) = &existing
        && let (Some(stored_ts), Some(incoming_ts)) =
            (parse_update_timestamp(stored), committee.update_date)
        && stored_ts >= incoming_ts
    {
        return Ok(UpsertOutcome::Skipped);
    }

    conn.execute(
        "INSERT INTO committees (
             system_code, name, normalized_name, chamber, committee_type,
             jurisdiction, parent_code, update_date, last_updated
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (system_code) DO UPDATE SET
             name = excluded.name,
             normalized_name = excluded.normalized_name,
             chamber = excluded.chamber,
             committee_type = excluded.committee_type,
             jurisdiction = excluded.jurisdiction,
             parent_code = excluded.parent_code,
             update_date = excluded.update_date,
             last_updated = excluded.last_updated",
        params![
            committee.system_code,
            committee.name,
            committee.normalized_name,
            committee.chamber.map(|c| c.as_str()),
            committee.committee_type,
            committee.jurisdiction,
            committee.parent_code,
            committee.update_date.map(|ts| ts.to_rfc3339()),
            Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(match existing {
        Some(_) => UpsertOutcome::Updated,
        None => UpsertOutcome::Inserted,
    })
}

// =============================================================================
// Tags
// =============================================================================

/// Look up a tag by (type, normalized name), creating it when absent.
pub fn get_or_create_tag(conn: &Connection, type_name: &str, tag_name: &str) -> Result<i64> {
    let type_id: i64 = conn
        .query_row(
            "SELECT id FROM tag_types WHERE name = ?1 OR normalized_name = ?2",
            params![type_name, normalize_tag_name(type_name)],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| SyncError::NotFound(format!("tag type '{type_name}'")))?;

    let normalized = normalize_tag_name(tag_name);
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM tags WHERE type_id = ?1 AND normalized_name = ?2",
            params![type_id, normalized],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
    {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO tags (type_id, name, normalized_name, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            type_id,
            tag_name,
            normalized,
            format!("Bills related to {tag_name}"),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Associate a bill with a tag, once.
pub fn link_bill_tag(conn: &Connection, bill_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO bill_tags (bill_id, tag_id) VALUES (?1, ?2)",
        params![bill_id, tag_id],
    )?;
    Ok(())
}

/// Replace a bill's AI-derived tag links (policy-area links are kept).
pub fn link_bill_tags(conn: &Connection, bill_id: i64, tag_ids: &[i64]) -> Result<usize> {
    conn.execute(
        "DELETE FROM bill_tags WHERE bill_id = ?1 AND tag_id IN (
             SELECT t.id FROM tags t
             JOIN tag_types tt ON tt.id = t.type_id
             WHERE tt.normalized_name != 'policy_area'
         )",
        params![bill_id],
    )?;
    for tag_id in tag_ids {
        link_bill_tag(conn, bill_id, *tag_id)?;
    }
    Ok(tag_ids.len())
}

/// The full known tag vocabulary, joined with type names.
pub fn load_tag_vocabulary(conn: &Connection) -> Result<Vec<TagRecord>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, tt.normalized_name, t.name, t.normalized_name
         FROM tags t
         JOIN tag_types tt ON tt.id = t.type_id
         ORDER BY tt.normalized_name, t.normalized_name",
    )?;
    let records = stmt
        .query_map([], |row| {
            Ok(TagRecord {
                id: row.get(0)?,
                type_name: row.get(1)?,
                name: row.get(2)?,
                normalized_name: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Queue an unrecognized AI-returned tag for operator review.
pub fn queue_tag_for_review(
    conn: &Connection,
    key: &BillKey,
    category: &str,
    value: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tag_review_queue (congress, bill_number, category, value)
         VALUES (?1, ?2, ?3, ?4)",
        params![key.congress(), key.bill_number(), category, value],
    )?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
