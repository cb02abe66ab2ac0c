//! Legislative item domain types.
//!
//! Bills and their dependent records (actions, text versions, cosponsors),
//! plus the deterministic status normalization applied to free-text action
//! descriptions.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BillKey;
use super::error::{Result, SyncError};

// =============================================================================
// Status Normalization
// =============================================================================

/// Closed status enumeration for legislative items.
///
/// Raw upstream action descriptions are free text; `from_action_text` maps
/// them onto this set. The mapping is lossy by design and must stay
/// deterministic: identical input always yields the same status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Introduced,
    InCommittee,
    PassedChamber,
    ResolvingDifferences,
    ToPresident,
    BecameLaw,
    Failed,
    Other,
}

impl BillStatus {
    /// Map a free-text action description onto the closed status set.
    ///
    /// Matching is keyword-based, most-terminal outcome first, so that
    /// e.g. "Passed Senate, became Public Law" resolves to `BecameLaw`.
    pub fn from_action_text(action_text: &str) -> Self {
        let text = action_text.to_lowercase();
        if text.is_empty() {
            return Self::Other;
        }

        if text.contains("became public law") || text.contains("became law") {
            return Self::BecameLaw;
        }

        if text.contains("presented to president")
            || text.contains("signed by president")
            || text.contains("approved by president")
            || text.contains("enacted")
        {
            return Self::ToPresident;
        }

        if text.contains("vetoed")
            || text.contains("failed of passage")
            || text.contains("failed to pass")
            || text.contains("rejected")
        {
            return Self::Failed;
        }

        if text.contains("conference report")
            || text.contains("conference committee")
            || text.contains("amendments between the houses")
            || text.contains("stage of disagreement")
        {
            return Self::ResolvingDifferences;
        }

        if text.contains("passed") && (text.contains("house") || text.contains("senate")) {
            return Self::PassedChamber;
        }
        // Motion outcomes often indicate passage
        if text.contains("motion to reconsider laid on the table agreed to")
            && (text.contains("house") || text.contains("senate"))
        {
            return Self::PassedChamber;
        }

        if text.contains("reported")
            || text.contains("ordered to be reported")
            || (text.contains("placed on") && text.contains("calendar"))
            || text.contains("referred to")
            || text.contains("committee")
            || text.contains("held at the desk")
        {
            return Self::InCommittee;
        }

        if text.contains("introduced") || text.contains("introduction") {
            return Self::Introduced;
        }

        Self::Other
    }

    /// Stable string form stored in the `normalized_status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Introduced => "Introduced",
            Self::InCommittee => "In Committee",
            Self::PassedChamber => "Passed Chamber",
            Self::ResolvingDifferences => "Resolving Differences",
            Self::ToPresident => "To President",
            Self::BecameLaw => "Became Law",
            Self::Failed => "Failed",
            Self::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Introduced" => Self::Introduced,
            "In Committee" => Self::InCommittee,
            "Passed Chamber" => Self::PassedChamber,
            "Resolving Differences" => Self::ResolvingDifferences,
            "To President" => Self::ToPresident,
            "Became Law" => Self::BecameLaw,
            "Failed" => Self::Failed,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Bill Number Parsing
// =============================================================================

static BILL_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)(\d+)$").expect("static regex"));

/// Split a combined bill number like `HR1234` into `("HR", "1234")`.
pub fn parse_bill_number(combined: &str) -> Result<(String, String)> {
    let trimmed = combined.trim();
    if let Some(caps) = BILL_NUMBER_RE.captures(trimmed) {
        return Ok((caps[1].to_string(), caps[2].to_string()));
    }
    Err(SyncError::Validation(format!(
        "unparseable bill number: '{combined}'"
    )))
}

/// Parse an upstream `updateDate`, which is either an RFC 3339 timestamp
/// or a bare date depending on endpoint and record age.
pub fn parse_update_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// =============================================================================
// Bill
// =============================================================================

/// A normalized legislative item as written to the relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub congress: u16,
    pub bill_type: String,
    pub number: String,
    pub title: String,
    pub sponsor_id: Option<String>,
    pub introduced_date: Option<NaiveDate>,
    pub latest_action_text: String,
    pub latest_action_date: Option<NaiveDate>,
    pub status: BillStatus,
    pub policy_area: Option<String>,
    /// Upstream watermark used by the idempotent upsert skip check.
    pub update_date: Option<DateTime<Utc>>,
}

impl Bill {
    pub fn key(&self) -> BillKey {
        BillKey::new(self.congress, &self.bill_type, &self.number)
    }

    /// Build a bill from one upstream list/detail record (already resolved
    /// to a single object by the payload layer).
    pub fn from_record(record: &Value) -> Result<Self> {
        let bill_type = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Validation("bill record missing 'type'".into()))?;
        let number = match record.get("number") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(SyncError::Validation("bill record missing 'number'".into())),
        };
        let congress = record
            .get("congress")
            .and_then(Value::as_u64)
            .ok_or_else(|| SyncError::Validation("bill record missing 'congress'".into()))?
            as u16;

        let latest_action_text = record
            .pointer("/latestAction/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let latest_action_date = record
            .pointer("/latestAction/actionDate")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Ok(Self {
            congress,
            bill_type: bill_type.to_uppercase(),
            number,
            title: record
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            sponsor_id: record
                .pointer("/sponsors/0/bioguideId")
                .and_then(Value::as_str)
                .map(String::from),
            introduced_date: record
                .get("introducedDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            status: BillStatus::from_action_text(&latest_action_text),
            latest_action_text,
            latest_action_date,
            policy_area: record
                .pointer("/policyArea/name")
                .and_then(Value::as_str)
                .map(String::from),
            update_date: record
                .get("updateDate")
                .and_then(Value::as_str)
                .and_then(parse_update_timestamp),
        })
    }
}

// =============================================================================
// Actions
// =============================================================================

/// One ordered event in a bill's history. The upstream API guarantees no
/// stable intra-day order, so `seq` records response order as the
/// tiebreaker after `action_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_date: Option<NaiveDate>,
    pub action_time: Option<String>,
    pub text: String,
    pub action_type: Option<String>,
    pub source_system: Option<String>,
    pub seq: u32,
}

impl Action {
    pub fn from_record(record: &Value, seq: u32) -> Self {
        Self {
            action_date: record
                .get("actionDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            action_time: record
                .get("actionTime")
                .and_then(Value::as_str)
                .map(String::from),
            text: record
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            action_type: record
                .get("type")
                .and_then(Value::as_str)
                .map(String::from),
            source_system: record
                .pointer("/sourceSystem/name")
                .and_then(Value::as_str)
                .map(String::from),
            seq,
        }
    }
}

// =============================================================================
// Text Versions
// =============================================================================

/// One (format, URL) rendition of a text version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub url: String,
}

/// A document rendition of a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextVersion {
    #[serde(rename = "type")]
    pub version_type: String,
    pub date: Option<NaiveDate>,
    pub formats: Vec<TextFormat>,
    /// Set when the null upstream date was backfilled with the bill's
    /// introduction date; this is treated as the initial version.
    #[serde(default)]
    pub is_initial_version: bool,
}

/// Fixed type-importance ranking; lower ranks win same-date ties and
/// denote later stages of the legislative process.
pub fn version_type_rank(version_type: &str) -> u8 {
    let t = version_type.to_lowercase();
    if t.contains("public law") {
        0
    } else if t.contains("enrolled") {
        1
    } else if t.contains("engrossed") {
        2
    } else if t.contains("placed on calendar") {
        3
    } else {
        9
    }
}

impl TextVersion {
    pub fn from_record(record: &Value) -> Self {
        let formats = record
            .get("formats")
            .and_then(Value::as_array)
            .map(|fmts| {
                fmts.iter()
                    .filter_map(|f| {
                        Some(TextFormat {
                            format_type: f.get("type")?.as_str()?.to_string(),
                            url: f.get("url")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            version_type: record
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            date: record
                .get("date")
                .and_then(Value::as_str)
                // Timestamps like "2021-12-14T05:00:00Z" carry the date prefix
                .and_then(|d| NaiveDate::parse_from_str(&d[..d.len().min(10)], "%Y-%m-%d").ok()),
            formats,
            is_initial_version: false,
        }
    }

    pub fn rank(&self) -> u8 {
        version_type_rank(&self.version_type)
    }

    /// URL of this version's XML rendition, if published.
    pub fn xml_url(&self) -> Option<&str> {
        self.formats
            .iter()
            .find(|f| f.format_type.eq_ignore_ascii_case("Formatted XML") || f.format_type == "XML")
            .map(|f| f.url.as_str())
    }
}

/// Prepare text versions for display: null dates are backfilled with the
/// bill's introduction date (marking the initial version), then the list
/// is sorted ascending by (date, type rank).
pub fn order_text_versions(versions: &mut Vec<TextVersion>, introduced_date: Option<NaiveDate>) {
    for version in versions.iter_mut() {
        if version.date.is_none()
            && let Some(introduced) = introduced_date
        {
            version.date = Some(introduced);
            version.is_initial_version = true;
        }
    }
    versions.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.rank().cmp(&b.rank()))
    });
}

// =============================================================================
// Cosponsors
// =============================================================================

/// Join attributes of a member cosponsoring a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cosponsor {
    pub bioguide_id: String,
    pub full_name: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub district: Option<u16>,
    pub sponsorship_date: Option<NaiveDate>,
}

impl Cosponsor {
    pub fn from_record(record: &Value) -> Option<Self> {
        Some(Self {
            bioguide_id: record.get("bioguideId")?.as_str()?.to_string(),
            full_name: record
                .get("fullName")
                .and_then(Value::as_str)
                .map(String::from),
            party: record.get("party").and_then(Value::as_str).map(String::from),
            state: record.get("state").and_then(Value::as_str).map(String::from),
            district: record.get("district").and_then(Value::as_u64).map(|d| d as u16),
            sponsorship_date: record
                .get("sponsorshipDate")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_became_law() {
        assert_eq!(
            BillStatus::from_action_text("Became Public Law No: 117-58."),
            BillStatus::BecameLaw
        );
    }

    #[test]
    fn test_status_closed_set_mapping() {
        let cases = [
            ("Introduced in House", BillStatus::Introduced),
            (
                "Referred to the Committee on Ways and Means",
                BillStatus::InCommittee,
            ),
            (
                "Placed on Senate Legislative Calendar under General Orders",
                BillStatus::InCommittee,
            ),
            (
                "Passed Senate without amendment by Voice Vote",
                BillStatus::PassedChamber,
            ),
            (
                "Conference report filed in House",
                BillStatus::ResolvingDifferences,
            ),
            ("Presented to President.", BillStatus::ToPresident),
            ("Vetoed by President.", BillStatus::Failed),
            ("Star Print ordered on the bill", BillStatus::Other),
        ];
        for (text, expected) in cases {
            assert_eq!(BillStatus::from_action_text(text), expected, "{text}");
        }
    }

    #[test]
    fn test_status_deterministic() {
        let text = "Passed House, then became law.";
        assert_eq!(
            BillStatus::from_action_text(text),
            BillStatus::from_action_text(text)
        );
        // Terminal outcome wins over intermediate passage
        assert_eq!(BillStatus::from_action_text(text), BillStatus::BecameLaw);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            BillStatus::Introduced,
            BillStatus::InCommittee,
            BillStatus::PassedChamber,
            BillStatus::ResolvingDifferences,
            BillStatus::ToPresident,
            BillStatus::BecameLaw,
            BillStatus::Failed,
            BillStatus::Other,
        ] {
            assert_eq!(BillStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_parse_bill_number() {
        assert_eq!(
            parse_bill_number("HR1234").unwrap(),
            ("HR".to_string(), "1234".to_string())
        );
        assert_eq!(
            parse_bill_number("sjres33").unwrap(),
            ("sjres".to_string(), "33".to_string())
        );
        assert!(parse_bill_number("1234").is_err());
        assert!(parse_bill_number("HR").is_err());
    }

    #[test]
    fn test_parse_update_timestamp() {
        let full = parse_update_timestamp("2021-06-15T14:30:00Z").unwrap();
        assert_eq!(full.date_naive().to_string(), "2021-06-15");
        let bare = parse_update_timestamp("2021-06-15").unwrap();
        assert_eq!(bare.date_naive().to_string(), "2021-06-15");
        assert!(parse_update_timestamp("not a date").is_none());
    }

    #[test]
    fn test_bill_from_record() {
        let record = json!({
            "type": "hr",
            "number": "21",
            "congress": 117,
            "title": "An Act",
            "introducedDate": "2021-01-04",
            "latestAction": {"text": "Became Public Law No: 117-1.", "actionDate": "2021-02-10"},
            "sponsors": [{"bioguideId": "A000360"}],
            "policyArea": {"name": "Health"},
            "updateDate": "2021-06-15T14:30:00Z"
        });
        let bill = Bill::from_record(&record).unwrap();
        assert_eq!(bill.key().bill_number(), "HR21");
        assert_eq!(bill.status, BillStatus::BecameLaw);
        assert_eq!(bill.policy_area.as_deref(), Some("Health"));
        assert_eq!(bill.sponsor_id.as_deref(), Some("A000360"));
    }

    #[test]
    fn test_bill_from_record_numeric_number() {
        let record = json!({"type": "s", "number": 42, "congress": 116});
        let bill = Bill::from_record(&record).unwrap();
        assert_eq!(bill.key().bill_number(), "S42");
    }

    #[test]
    fn test_text_version_ordering() {
        // Null-date Enrolled Bill backfills to the introduction date and
        // sorts first; same-date tie breaks by type-importance rank.
        let mut versions = vec![
            TextVersion {
                version_type: "Placed on Calendar Senate".into(),
                date: NaiveDate::from_ymd_opt(2021, 12, 14),
                formats: vec![],
                is_initial_version: false,
            },
            TextVersion {
                version_type: "Enrolled Bill".into(),
                date: None,
                formats: vec![],
                is_initial_version: false,
            },
            TextVersion {
                version_type: "Engrossed in Senate".into(),
                date: NaiveDate::from_ymd_opt(2021, 12, 14),
                formats: vec![],
                is_initial_version: false,
            },
        ];
        order_text_versions(&mut versions, NaiveDate::from_ymd_opt(2021, 1, 4));

        assert_eq!(versions[0].version_type, "Enrolled Bill");
        assert!(versions[0].is_initial_version);
        assert_eq!(versions[0].date, NaiveDate::from_ymd_opt(2021, 1, 4));
        assert_eq!(versions[1].version_type, "Engrossed in Senate");
        assert_eq!(versions[2].version_type, "Placed on Calendar Senate");
    }

    #[test]
    fn test_version_type_rank() {
        assert!(version_type_rank("Public Law") < version_type_rank("Enrolled Bill"));
        assert!(version_type_rank("Enrolled Bill") < version_type_rank("Engrossed in House"));
        assert!(
            version_type_rank("Engrossed in House")
                < version_type_rank("Placed on Calendar Senate")
        );
        assert_eq!(version_type_rank("Introduced in House"), 9);
    }

    #[test]
    fn test_text_version_xml_url() {
        let version = TextVersion::from_record(&json!({
            "type": "Enrolled Bill",
            "date": "2021-12-14T05:00:00Z",
            "formats": [
                {"type": "PDF", "url": "https://example.gov/hr21.pdf"},
                {"type": "Formatted XML", "url": "https://example.gov/hr21.xml"}
            ]
        }));
        assert_eq!(version.xml_url(), Some("https://example.gov/hr21.xml"));
        assert_eq!(version.date, NaiveDate::from_ymd_opt(2021, 12, 14));
    }

    #[test]
    fn test_cosponsor_from_record() {
        let record = json!({
            "bioguideId": "B000490",
            "fullName": "Rep. Bishop, Sanford D., Jr. [D-GA-2]",
            "party": "D",
            "state": "GA",
            "district": 2,
            "sponsorshipDate": "2021-01-04"
        });
        let cosponsor = Cosponsor::from_record(&record).unwrap();
        assert_eq!(cosponsor.bioguide_id, "B000490");
        assert_eq!(cosponsor.district, Some(2));
    }
}
