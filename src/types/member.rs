//! Member domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chamber of Congress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::House => "House",
            Self::Senate => "Senate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if lower.contains("house") {
            Some(Self::House)
        } else if lower.contains("senate") {
            Some(Self::Senate)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A person holding or having held office.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub bioguide_id: String,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub party: Option<String>,
    pub state: Option<String>,
    /// Null for upper-chamber members.
    pub district: Option<u16>,
    pub chamber: Option<Chamber>,
    pub current_member: bool,
    /// Upstream watermark used by the idempotent upsert skip check.
    pub update_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl Member {
    /// Build a member from one upstream list record.
    pub fn from_record(record: &Value) -> Option<Self> {
        let bioguide_id = record.get("bioguideId")?.as_str()?.to_string();
        let full_name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Name arrives as "Last, First Middle"
        let (last_name, first_name) = match full_name.split_once(',') {
            Some((last, first)) => (
                Some(last.trim().to_string()),
                Some(first.trim().to_string()),
            ),
            None => (None, None),
        };

        // The most recent term carries the current chamber
        let chamber = record
            .pointer("/terms/item")
            .and_then(Value::as_array)
            .and_then(|terms| terms.last())
            .and_then(|t| t.get("chamber"))
            .and_then(Value::as_str)
            .and_then(Chamber::parse);

        Some(Self {
            bioguide_id,
            full_name,
            first_name,
            last_name,
            party: record
                .get("partyName")
                .and_then(Value::as_str)
                .map(String::from),
            state: record.get("state").and_then(Value::as_str).map(String::from),
            district: record.get("district").and_then(Value::as_u64).map(|d| d as u16),
            chamber,
            current_member: record
                .get("currentMember")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            update_date: record
                .get("updateDate")
                .and_then(Value::as_str)
                .and_then(super::bill::parse_update_timestamp),
        })
    }
}
