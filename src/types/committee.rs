//! Committee domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::member::Chamber;
use super::tags::normalize_tag_name;

/// A committee or subcommittee. `parent_code` links a subcommittee to its
/// parent, forming a two-level hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Committee {
    pub system_code: String,
    pub name: String,
    pub normalized_name: String,
    pub chamber: Option<Chamber>,
    pub committee_type: Option<String>,
    pub jurisdiction: Option<String>,
    pub parent_code: Option<String>,
    pub update_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl Committee {
    /// Build a committee from one upstream list record.
    pub fn from_record(record: &Value) -> Option<Self> {
        let system_code = record.get("systemCode")?.as_str()?.to_string();
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            normalized_name: normalize_tag_name(&name),
            name,
            system_code,
            chamber: record
                .get("chamber")
                .and_then(Value::as_str)
                .and_then(Chamber::parse),
            committee_type: record
                .get("committeeTypeCode")
                .and_then(Value::as_str)
                .map(String::from),
            jurisdiction: record
                .get("jurisdiction")
                .and_then(Value::as_str)
                .map(String::from),
            parent_code: record
                .pointer("/parent/systemCode")
                .and_then(Value::as_str)
                .map(String::from),
            update_date: record
                .get("updateDate")
                .and_then(Value::as_str)
                .and_then(super::bill::parse_update_timestamp),
        })
    }

    pub fn is_subcommittee(&self) -> bool {
        self.parent_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_committee_from_record() {
        let record = json!({
            "systemCode": "hsag00",
            "name": "Agriculture Committee",
            "chamber": "House",
            "committeeTypeCode": "Standing"
        });
        let committee = Committee::from_record(&record).unwrap();
        assert_eq!(committee.system_code, "hsag00");
        assert_eq!(committee.normalized_name, "agriculture_committee");
        assert_eq!(committee.chamber, Some(Chamber::House));
        assert!(!committee.is_subcommittee());
    }

    #[test]
    fn test_subcommittee_parent_link() {
        let record = json!({
            "systemCode": "hsag14",
            "name": "Nutrition Subcommittee",
            "parent": {"systemCode": "hsag00"}
        });
        let committee = Committee::from_record(&record).unwrap();
        assert!(committee.is_subcommittee());
        assert_eq!(committee.parent_code.as_deref(), Some("hsag00"));
    }
}
