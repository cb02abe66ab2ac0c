//! Detail payload reconciliation.
//!
//! The upstream detail endpoint returns its primary field either as a
//! single object (modern records) or as an array of repeated historical
//! entries for the same natural key (records predating the source
//! system's modernization). The shape is resolved exactly once here, so
//! downstream code only ever sees one canonical record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::error::{Result, SyncError};

/// Policy for choosing among multiple historical entries.
///
/// "Most recently updated wins" matches observed upstream behavior but is
/// not documented by the source system, so it stays configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Select the entry with the greatest `updateDate`.
    #[default]
    MostRecentUpdate,
    /// Select the first entry as returned by the upstream API.
    FirstEntry,
}

/// The two upstream shapes of a detail payload's primary field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetailPayload {
    Multiple(Vec<Value>),
    Single(Value),
}

impl DetailPayload {
    /// Extract the primary field of a detail response body.
    pub fn from_response(body: &Value, field: &str) -> Result<Self> {
        let raw = body
            .get(field)
            .ok_or_else(|| SyncError::Validation(format!("detail payload missing '{field}'")))?;
        serde_json::from_value(raw.clone()).map_err(SyncError::Json)
    }

    /// Number of upstream entries behind this payload.
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(entries) => entries.len(),
        }
    }

    /// Resolve to the single authoritative record.
    ///
    /// For the array shape the configured policy selects one entry; when
    /// more than one entry was present the choice is logged with the
    /// winning entry's update date so the selection is auditable.
    pub fn resolve(self, policy: SelectionPolicy, context: &str) -> Result<Value> {
        match self {
            Self::Single(record) => Ok(record),
            Self::Multiple(entries) if entries.is_empty() => Err(SyncError::Validation(format!(
                "empty historical entry array for {context}"
            ))),
            Self::Multiple(mut entries) => {
                let count = entries.len();
                let chosen = match policy {
                    SelectionPolicy::FirstEntry => entries.remove(0),
                    SelectionPolicy::MostRecentUpdate => entries
                        .into_iter()
                        .max_by(|a, b| update_date_of(a).cmp(&update_date_of(b)))
                        .expect("non-empty entries"),
                };
                if count > 1 {
                    info!(
                        context,
                        entries = count,
                        update_date = update_date_of(&chosen).unwrap_or_default(),
                        "Multiple historical entries found, selected one by policy"
                    );
                }
                Ok(chosen)
            }
        }
    }
}

fn update_date_of(record: &Value) -> Option<String> {
    record
        .get("updateDate")
        .and_then(Value::as_str)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_shape_passthrough() {
        let body = json!({"bill": {"type": "HR", "number": "21", "updateDate": "2023-01-01"}});
        let payload = DetailPayload::from_response(&body, "bill").unwrap();
        assert_eq!(payload.entry_count(), 1);
        let record = payload
            .resolve(SelectionPolicy::MostRecentUpdate, "117/HR21")
            .unwrap();
        assert_eq!(record["number"], "21");
    }

    #[test]
    fn test_multiple_selects_most_recent() {
        let body = json!({"bill": [
            {"type": "HR", "number": "9", "updateDate": "2020-01-01"},
            {"type": "HR", "number": "9", "updateDate": "2021-06-15"}
        ]});
        let payload = DetailPayload::from_response(&body, "bill").unwrap();
        assert_eq!(payload.entry_count(), 2);
        let record = payload
            .resolve(SelectionPolicy::MostRecentUpdate, "12/HR9")
            .unwrap();
        assert_eq!(record["updateDate"], "2021-06-15");
    }

    #[test]
    fn test_multiple_first_entry_policy() {
        let body = json!({"bill": [
            {"updateDate": "2020-01-01"},
            {"updateDate": "2021-06-15"}
        ]});
        let payload = DetailPayload::from_response(&body, "bill").unwrap();
        let record = payload
            .resolve(SelectionPolicy::FirstEntry, "12/HR9")
            .unwrap();
        assert_eq!(record["updateDate"], "2020-01-01");
    }

    #[test]
    fn test_empty_array_rejected() {
        let body = json!({"bill": []});
        let payload = DetailPayload::from_response(&body, "bill").unwrap();
        assert!(
            payload
                .resolve(SelectionPolicy::MostRecentUpdate, "12/HR9")
                .is_err()
        );
    }

    #[test]
    fn test_missing_field_rejected() {
        let body = json!({"request": {}});
        assert!(DetailPayload::from_response(&body, "bill").is_err());
    }

    #[test]
    fn test_entries_without_update_date_still_resolve() {
        let body = json!({"bill": [{"number": "1"}, {"number": "2", "updateDate": "1870-01-01"}]});
        let payload = DetailPayload::from_response(&body, "bill").unwrap();
        let record = payload
            .resolve(SelectionPolicy::MostRecentUpdate, "41/HR2")
            .unwrap();
        // A present date beats an absent one
        assert_eq!(record["number"], "2");
    }
}
