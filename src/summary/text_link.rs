//! Text version link resolution.
//!
//! Selects the document to summarize from the upstream text-versions
//! sub-resource: the most recent version by the (date, type-importance)
//! ranking, plus the "Public Law" rendition's link when the item has been
//! enacted.

use serde_json::Value;

use crate::types::TextVersion;

/// Parse the `textVersions` field of a text sub-resource response.
/// Older payloads wrap the list as `{"item": [...]}`.
pub fn parse_text_versions(body: &Value) -> Vec<TextVersion> {
    let raw = match body.get("textVersions") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Object(map)) => match map.get("item") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    raw.iter().map(TextVersion::from_record).collect()
}

/// The most recent version: later date wins, same-date ties go to the
/// more important type (Public Law > Enrolled > Engrossed > calendar).
pub fn select_latest<'a>(versions: &'a [TextVersion]) -> Option<&'a TextVersion> {
    versions.iter().min_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.rank().cmp(&b.rank()))
    })
}

/// XML link of the most recent version carrying one.
pub fn latest_text_link(versions: &[TextVersion]) -> Option<&str> {
    let mut ordered: Vec<&TextVersion> = versions.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.rank().cmp(&b.rank())));
    ordered.into_iter().find_map(|v| v.xml_url())
}

/// XML link of the "Public Law" rendition, when the item became law.
pub fn law_text_link(versions: &[TextVersion]) -> Option<&str> {
    versions
        .iter()
        .filter(|v| v.version_type.to_lowercase().contains("public law"))
        .find_map(|v| v.xml_url())
}
