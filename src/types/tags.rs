//! Tag domain types and name normalization.
//!
//! Tags form a two-level scheme: a tag type (e.g. "Policy Area") and a
//! tag (e.g. "Healthcare"), with uniqueness on (type, normalized name).

use serde::{Deserialize, Serialize};

/// A tag row joined with its type, as read from the vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
    pub type_name: String,
    pub name: String,
    pub normalized_name: String,
}

/// Normalize a tag name: lowercase, `&` becomes `and`, separators become
/// underscores, remaining punctuation is stripped, underscore runs
/// collapse. Idempotent: normalizing twice yields the same string.
pub fn normalize_tag_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.to_lowercase().chars() {
        match c {
            '&' => {
                if !last_was_sep {
                    out.push('_');
                }
                out.push_str("and");
                out.push('_');
                last_was_sep = true;
            }
            c if c.is_alphanumeric() => {
                out.push(c);
                last_was_sep = false;
            }
            ' ' | ',' | '-' | '_' | '/' => {
                if !last_was_sep {
                    out.push('_');
                }
                last_was_sep = true;
            }
            // any other punctuation is dropped
            _ => {}
        }
    }
    out.trim_matches('_').to_string()
}
