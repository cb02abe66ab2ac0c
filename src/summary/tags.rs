//! Tag validation against the known vocabulary.
//!
//! AI-returned tags are normalized and checked against the Tag/Tag-Type
//! vocabulary. Unrecognized tags are either rejected or queued for
//! operator review, depending on configuration; they are never silently
//! inserted as a new category.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::processor::TagPair;
use crate::types::{TagRecord, normalize_tag_name};

/// What to do with an AI-returned tag outside the known vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTagPolicy {
    /// Drop the tag and log it.
    #[default]
    Reject,
    /// Hold the tag in the review queue for an operator decision.
    Queue,
}

/// One accepted tag, resolved to its vocabulary row.
#[derive(Debug, Clone)]
pub struct AcceptedTag {
    pub tag_id: i64,
    pub category: String,
    pub value: String,
}

/// Outcome of validating a batch of AI-returned tags.
#[derive(Debug, Default)]
pub struct TagValidation {
    pub accepted: Vec<AcceptedTag>,
    pub unknown: Vec<TagPair>,
}

/// Validator over a snapshot of the tag vocabulary.
pub struct TagValidator {
    /// (normalized category, normalized value) -> tag id
    by_key: HashMap<(String, String), i64>,
    categories: HashSet<String>,
}

impl TagValidator {
    pub fn new(vocabulary: Vec<TagRecord>) -> Self {
        let mut by_key = HashMap::with_capacity(vocabulary.len());
        let mut categories = HashSet::new();
        for record in vocabulary {
            categories.insert(record.type_name.clone());
            by_key.insert((record.type_name, record.normalized_name), record.id);
        }
        Self { by_key, categories }
    }

    /// Category names the AI is allowed to use. The upstream-fed policy
    /// area type is excluded; it is not an extraction target.
    pub fn allowed_categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .categories
            .iter()
            .filter(|c| c.as_str() != "policy_area")
            .cloned()
            .collect();
        cats.sort();
        cats
    }

    /// Normalize and partition tags into known and unknown. Duplicate
    /// pairs collapse to one occurrence.
    pub fn validate(&self, tags: &[TagPair]) -> TagValidation {
        let mut result = TagValidation::default();
        let mut seen = HashSet::new();

        for tag in tags {
            let category = normalize_tag_name(&tag.category);
            let value = normalize_tag_name(&tag.value);
            if value.is_empty() || !seen.insert((category.clone(), value.clone())) {
                continue;
            }
            match self.by_key.get(&(category.clone(), value.clone())) {
                Some(&tag_id) => result.accepted.push(AcceptedTag {
                    tag_id,
                    category,
                    value,
                }),
                None => {
                    warn!(
                        category = %tag.category,
                        value = %tag.value,
                        "AI returned tag outside known vocabulary"
                    );
                    result.unknown.push(TagPair {
                        category,
                        value,
                    });
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TagValidator {
        TagValidator::new(vec![
            TagRecord {
                id: 1,
                type_name: "policy_areas".into(),
                name: "Healthcare".into(),
                normalized_name: "healthcare".into(),
            },
            TagRecord {
                id: 2,
                type_name: "key_topics".into(),
                name: "Funding".into(),
                normalized_name: "funding".into(),
            },
            TagRecord {
                id: 3,
                type_name: "policy_area".into(),
                name: "Health".into(),
                normalized_name: "health".into(),
            },
        ])
    }

    fn pair(category: &str, value: &str) -> TagPair {
        TagPair {
            category: category.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_known_tags_accepted_with_normalization() {
        let result = validator().validate(&[pair("Policy Areas", "Healthcare")]);
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.accepted[0].tag_id, 1);
        assert_eq!(result.accepted[0].value, "healthcare");
        assert!(result.unknown.is_empty());
    }

    #[test]
    fn test_unknown_value_partitioned() {
        let result = validator().validate(&[pair("policy_areas", "Astrology")]);
        assert!(result.accepted.is_empty());
        assert_eq!(result.unknown.len(), 1);
        assert_eq!(result.unknown[0].value, "astrology");
    }

    #[test]
    fn test_unknown_category_partitioned() {
        let result = validator().validate(&[pair("vibes", "funding")]);
        assert!(result.accepted.is_empty());
        assert_eq!(result.unknown.len(), 1);
    }

    #[test]
    fn test_duplicates_collapse() {
        let result = validator().validate(&[
            pair("key_topics", "Funding"),
            pair("Key Topics", "funding"),
        ]);
        assert_eq!(result.accepted.len(), 1);
    }

    #[test]
    fn test_allowed_categories_exclude_policy_area() {
        let cats = validator().allowed_categories();
        assert_eq!(cats, vec!["key_topics".to_string(), "policy_areas".to_string()]);
    }

    #[test]
    fn test_empty_values_dropped() {
        let result = validator().validate(&[pair("key_topics", "!!!")]);
        assert!(result.accepted.is_empty());
        assert!(result.unknown.is_empty());
    }
}
