//! AI Processor Abstraction
//!
//! Defines the `AiProcessor` trait every summarization provider
//! implements, the structured-output response contract, and the factory
//! selecting a concrete provider from configuration.
//!
//! Every provider must constrain its call (via the provider's native
//! schema or tool-calling mechanism) to return exactly a JSON object of
//! the shape `{summary: string, tags: [{category, value}]}`. A response
//! failing schema validation is a hard failure, never coerced.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::tags::UnknownTagPolicy;
use crate::types::{Result, SyncError};

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for AI providers, populated from the `[ai]` config
/// section. Provider identity is a configuration choice, never hardcoded
/// at a call site.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    /// Provider type: "anthropic" or "openai"
    pub provider: String,
    /// Model name (provider-specific default when unset)
    pub model: Option<String>,
    /// API key; falls back to the provider's usual environment variable.
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL override (custom endpoints, test stubs)
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// What to do with AI-returned tags outside the known vocabulary
    pub unknown_tag_policy: UnknownTagPolicy,
}

impl std::fmt::Debug for AiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("unknown_tag_policy", &self.unknown_tag_policy)
            .finish()
    }
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            api_key: None,
            api_base: None,
            timeout_secs: 120,
            max_tokens: 4096,
            unknown_tag_policy: UnknownTagPolicy::default(),
        }
    }
}

// =============================================================================
// Response Contract
// =============================================================================

/// One (category, value) tag pair returned by the AI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagPair {
    pub category: String,
    pub value: String,
}

/// The complete structured response: summary text plus extracted tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryOutput {
    pub summary: String,
    pub tags: Vec<TagPair>,
}

/// JSON Schema the AI call is constrained to.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "Concise summary of the bill's key points and objectives"
            },
            "tags": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "Tag category the value belongs to"
                        },
                        "value": {
                            "type": "string",
                            "description": "Tag value within the category"
                        }
                    },
                    "required": ["category", "value"],
                    "additionalProperties": false
                },
                "description": "Classification tags drawn from the allowed categories"
            }
        },
        "required": ["summary", "tags"],
        "additionalProperties": false
    })
}

/// Validate a raw provider response against the contract.
///
/// Missing fields, wrong types, or extra fields all fail; nothing is
/// silently coerced.
pub fn validate_response(value: &Value) -> Result<SummaryOutput> {
    if !value.is_object() {
        return Err(SyncError::AiResponse(format!(
            "expected JSON object, got {}",
            match value {
                Value::Array(_) => "array",
                Value::String(_) => "string",
                Value::Number(_) => "number",
                Value::Bool(_) => "bool",
                Value::Null => "null",
                Value::Object(_) => unreachable!(),
            }
        )));
    }
    let output: SummaryOutput = serde_json::from_value(value.clone())
        .map_err(|e| SyncError::AiResponse(e.to_string()))?;
    if output.summary.trim().is_empty() {
        return Err(SyncError::AiResponse("empty summary".into()));
    }
    Ok(output)
}

/// Build the analysis prompt shared by all providers.
pub fn analysis_prompt(bill_text: &str, allowed_categories: &[String]) -> String {
    format!(
        "Analyze this legislative bill. Produce a concise summary of its key \
         points and objectives, and extract classification tags. Tags must \
         use only these categories: {}.\n\nBill text:\n{}",
        allowed_categories.join(", "),
        bill_text
    )
}

// =============================================================================
// AI Processor Trait
// =============================================================================

/// Shared processor type for the summarization pipeline.
pub type SharedProcessor = Arc<dyn AiProcessor>;

/// Provider abstraction for bill summarization with structured output.
#[async_trait]
pub trait AiProcessor: Send + Sync {
    /// One structured call producing the full `{summary, tags}` object.
    async fn analyze(&self, bill_text: &str, allowed_categories: &[String])
    -> Result<SummaryOutput>;

    /// Summary-only convenience over `analyze`.
    async fn generate_summary(&self, bill_text: &str) -> Result<String> {
        Ok(self.analyze(bill_text, &[]).await?.summary)
    }

    /// Tags-only convenience over `analyze`.
    async fn extract_tags(
        &self,
        bill_text: &str,
        allowed_categories: &[String],
    ) -> Result<Vec<TagPair>> {
        Ok(self.analyze(bill_text, allowed_categories).await?.tags)
    }

    /// Validate a raw provider response against the contract.
    fn validate_response(&self, value: &Value) -> Result<SummaryOutput> {
        validate_response(value)
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Create a processor from configuration.
pub fn create_processor(config: &AiProviderConfig) -> Result<SharedProcessor> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(super::anthropic::AnthropicProcessor::new(
            config.clone(),
        )?)),
        "openai" => Ok(Arc::new(super::openai::OpenAiProcessor::new(
            config.clone(),
        )?)),
        other => Err(SyncError::Config(format!(
            "Unknown AI provider: {other}. Supported: anthropic, openai"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_conforming_response() {
        let value = json!({
            "summary": "Funds rural broadband deployment.",
            "tags": [
                {"category": "policy_areas", "value": "infrastructure"},
                {"category": "key_topics", "value": "funding"}
            ]
        });
        let output = validate_response(&value).unwrap();
        assert_eq!(output.tags.len(), 2);
        assert_eq!(output.tags[0].category, "policy_areas");
    }

    #[test]
    fn test_validate_rejects_missing_tags() {
        let value = json!({"summary": "text only"});
        assert!(matches!(
            validate_response(&value),
            Err(SyncError::AiResponse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_tag_shape() {
        let value = json!({"summary": "s", "tags": ["infrastructure"]});
        assert!(validate_response(&value).is_err());
    }

    #[test]
    fn test_validate_rejects_extra_fields() {
        let value = json!({"summary": "s", "tags": [], "impact": "high"});
        assert!(validate_response(&value).is_err());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(validate_response(&json!(["a"])).is_err());
        assert!(validate_response(&json!("summary")).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_summary() {
        let value = json!({"summary": "   ", "tags": []});
        assert!(validate_response(&value).is_err());
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = AiProviderConfig {
            provider: "mystery".into(),
            ..AiProviderConfig::default()
        };
        assert!(matches!(
            create_processor(&config),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["summary", "tags"]);
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = AiProviderConfig {
            api_key: Some("sk-secret".into()),
            ..AiProviderConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
    }
}
