//! Anthropic Provider
//!
//! Structured output is enforced through forced tool use: the model must
//! call a single tool whose input schema is the response contract, so the
//! returned `input` object either matches the schema or fails validation.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::processor::{
    AiProcessor, AiProviderConfig, SummaryOutput, analysis_prompt, response_schema,
    validate_response,
};
use crate::types::{Result, SyncError};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const TOOL_NAME: &str = "record_bill_analysis";

/// Anthropic Messages API processor with secure key handling.
pub struct AnthropicProcessor {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProcessor")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicProcessor {
    pub fn new(config: AiProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                SyncError::Config(
                    "Anthropic API key not found. Set ANTHROPIC_API_KEY or provide in config"
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SyncError::Http)?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "tools": [{
                "name": TOOL_NAME,
                "description": "Record the structured analysis of a legislative bill",
                "input_schema": response_schema()
            }],
            "tool_choice": {"type": "tool", "name": TOOL_NAME},
            "messages": [{"role": "user", "content": prompt}]
        })
    }

    /// Pull the forced tool call's input object out of the response.
    fn extract_tool_input(body: &Value) -> Result<Value> {
        body.get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
            })
            .and_then(|block| block.get("input"))
            .cloned()
            .ok_or_else(|| SyncError::AiResponse("no tool_use block in response".into()))
    }
}

#[async_trait]
impl AiProcessor for AnthropicProcessor {
    async fn analyze(
        &self,
        bill_text: &str,
        allowed_categories: &[String],
    ) -> Result<SummaryOutput> {
        info!(model = %self.model, "Requesting bill analysis from Anthropic");

        let request = self.build_request(&analysis_prompt(bill_text, allowed_categories));
        let url = format!("{}/v1/messages", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Provider(format!("Anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Provider(format!(
                "Anthropic API error ({status}): {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse Anthropic response: {e}")))?;

        debug!("Validating Anthropic tool output");
        let input = Self::extract_tool_input(&body)?;
        validate_response(&input)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
