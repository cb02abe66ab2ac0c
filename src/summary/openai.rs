//! OpenAI Provider
//!
//! Structured output is enforced through the Chat Completions
//! `json_schema` response format in strict mode; the message content is
//! then parsed and validated against the same contract as every other
//! provider.

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

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI Chat Completions processor with secure key handling.
pub struct OpenAiProcessor {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProcessor")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProcessor {
    pub fn new(config: AiProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                SyncError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY or provide in config".to_string(),
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
            "messages": [
                {
                    "role": "system",
                    "content": "You are a legislative analyst. Respond only with the structured analysis object."
                },
                {"role": "user", "content": prompt}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "bill_analysis",
                    "schema": response_schema(),
                    "strict": true
                }
            }
        })
    }
}

#[async_trait]
impl AiProcessor for OpenAiProcessor {
    async fn analyze(
        &self,
        bill_text: &str,
        allowed_categories: &[String],
    ) -> Result<SummaryOutput> {
        info!(model = %self.model, "Requesting bill analysis from OpenAI");

        let request = self.build_request(&analysis_prompt(bill_text, allowed_categories));
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SyncError::Provider(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Provider(format!(
                "OpenAI API error ({status}): {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse OpenAI response: {e}")))?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::AiResponse("no content in OpenAI response".into()))?;

        debug!("Validating OpenAI structured content");
        let value: Value = serde_json::from_str(content)
            .map_err(|e| SyncError::AiResponse(format!("content is not valid JSON: {e}")))?;
        validate_response(&value)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_strict_json_schema() {
        let processor = OpenAiProcessor::new(AiProviderConfig {
            api_key: Some("test-key".into()),
            ..AiProviderConfig::default()
        })
        .unwrap();
        let request = processor.build_request("prompt");
        assert_eq!(request["response_format"]["type"], "json_schema");
        assert_eq!(request["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            request["response_format"]["json_schema"]["schema"],
            response_schema()
        );
    }
}
