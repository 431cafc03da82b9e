//! Hosted LLM entity model (OpenAI-compatible and Anthropic APIs).
//!
//! OpenAI and Groq share the chat-completions format. Anthropic uses the
//! messages API. Both are asked for a JSON object with an `entities` array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use veil_core::{DetectorKind, EntityKind, Error, ModelProvider, Result, SemanticModelConfig};

use crate::semantic::{EntityModel, ModelEntity};

const SYSTEM_PROMPT: &str = r#"You are a PII (Personally Identifiable Information) detection system.
Analyze the provided text and identify every instance of the requested PII types.

Respond ONLY with a valid JSON object. Do not include markdown or explanations.
The object must have a single key "entities" holding a list. Each entry MUST have:
- "text": the exact text of the PII as it appears in the input, character for character
- "label": one of the requested PII types
- "confidence": a number from 0.0 to 1.0

Example of a valid response:
{"entities": [{"text": "John Doe", "label": "PERSON", "confidence": 0.95},
              {"text": "test@example.com", "label": "EMAIL", "confidence": 0.99}]}

If no PII is found, return {"entities": []}."#;

const MAX_RESPONSE_TOKENS: usize = 2048;

/// `EntityModel` that queries a hosted LLM.
pub struct LlmEntityModel {
    client: Client,
    config: SemanticModelConfig,
}

impl LlmEntityModel {
    pub fn new(config: SemanticModelConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn user_prompt(text: &str, kinds: &[EntityKind]) -> String {
        let labels: Vec<&str> = kinds.iter().map(|k| k.label()).collect();
        format!(
            "PII types to find: [{}]\n\nText:\n{}",
            labels.join(", "),
            text
        )
    }

    async fn complete_openai_compat(&self, user: String) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(format!("Request failed: {}", e)))?;

        let parsed = read_json(response).await?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| failure("Response has no message content".into()))
    }

    async fn complete_anthropic(&self, user: String) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": MAX_RESPONSE_TOKENS,
            "temperature": 0,
            "system": SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(format!("Request failed: {}", e)))?;

        let parsed = read_json(response).await?;
        parsed["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| failure("Response has no text content".into()))
    }
}

#[async_trait]
impl EntityModel for LlmEntityModel {
    async fn find_entities(&self, text: &str, kinds: &[EntityKind]) -> Result<Vec<ModelEntity>> {
        if text.trim().is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Querying {} model {} for {} entity kinds",
            self.config.provider,
            self.config.model,
            kinds.len()
        );

        let user = Self::user_prompt(text, kinds);
        let content = match self.config.provider {
            ModelProvider::OpenAI | ModelProvider::Groq => self.complete_openai_compat(user).await?,
            ModelProvider::Anthropic => self.complete_anthropic(user).await?,
        };

        parse_entities(&content)
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value> {
    if !response.status().is_success() {
        return Err(api_error(response.status()));
    }
    response
        .json()
        .await
        .map_err(|e| failure(format!("Invalid response body: {}", e)))
}

/// Parse a model reply into entities.
///
/// Accepts `{"entities": [...]}` or a bare list, optionally wrapped in a
/// markdown code fence.
pub fn parse_entities(content: &str) -> Result<Vec<ModelEntity>> {
    let trimmed = strip_code_fence(content);
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| failure(format!("Model returned invalid JSON: {}", e)))?;

    let list = match value {
        list @ serde_json::Value::Array(_) => list,
        serde_json::Value::Object(mut map) => map
            .remove("entities")
            .ok_or_else(|| failure("Model reply has no \"entities\" key".into()))?,
        _ => return Err(failure("Model reply is not a JSON object or list".into())),
    };

    serde_json::from_value(list).map_err(|e| failure(format!("Malformed entity list: {}", e)))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Providers may echo the prompt back in error bodies, and the prompt holds
/// the document text. Only the status makes it into the error.
fn api_error(status: reqwest::StatusCode) -> Error {
    failure(format!("API error {}", status))
}

fn failure(reason: String) -> Error {
    Error::DetectorFailure {
        detector: DetectorKind::Semantic,
        reason,
    }
}
