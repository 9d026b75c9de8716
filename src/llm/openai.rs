use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, trace};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Generator, GeneratorProfile, Message};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI and OpenAI-compatible servers.
pub struct OpenAiChat {
    client: Client,
    profile: GeneratorProfile,
    api_key: Option<String>,
}

impl OpenAiChat {
    #[tracing::instrument(skip(client, api_key))]
    pub fn new(client: Client, profile: GeneratorProfile, api_key: Option<String>) -> Self {
        Self {
            client,
            profile,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .profile
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_API_BASE);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    async fn complete(
        &self,
        messages: &[Message],
        response_format: Option<Value>,
    ) -> Result<String> {
        let url = self.endpoint();
        let request = ChatCompletionRequest {
            model: &self.profile.model,
            messages,
            response_format,
        };

        debug!("POST {} for model {}...", url, self.profile.model);
        trace!("Chat request: {:?}", request);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to the model provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Model provider returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            );
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Chat completion response contained no content")
    }
}

/// OpenAI only accepts `[a-zA-Z0-9_-]` in schema names.
fn schema_format_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl Generator for OpenAiChat {
    fn profile(&self) -> &GeneratorProfile {
        &self.profile
    }

    #[tracing::instrument(skip(self, schema, messages))]
    async fn generate_structured(
        &self,
        schema_name: &str,
        schema: &Value,
        messages: &[Message],
    ) -> Result<Value> {
        let response_format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema_format_name(schema_name),
                "schema": schema,
            },
        });
        let content = self.complete(messages, Some(response_format)).await?;
        serde_json::from_str(&content).context("Structured output was not valid JSON")
    }

    #[tracing::instrument(skip(self, messages))]
    async fn generate_text(&self, messages: &[Message]) -> Result<String> {
        self.complete(messages, None).await
    }
}
