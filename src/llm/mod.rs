//! Text-generation boundary.
//!
//! The converter only talks to a [`Generator`]. [`OpenAiChat`] is the one
//! shipped implementation and speaks the OpenAI chat-completions protocol,
//! which also covers self-hosted servers exposing the same API.

mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use openai::{DEFAULT_OPENAI_API_BASE, OpenAiChat};

/// Model provider family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Ollama,
    Other(String),
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
            Provider::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            anyhow::bail!("Provider name must not be empty.")
        }
        Ok(match name.to_ascii_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "ollama" => Provider::Ollama,
            other => Provider::Other(other.to_string()),
        })
    }
}

/// Static configuration of a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorProfile {
    pub provider: Provider,
    pub model: String,
    /// Custom API base URL. `None` means the provider's public endpoint.
    pub api_base: Option<String>,
}

impl GeneratorProfile {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_base: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Whether the generator is the public OpenAI endpoint, which supports
    /// JSON-schema constrained output.
    pub fn supports_native_structured_output(&self) -> bool {
        self.provider == Provider::OpenAi && self.api_base.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    fn profile(&self) -> &GeneratorProfile;

    /// Generates a JSON value constrained to `schema` by the provider itself.
    async fn generate_structured(
        &self,
        schema_name: &str,
        schema: &Value,
        messages: &[Message],
    ) -> Result<Value>;

    /// Generates free text for a conversation.
    async fn generate_text(&self, messages: &[Message]) -> Result<String>;
}
