use anyhow::Result;
use log::debug;
use reqwest::Client;

use crate::{
    llm::{GeneratorProfile, OpenAiChat, Provider},
    runtime::Runtime,
};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Environment variables searched, in order, for the model provider's key.
pub const LLM_API_KEY_ENVS: [&str; 2] = ["PLUSCTL_LLM_API_KEY", "OPENAI_API_KEY"];

/// Generator settings collected from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }
}

impl GeneratorConfig {
    /// Resolves the endpoint. Ollama falls back to its local default; other
    /// non-OpenAI providers must be given a base URL.
    pub fn profile(&self) -> Result<GeneratorProfile> {
        let profile = GeneratorProfile::new(self.provider.clone(), self.model.clone());
        let base_url = match (&self.provider, &self.base_url) {
            (_, Some(url)) => Some(url.clone()),
            (Provider::OpenAi, None) => None,
            (Provider::Ollama, None) => Some(DEFAULT_OLLAMA_API_BASE.to_string()),
            (Provider::Other(name), None) => {
                anyhow::bail!("Provider '{}' requires --base-url.", name)
            }
        };
        Ok(match base_url {
            Some(url) => profile.with_api_base(url),
            None => profile,
        })
    }

    pub fn build<R: Runtime>(&self, runtime: &R) -> Result<OpenAiChat> {
        let profile = self.profile()?;
        let api_key = LLM_API_KEY_ENVS
            .iter()
            .find_map(|key| runtime.env_var(key).ok().filter(|v| !v.trim().is_empty()));

        if api_key.is_none() && profile.provider == Provider::OpenAi {
            anyhow::bail!(
                "No model provider API key found. Set {} or {}.",
                LLM_API_KEY_ENVS[0],
                LLM_API_KEY_ENVS[1]
            );
        }
        debug!(
            "Generator {} / {} at {}",
            profile.provider,
            profile.model,
            profile.api_base.as_deref().unwrap_or("default endpoint")
        );

        let client = Client::builder()
            .user_agent(concat!("plusctl/", env!("PLUSCTL_VERSION")))
            .build()?;
        Ok(OpenAiChat::new(client, profile, api_key))
    }
}
