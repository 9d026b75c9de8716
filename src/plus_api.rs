//! Enterprise API client.

use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::Value;

use crate::{
    console::{Console, Style},
    http::{ApiResponse, CommandExit, validate_response},
    runtime::Runtime,
};

pub const DEFAULT_API_URL: &str = "https://app.example.com/api";
pub const API_KEY_ENV: &str = "PLUSCTL_API_KEY";

pub struct PlusApi {
    client: Client,
    api_url: String,
}

impl PlusApi {
    /// Builds an authenticated client from `PLUSCTL_API_KEY`.
    ///
    /// Without a key the user is told how to authenticate and the command
    /// terminates with [`CommandExit`].
    #[tracing::instrument(skip(runtime, console))]
    pub fn from_runtime<R: Runtime>(
        runtime: &R,
        api_url: Option<String>,
        console: &mut Console,
    ) -> Result<Self> {
        let token = match runtime.env_var(API_KEY_ENV) {
            Ok(token) if !token.trim().is_empty() => token,
            _ => {
                console.print(
                    "Please sign up/login to the Enterprise API before using the CLI.",
                    Style::BoldRed,
                );
                console.print(
                    &format!("Set {} to authenticate.", API_KEY_ENV),
                    Style::BoldGreen,
                );
                return Err(CommandExit::with_reason("Missing Enterprise API key").into());
            }
        };

        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("API key contains invalid header characters")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("Using {} for authentication", API_KEY_ENV);

        let client = Client::builder()
            .user_agent(concat!("plusctl/", env!("PLUSCTL_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self::new(client, api_url))
    }

    pub fn new(client: Client, api_url: Option<String>) -> Self {
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        let url = self.url(path);
        debug!("GET {}...", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to Enterprise API")?;
        ApiResponse::from_reqwest(response).await
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        let url = self.url(path);
        debug!("POST {}...", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to send request to Enterprise API")?;
        ApiResponse::from_reqwest(response).await
    }

    /// Passes successful responses through; reports anything else and
    /// terminates the command.
    pub fn check(console: &mut Console, response: ApiResponse) -> Result<ApiResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(validate_response(console, &response).into())
        }
    }
}
