use anyhow::{Context, Result};
use log::info;
use serde_json::Value;

use crate::{console::Console, plus_api::PlusApi, runtime::Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub path: String,
    pub method: Method,
    pub data: Option<String>,
}

/// Calls the Enterprise API and prints the body of a successful response.
#[tracing::instrument(skip(runtime, console, api_url))]
pub async fn request<R: Runtime>(
    runtime: &R,
    console: &mut Console,
    api_url: Option<String>,
    options: RequestOptions,
) -> Result<()> {
    let api = PlusApi::from_runtime(runtime, api_url, console)?;
    let body = send(&api, console, &options).await?;
    println!("{}", body);
    Ok(())
}

/// Sends the request and renders the response body for display.
pub(crate) async fn send(
    api: &PlusApi,
    console: &mut Console,
    options: &RequestOptions,
) -> Result<String> {
    let response = match options.method {
        Method::Get => api.get(&options.path).await?,
        Method::Post => {
            let data = options.data.as_deref().unwrap_or("{}");
            let body: Value =
                serde_json::from_str(data).context("--data must be a JSON document")?;
            api.post_json(&options.path, &body).await?
        }
    };

    let response = PlusApi::check(console, response)?;
    info!("Enterprise API answered {}", response.status);

    Ok(match response.json() {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => response.body_text(),
    })
}
