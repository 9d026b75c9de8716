//! Classification of Enterprise API error responses.
//!
//! Every failed response is turned into a [`Diagnostic`] and reported on the
//! console, after which the calling command must stop. [`validate_response`]
//! hands back a [`CommandExit`] for the caller to return as its error.

use anyhow::{Context, Result};
use log::debug;
use serde_json::{Map, Value};

use crate::console::{Console, Line, Style};

/// Exit code used for every command aborted by an API error.
pub const EXIT_FAILURE: i32 = 1;

/// Status code and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Reads the full body of a reqwest response.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        Ok(Self::new(status, body.to_vec()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Signal that the current command must terminate abnormally.
///
/// The diagnostic has already been printed when this value exists; `main`
/// exits with [`CommandExit::code`] without printing anything further.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct CommandExit {
    pub status: Option<u16>,
    pub code: i32,
    reason: String,
}

impl CommandExit {
    pub fn for_status(status: u16) -> Self {
        Self {
            status: Some(status),
            code: EXIT_FAILURE,
            reason: format!("Enterprise API request failed with status {}", status),
        }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            code: EXIT_FAILURE,
            reason: reason.into(),
        }
    }
}

/// Console lines describing a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub lines: Vec<Line>,
}

impl Diagnostic {
    /// The diagnostic as plain text, one line per entry.
    pub fn to_plain_string(&self) -> String {
        self.lines
            .iter()
            .map(Line::to_plain_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds the diagnostic for a response. Pure; same input, same output.
pub fn classify(response: &ApiResponse) -> Diagnostic {
    let json = match response.json() {
        Ok(json) => json,
        Err(e) => {
            debug!("Response body is not JSON: {}", e);
            return Diagnostic {
                lines: vec![
                    Line::styled(
                        "Failed to parse response from Enterprise API failed. Details:",
                        Style::BoldRed,
                    ),
                    Line::plain(format!("Status Code: {}", response.status)),
                    Line::plain(format!("Response:\n{}", response.body_text())),
                ],
            };
        }
    };

    let headline = |text: &str| Line::styled(text, Style::BoldRed);

    let lines = match response.status {
        400 => vec![headline(
            "Bad Request: The server could not understand the request due to invalid syntax.",
        )],
        401 => vec![headline(
            "Unauthorized: Access is denied due to invalid credentials.",
        )],
        403 => vec![headline(
            "Forbidden: You do not have permission to access this resource.",
        )],
        404 => vec![headline(
            "Not Found: The requested resource could not be found.",
        )],
        422 => {
            let mut lines = vec![headline(
                "Failed to complete operation. Please fix the following errors:",
            )];
            if let Some(fields) = json.as_object() {
                lines.extend(field_error_lines(fields));
            }
            lines
        }
        500 => vec![headline(
            "Internal Server Error: The server encountered an error and could not complete your request.",
        )],
        _ => vec![
            headline("Request to Enterprise API failed. Details:"),
            Line::plain(failure_details(&json, response)),
        ],
    };

    Diagnostic { lines }
}

/// Prints the diagnostic for `response` and returns the termination signal.
#[tracing::instrument(skip(console, response), fields(status = response.status))]
pub fn validate_response(console: &mut Console, response: &ApiResponse) -> CommandExit {
    let diagnostic = classify(response);
    console.print_lines(&diagnostic.lines);
    CommandExit::for_status(response.status)
}

/// One `* Field message` line per message, in body order.
fn field_error_lines(fields: &Map<String, Value>) -> Vec<Line> {
    let mut lines = Vec::new();
    for (field, messages) in fields {
        let messages: Vec<String> = match messages {
            Value::Array(items) => items.iter().map(display_value).collect(),
            other => vec![display_value(other)],
        };
        for message in messages {
            lines.push(
                Line::plain("* ")
                    .then(capitalize(field), Style::BoldRed)
                    .then(format!(" {}", message), Style::Plain),
            );
        }
    }
    lines
}

/// Prefers the `error` key, then `message`, then the raw body.
fn failure_details(json: &Value, response: &ApiResponse) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|key| json.get(*key))
        .find(|value| is_truthy(value))
        .map(display_value)
        .unwrap_or_else(|| response.body_text())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
