//! Parsing of free-form model output into schema values.

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

use super::TargetSchema;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
    #[error("invalid JSON in model output: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("model output does not match the schema: {0}")]
    SchemaMismatch(#[source] serde_json::Error),
    #[error("model output does not match the schema at '{path}': {message}")]
    SchemaViolation { path: String, message: String },
    #[error("target schema is not a valid JSON Schema: {0}")]
    InvalidSchema(String),
}

/// Parses raw model output into `T`.
///
/// The output may wrap the JSON object in a markdown code fence or in
/// surrounding prose; everything from the first `{` to the last `}` is taken
/// as the object. A parser built with [`SchemaOutputParser::for_schema`]
/// also checks the object against the JSON Schema before deserializing it.
pub struct SchemaOutputParser<T = Value> {
    validator: Option<Validator>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> SchemaOutputParser<T> {
    pub fn new() -> Self {
        Self {
            validator: None,
            _marker: PhantomData,
        }
    }

    pub fn for_schema(schema: &TargetSchema) -> Result<Self, ParseError> {
        Ok(Self {
            validator: Some(schema.validator()?),
            _marker: PhantomData,
        })
    }

    pub fn parse(&self, raw: &str) -> Result<T, ParseError> {
        self.parse_value(extract_json_object(raw)?)
    }

    /// Validates an already structured value and deserializes it.
    pub fn parse_value(&self, value: Value) -> Result<T, ParseError> {
        if let Some(validator) = &self.validator {
            if let Err(error) = validator.validate(&value) {
                return Err(violation(&error));
            }
        }
        serde_json::from_value(value).map_err(ParseError::SchemaMismatch)
    }
}

impl<T: DeserializeOwned> Default for SchemaOutputParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn violation(error: &jsonschema::ValidationError) -> ParseError {
    let path = error.instance_path().to_string();
    let path = if path == "/" || path.is_empty() {
        "root".to_string()
    } else {
        path
    };
    ParseError::SchemaViolation {
        path,
        message: error.to_string(),
    }
}

/// Finds and parses the JSON object embedded in `raw`.
pub fn extract_json_object(raw: &str) -> Result<Value, ParseError> {
    let cleaned = strip_code_fence(raw.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    let start = cleaned.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = cleaned.rfind('}').ok_or(ParseError::NoJsonObject)?;
    if end < start {
        return Err(ParseError::NoJsonObject);
    }

    serde_json::from_str(&cleaned[start..=end]).map_err(ParseError::InvalidJson)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}
