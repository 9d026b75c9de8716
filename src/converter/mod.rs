//! Bounded conversion of free text into structured data.
//!
//! A [`Converter`] asks a [`Generator`] to turn text into a value of a
//! [`TargetSchema`]. Each attempt re-issues the full generation call; after
//! `max_attempts` failures the caller gets a [`ConversionError`].

mod error;
mod parser;
mod schema;

use anyhow::{Context, Result};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

use crate::llm::{Generator, GeneratorProfile, Message};

pub use error::ConversionError;
pub use parser::{ParseError, SchemaOutputParser, extract_json_object};
pub use schema::{TargetSchema, default_instructions};

/// Attempts made when the caller does not say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How a conversion obtains structured output from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The provider constrains its own output to the schema.
    Native,
    /// Prompt with instructions and parse the free-text reply.
    Prompted,
}

impl Strategy {
    pub fn for_generator(profile: &GeneratorProfile) -> Self {
        if profile.supports_native_structured_output() {
            Strategy::Native
        } else {
            Strategy::Prompted
        }
    }
}

pub struct Converter<'a, G: Generator + ?Sized> {
    generator: &'a G,
    text: String,
    schema: TargetSchema,
    instructions: String,
    max_attempts: u32,
    strategy: Strategy,
}

impl<'a, G: Generator + ?Sized> Converter<'a, G> {
    pub fn new(generator: &'a G, text: impl Into<String>, schema: TargetSchema) -> Self {
        let instructions = default_instructions(&schema);
        let strategy = Strategy::for_generator(generator.profile());
        debug!(
            "Converter for {} using {:?} strategy with {}",
            schema.name,
            strategy,
            generator.profile().model
        );
        Self {
            generator,
            text: text.into(),
            schema,
            instructions,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strategy,
        }
    }

    /// Zero is treated as one: the first attempt always runs.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Converts the text into an instance of `T`.
    #[tracing::instrument(skip(self), fields(schema = %self.schema.name))]
    pub async fn to_schema<T: DeserializeOwned>(&self) -> Result<T, ConversionError> {
        self.run_attempts("Conversion to schema", move || self.attempt::<T>())
            .await
            .map_err(|(e, attempts)| {
                let message = format!(
                    "Failed to convert text into a structured model due to the following error: {:#}",
                    e
                );
                ConversionError::new(message, attempts)
            })
    }

    /// Converts the text into JSON text.
    #[tracing::instrument(skip(self), fields(schema = %self.schema.name))]
    pub async fn to_json(&self) -> Result<String, ConversionError> {
        let attempt = move || async move {
            let value = self.attempt::<Value>().await?;
            serde_json::to_string(&value).context("Failed to serialize converted value")
        };
        self.run_attempts("Conversion to JSON", attempt)
            .await
            .map_err(|(e, attempts)| {
                debug!("Last JSON conversion error: {:#}", e);
                ConversionError::new("Failed to convert text into JSON.", attempts)
            })
    }

    fn messages(&self) -> [Message; 2] {
        [
            Message::system(self.instructions.as_str()),
            Message::user(self.text.as_str()),
        ]
    }

    /// One full generation call plus parsing. The result is checked against
    /// the target schema whichever strategy produced it.
    async fn attempt<T: DeserializeOwned>(&self) -> Result<T> {
        let parser = SchemaOutputParser::<T>::for_schema(&self.schema)?;
        let messages = self.messages();
        let parsed = match self.strategy {
            Strategy::Native => {
                let value = self
                    .generator
                    .generate_structured(&self.schema.name, &self.schema.schema, &messages)
                    .await?;
                parser.parse_value(value)
            }
            Strategy::Prompted => {
                let raw = self.generator.generate_text(&messages).await?;
                parser.parse(&raw)
            }
        };
        Ok(parsed?)
    }

    /// Runs `attempt` until it succeeds or the attempts are used up.
    /// On failure returns the last error and the number of attempts made.
    async fn run_attempts<T, F, Fut>(
        &self,
        operation_name: &str,
        attempt: F,
    ) -> std::result::Result<T, (anyhow::Error, u32)>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut current = 1;

        loop {
            match attempt().await {
                Ok(value) => {
                    debug!("{}: succeeded on attempt {}/{}", operation_name, current, max_attempts);
                    return Ok(value);
                }
                Err(e) if current < max_attempts => {
                    warn!(
                        "{}: attempt {}/{} failed ({:#}), retrying...",
                        operation_name, current, max_attempts, e
                    );
                    current += 1;
                }
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed ({:#}), giving up",
                        operation_name, current, max_attempts, e
                    );
                    return Err((e, current));
                }
            }
        }
    }
}

/// Converts `text` into `T` with a fresh converter.
pub async fn convert_to_schema<T, G>(
    text: &str,
    generator: &G,
    max_attempts: u32,
) -> Result<T, ConversionError>
where
    T: DeserializeOwned + JsonSchema,
    G: Generator + ?Sized,
{
    Converter::new(generator, text, TargetSchema::of::<T>())
        .with_max_attempts(max_attempts)
        .to_schema()
        .await
}

/// Converts `text` into JSON text shaped by `schema`.
pub async fn convert_to_json<G>(
    text: &str,
    schema: TargetSchema,
    generator: &G,
    max_attempts: u32,
) -> Result<String, ConversionError>
where
    G: Generator + ?Sized,
{
    Converter::new(generator, text, schema)
        .with_max_attempts(max_attempts)
        .to_json()
        .await
}
