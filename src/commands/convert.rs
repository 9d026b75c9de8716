use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use super::config::GeneratorConfig;
use crate::{
    console::{Console, Style},
    converter::{ConversionError, Converter, TargetSchema},
    http::CommandExit,
    llm::Generator,
    runtime::Runtime,
};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Inline text; takes precedence over `file`. Stdin is read when both are absent.
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub schema: PathBuf,
    /// Print compact JSON text instead of a pretty-printed document.
    pub json: bool,
    pub max_attempts: u32,
    pub instructions: Option<String>,
    pub generator: GeneratorConfig,
}

/// Converts text into data shaped by a JSON Schema file and prints it.
#[tracing::instrument(skip(runtime, console))]
pub async fn convert<R: Runtime>(
    runtime: &R,
    console: &mut Console,
    options: ConvertOptions,
) -> Result<()> {
    let generator = options.generator.build(runtime)?;
    let output = run(runtime, &generator, console, &options).await?;
    println!("{}", output);
    Ok(())
}

pub(crate) async fn run<R: Runtime, G: Generator + ?Sized>(
    runtime: &R,
    generator: &G,
    console: &mut Console,
    options: &ConvertOptions,
) -> Result<String> {
    let text = read_text(runtime, options)?;
    let schema = read_schema(runtime, &options.schema)?;

    let mut converter = Converter::new(generator, text, schema)
        .with_max_attempts(options.max_attempts);
    if let Some(instructions) = &options.instructions {
        converter = converter.with_instructions(instructions.as_str());
    }

    let output = if options.json {
        converter
            .to_json()
            .await
            .map_err(|e| report_failure(console, e))?
    } else {
        let value = converter
            .to_schema::<Value>()
            .await
            .map_err(|e| report_failure(console, e))?;
        serde_json::to_string_pretty(&value)
            .context("Failed to format the converted document")?
    };
    Ok(output)
}

/// Prints the conversion failure and turns it into the termination signal.
fn report_failure(console: &mut Console, error: ConversionError) -> anyhow::Error {
    console.print(error.message(), Style::BoldRed);
    anyhow::Error::from(CommandExit::with_reason(format!(
        "Conversion failed after {} attempt(s)",
        error.attempts()
    )))
}

fn read_text<R: Runtime>(runtime: &R, options: &ConvertOptions) -> Result<String> {
    let text = match (&options.text, &options.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => runtime.read_to_string(path)?,
        (None, None) => runtime.read_stdin()?,
    };
    if text.trim().is_empty() {
        anyhow::bail!("Nothing to convert: the input text is empty.")
    }
    Ok(text)
}

fn read_schema<R: Runtime>(runtime: &R, path: &PathBuf) -> Result<TargetSchema> {
    let document = runtime.read_to_string(path)?;
    let schema: Value = serde_json::from_str(&document)
        .with_context(|| format!("Schema file {} is not valid JSON", path.display()))?;
    let fallback_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let schema = TargetSchema::from_document(schema, fallback_name);
    schema
        .validator()
        .with_context(|| format!("Schema file {} is not usable", path.display()))?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GeneratorProfile, MockGenerator, Provider};
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCHEMA: &str = r#"{"title": "Contact", "type": "object",
        "properties": {"name": {"type": "string"}, "email": {"type": "string"}},
        "required": ["name"]}"#;

    fn options(text: Option<&str>, json: bool) -> ConvertOptions {
        ConvertOptions {
            text: text.map(str::to_string),
            file: None,
            schema: PathBuf::from("contact.schema.json"),
            json,
            max_attempts: 2,
            instructions: None,
            generator: GeneratorConfig::default(),
        }
    }

    fn runtime_with_schema() -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("contact.schema.json")))
            .returning(|_| Ok(SCHEMA.to_string()));
        runtime
    }

    fn generator_replying(reply: &'static str) -> MockGenerator {
        let mut generator = MockGenerator::new();
        let profile = GeneratorProfile::new(Provider::Ollama, "llama3")
            .with_api_base("http://localhost:11434/v1");
        generator.expect_profile().return_const(profile);
        generator
            .expect_generate_text()
            .returning(move |_| Ok(reply.to_string()));
        generator
    }

    #[tokio::test]
    async fn test_run_prints_pretty_document() {
        let generator = generator_replying(r#"{"name": "Ada"}"#);
        let mut console = Console::buffer();

        let runtime = runtime_with_schema();
        let output = run(&runtime, &generator, &mut console, &options(Some("Ada"), false))
            .await
            .unwrap();

        assert_eq!(output, "{\n  \"name\": \"Ada\"\n}");
    }

    #[tokio::test]
    async fn test_run_json_prints_compact_text() {
        let generator = generator_replying(r#"```json
{"name": "Ada"}
```"#);
        let mut console = Console::buffer();

        let runtime = runtime_with_schema();
        let output = run(&runtime, &generator, &mut console, &options(Some("Ada"), true))
            .await
            .unwrap();

        assert_eq!(output, r#"{"name":"Ada"}"#);
    }

    #[tokio::test]
    async fn test_run_reports_exhausted_conversion() {
        let generator = generator_replying("no idea");
        let mut console = Console::buffer();

        let runtime = runtime_with_schema();
        let err = run(&runtime, &generator, &mut console, &options(Some("Ada"), true))
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<CommandExit>().is_some());
        assert!(err.to_string().contains("2 attempt(s)"));
        assert_eq!(console.contents(), "Failed to convert text into JSON.\n");
    }

    #[tokio::test]
    async fn test_run_gives_up_when_replies_break_the_schema() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut generator = MockGenerator::new();
        let profile = GeneratorProfile::new(Provider::Ollama, "llama3")
            .with_api_base("http://localhost:11434/v1");
        generator.expect_profile().return_const(profile);
        generator.expect_generate_text().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"unrelated": 42}"#.to_string())
        });
        let mut console = Console::buffer();

        let runtime = runtime_with_schema();
        let err = run(&runtime, &generator, &mut console, &options(Some("Ada"), false))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(err.to_string().contains("2 attempt(s)"));
        let printed = console.contents();
        assert!(printed.starts_with("Failed to convert text into a structured model"));
        assert!(printed.contains("name"));
    }

    #[tokio::test]
    async fn test_run_retries_reply_that_breaks_the_schema() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut generator = MockGenerator::new();
        let profile = GeneratorProfile::new(Provider::Ollama, "llama3")
            .with_api_base("http://localhost:11434/v1");
        generator.expect_profile().return_const(profile);
        generator.expect_generate_text().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(r#"{"email": "ada@example.com"}"#.to_string())
            } else {
                Ok(r#"{"name": "Ada", "email": "ada@example.com"}"#.to_string())
            }
        });
        let mut console = Console::buffer();

        let runtime = runtime_with_schema();
        let output = run(&runtime, &generator, &mut console, &options(Some("Ada"), true))
            .await
            .unwrap();

        assert_eq!(output, r#"{"name":"Ada","email":"ada@example.com"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(console.contents().is_empty());
    }

    #[tokio::test]
    async fn test_run_reads_stdin_without_text_or_file() {
        let mut runtime = runtime_with_schema();
        runtime
            .expect_read_stdin()
            .times(1)
            .returning(|| Ok("Ada".to_string()));
        let generator = generator_replying(r#"{"name": "Ada"}"#);
        let mut console = Console::buffer();

        let output = run(&runtime, &generator, &mut console, &options(None, true))
            .await
            .unwrap();

        assert_eq!(output, r#"{"name":"Ada"}"#);
    }

    #[test]
    fn test_read_text_rejects_blank_input() {
        let runtime = MockRuntime::new();
        let err = read_text(&runtime, &options(Some("   "), true)).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_read_schema_uses_file_stem_without_title() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"type": "object"}"#.to_string()));

        let schema = read_schema(&runtime, &PathBuf::from("schemas/invoice.json")).unwrap();
        assert_eq!(schema.name, "invoice");
    }

    #[test]
    fn test_read_schema_rejects_invalid_schema_document() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(r#"{"type": "thing"}"#.to_string()));

        let err = read_schema(&runtime, &PathBuf::from("odd.json")).unwrap_err();
        assert!(err.to_string().contains("odd.json"));
    }

    #[test]
    fn test_read_schema_rejects_invalid_json() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("not json".to_string()));

        let err = read_schema(&runtime, &PathBuf::from("bad.json")).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
