use anyhow::Result;
use clap::Parser;
use plusctl::{
    commands::{self, ConvertOptions, Method, RequestOptions, config::GeneratorConfig},
    console::Console,
    converter::DEFAULT_MAX_ATTEMPTS,
    http::CommandExit,
    llm::Provider,
    runtime::RealRuntime,
};
use std::path::PathBuf;

/// plusctl - Enterprise API command-line helper
///
/// Calls the Enterprise API and converts free-form text into structured
/// data with a language model.
///
/// The Enterprise API key is read from PLUSCTL_API_KEY. The model provider
/// key is read from PLUSCTL_LLM_API_KEY or OPENAI_API_KEY.
///
/// Examples:
///   plusctl request crews                       # GET /crews
///   plusctl convert "Ada, ada@example.com" --schema contact.json
#[derive(Parser, Debug)]
#[command(author, version = env!("PLUSCTL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enterprise API URL (also via PLUSCTL_API_URL)
    #[arg(long = "api-url", env = "PLUSCTL_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a request to the Enterprise API
    Request(RequestArgs),

    /// Convert text into JSON shaped by a JSON Schema
    Convert(ConvertArgs),
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// API path, e.g. "crews" or "/crews/42"
    #[arg(value_name = "PATH")]
    pub path: String,

    /// HTTP method
    #[arg(long, short = 'X', value_enum, default_value = "get")]
    pub method: Method,

    /// JSON request body (POST only)
    #[arg(long, short = 'd', value_name = "JSON")]
    pub data: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Text to convert (reads --file or stdin when omitted)
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    /// Read the text to convert from a file
    #[arg(long, short = 'f', value_name = "PATH", conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// JSON Schema describing the output
    #[arg(long, short = 's', value_name = "PATH")]
    pub schema: PathBuf,

    /// Print compact JSON text
    #[arg(long)]
    pub json: bool,

    /// Model name
    #[arg(long, env = "PLUSCTL_MODEL", default_value = commands::config::DEFAULT_MODEL)]
    pub model: String,

    /// Model provider: openai, ollama, or any OpenAI-compatible name
    #[arg(long, env = "PLUSCTL_PROVIDER", default_value = "openai")]
    pub provider: Provider,

    /// Custom OpenAI-compatible API base URL
    #[arg(long = "base-url", env = "PLUSCTL_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Maximum number of conversion attempts
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Override the formatting instructions sent to the model
    #[arg(long, value_name = "TEXT")]
    pub instructions: Option<String>,
}

impl From<ConvertArgs> for ConvertOptions {
    fn from(args: ConvertArgs) -> Self {
        ConvertOptions {
            text: args.text,
            file: args.file,
            schema: args.schema,
            json: args.json,
            max_attempts: args.max_attempts,
            instructions: args.instructions,
            generator: GeneratorConfig {
                provider: args.provider,
                model: args.model,
                base_url: args.base_url,
            },
        }
    }
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    let runtime = RealRuntime;
    let mut console = Console::stderr();

    let result = match cli.command {
        Commands::Request(args) => {
            let options = RequestOptions {
                path: args.path,
                method: args.method,
                data: args.data,
            };
            commands::request(&runtime, &mut console, cli.api_url, options).await
        }
        Commands::Convert(args) => commands::convert(&runtime, &mut console, args.into()).await,
    };

    // The diagnostic is already on the console; exit without an error banner.
    if let Err(e) = &result {
        if let Some(exit) = e.downcast_ref::<CommandExit>() {
            log::debug!("Terminating: {}", exit);
            std::process::exit(exit.code);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_request_parsing() {
        let cli = Cli::try_parse_from(["plusctl", "request", "crews"]).unwrap();
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.path, "crews");
                assert_eq!(args.method, Method::Get);
                assert_eq!(args.data, None);
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_cli_request_post_parsing() {
        let cli = Cli::try_parse_from([
            "plusctl", "request", "crews", "-X", "post", "-d", r#"{"name":"demo"}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, Method::Post);
                assert_eq!(args.data.as_deref(), Some(r#"{"name":"demo"}"#));
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_cli_convert_defaults() {
        let cli =
            Cli::try_parse_from(["plusctl", "convert", "some text", "--schema", "s.json"]).unwrap();
        match cli.command {
            Commands::Convert(args) => {
                let options: ConvertOptions = args.into();
                assert_eq!(options.text.as_deref(), Some("some text"));
                assert_eq!(options.schema, PathBuf::from("s.json"));
                assert_eq!(options.max_attempts, DEFAULT_MAX_ATTEMPTS);
                assert!(!options.json);
            }
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_cli_convert_provider_and_base_url() {
        let cli = Cli::try_parse_from([
            "plusctl",
            "convert",
            "--file",
            "in.txt",
            "--schema",
            "s.json",
            "--provider",
            "ollama",
            "--base-url",
            "http://gpu-box:11434/v1",
            "--max-attempts",
            "5",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.provider, Provider::Ollama);
                assert_eq!(args.base_url.as_deref(), Some("http://gpu-box:11434/v1"));
                assert_eq!(args.max_attempts, 5);
                assert_eq!(args.file, Some(PathBuf::from("in.txt")));
                assert!(args.json);
            }
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_cli_convert_requires_schema() {
        let result = Cli::try_parse_from(["plusctl", "convert", "text"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_text_conflicts_with_file() {
        let result = Cli::try_parse_from([
            "plusctl", "convert", "text", "--file", "in.txt", "--schema", "s.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_api_url_and_verbosity() {
        let cli = Cli::try_parse_from([
            "plusctl",
            "-vv",
            "--api-url",
            "http://localhost:3000",
            "request",
            "x",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(log_filter(cli.verbose), "debug");
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["plusctl"]);
        assert!(result.is_err());
    }
}
