use clap::{Parser, Subcommand};
use cortex_tools::config::ProviderConfig;
use cortex_tools::error::{FilesError, PatternError};
use cortex_tools::output::{json_response, ErrorResponse, OutputFormat};
use cortex_tools::output_common::render_json;
use cortex_tools::pattern::provider::BinaryProvider;
use cortex_tools::tools::{handle_files_request, handle_pattern_request, ToolOutcome};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "cortex-tools",
    version = env!("CARGO_PKG_VERSION"),
    about = "Code-intelligence tool backends: JSON-to-SQL query translation and AST pattern search"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = OutputFormat::Human)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate and execute a QueryDefinition against a SQLite database.
    Files {
        #[arg(long)]
        db: PathBuf,

        /// QueryDefinition JSON, e.g. '{"from":"files","limit":10}'
        query: String,
    },
    /// Run an AST pattern search via the pinned ast-grep binary.
    Pattern {
        #[arg(long)]
        pattern: String,

        #[arg(long)]
        lang: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(long = "file-path")]
        file_paths: Vec<String>,

        #[arg(long)]
        context_lines: Option<u32>,

        #[arg(long)]
        strictness: Option<String>,

        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("invalid command-line argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl CliError {
    fn error_code(&self) -> String {
        match self {
            CliError::Files(e) => e.error_code().to_string(),
            CliError::Pattern(e) => e.error_code().to_string(),
            CliError::InvalidArgument(_) => "CORTEX-C001".to_string(),
            CliError::Sqlite(_) => "CORTEX-C002".to_string(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");

    if let Err(err) = runtime.block_on(dispatch(&cli)) {
        emit_error(&cli, &err);
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Files { db, query } => run_files(cli, db, query),
        Command::Pattern {
            pattern,
            lang,
            root,
            file_paths,
            context_lines,
            strictness,
            limit,
        } => run_pattern(cli, pattern, lang, root, file_paths, *context_lines, strictness.as_deref(), *limit).await,
    }
}

fn run_files(cli: &Cli, db: &PathBuf, query: &str) -> Result<(), CliError> {
    let conn = Connection::open(db)?;
    let request = serde_json::json!({ "operation": "query", "query": serde_json::from_str::<serde_json::Value>(query).map_err(|e| CliError::InvalidArgument(e.to_string()))? });

    let outcome = handle_files_request(&conn, &request, &CancellationToken::new())?;
    print_outcome(cli, outcome)
}

#[allow(clippy::too_many_arguments)]
async fn run_pattern(
    cli: &Cli,
    pattern: &str,
    lang: &str,
    root: &PathBuf,
    file_paths: &[String],
    context_lines: Option<u32>,
    strictness: Option<&str>,
    limit: Option<u32>,
) -> Result<(), CliError> {
    let request = serde_json::json!({
        "pattern": pattern,
        "language": lang,
        "file_paths": file_paths,
        "context_lines": context_lines,
        "strictness": strictness,
        "limit": limit,
    });

    let config = ProviderConfig::default();
    let provider = Arc::new(BinaryProvider::new(config.clone()));
    let cancel = CancellationToken::new();

    let root = root
        .canonicalize()
        .map_err(|e| CliError::InvalidArgument(format!("cannot resolve root {}: {e}", root.display())))?;

    let outcome = handle_pattern_request(&provider, &request, &root, &config, &cancel).await?;
    print_outcome(cli, outcome)
}

fn print_outcome(cli: &Cli, outcome: ToolOutcome) -> Result<(), CliError> {
    match outcome {
        ToolOutcome::Result(payload) => {
            match cli.output {
                OutputFormat::Human | OutputFormat::Json => println!("{payload}"),
                OutputFormat::Pretty => {
                    let value: serde_json::Value = serde_json::from_str(&payload)
                        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
                    println!("{}", render_json(&value, OutputFormat::Pretty).unwrap());
                }
            }
            Ok(())
        }
        ToolOutcome::ErrorResult(value) => {
            eprintln!("{}", render_json(&value, cli.output).unwrap());
            std::process::exit(1);
        }
    }
}

fn emit_error(cli: &Cli, err: &CliError) {
    match cli.output {
        OutputFormat::Human => {
            eprintln!("ERROR [{}]: {}", err.error_code(), err);
        }
        OutputFormat::Json | OutputFormat::Pretty => {
            let error = ErrorResponse {
                code: err.error_code(),
                message: err.to_string(),
            };
            let response = json_response(error);
            let rendered = render_json(&response, cli.output);
            match rendered {
                Ok(payload) => println!("{}", payload),
                Err(ser_err) => eprintln!("ERROR: {}", ser_err),
            }
        }
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn parses_files_command() {
        let args = ["cortex-tools", "files", "--db", "code.db", r#"{"from":"files"}"#];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Files { db, query } => {
                assert_eq!(db, PathBuf::from("code.db"));
                assert_eq!(query, r#"{"from":"files"}"#);
            }
            _ => panic!("expected Files command"),
        }
    }

    #[test]
    fn parses_pattern_command_with_defaults() {
        let args = ["cortex-tools", "pattern", "--pattern", "defer $F()", "--lang", "go"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Pattern { pattern, lang, root, .. } => {
                assert_eq!(pattern, "defer $F()");
                assert_eq!(lang, "go");
                assert_eq!(root, PathBuf::from("."));
            }
            _ => panic!("expected Pattern command"),
        }
    }

    #[test]
    fn parses_repeated_file_path_flags() {
        let args = [
            "cortex-tools", "pattern", "--pattern", "x", "--lang", "go",
            "--file-path", "a.go", "--file-path", "b.go",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Pattern { file_paths, .. } => {
                assert_eq!(file_paths, vec!["a.go".to_string(), "b.go".to_string()]);
            }
            _ => panic!("expected Pattern command"),
        }
    }

    #[test]
    fn rejects_unknown_subcommand() {
        let args = ["cortex-tools", "bogus"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
