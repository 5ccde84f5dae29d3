//! Todos - Entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};

use todos::Orchestrator;
use todos_config::{ConfigLoader, LogFormat, LoggingConfig, TodosConfig, DEFAULT_ENV_PREFIX};
use todos_telemetry::LogConfig;

/// Default configuration file, read when present.
const DEFAULT_CONFIG_FILE: &str = "todos.toml";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-V" => {
                    println!("todos {}", todos::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(2);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Todos - HTTP todo service

USAGE:
    todos [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    TODOS__SERVER__HTTP_ADDR              Listen address (default: 0.0.0.0:8080)
    TODOS__SERVER__SHUTDOWN_TIMEOUT_SECS  Drain ceiling in seconds (default: 30)
    TODOS__SERVER__KEEP_ALIVE             HTTP/1.1 keep-alive (default: true)
    TODOS__STORE__PATH                    SQLite database file (default: db.sqlite)
    TODOS__LOGGING__LEVEL                 Log level (default: info)
    TODOS__LOGGING__FORMAT                json or pretty (default: json)
    RUST_LOG                              Filter directives, overrides the level

Variables may also be placed in a .env file in the working directory.
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<TodosConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::new()
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE)?,
    };

    loader
        .with_dotenv()
        .context("reading .env")?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("invalid configuration")
}

fn log_config(logging: &LoggingConfig) -> LogConfig {
    LogConfig {
        level: logging.level.clone(),
        json_format: logging.format == LogFormat::Json,
        file_line_info: logging.include_location,
        ..LogConfig::production()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = todos_telemetry::init_logging(&log_config(&config.logging)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        http_addr = %config.server.http_addr,
        store = %config.store.path,
        "Configuration loaded"
    );

    match Orchestrator::new(config).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting with failure");
            ExitCode::FAILURE
        }
    }
}
