//! `warden`: validate untrusted patterns and paths from the command line.
//!
//! Verdicts go to stdout as one JSON object per line; logs go to stderr.
//! Exit codes: 0 all inputs accepted, 1 at least one rejected, 2 usage or
//! configuration error.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use warden_core::audit::default_sink;
use warden_core::{CallOptions, GlobCrateMatcher, Protector, SafeMatcher, Validator, WardenConfig};

/// Guarded validation for untrusted glob patterns and paths
#[derive(Parser)]
#[command(name = "warden")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score glob patterns for complexity and risk
    Pattern {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Validate temp-file paths against the filesystem
    Temp {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate URL paths for a static file server
    Static {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Rewrite a value into a safer form
    Sanitize {
        #[arg(long, value_enum, default_value_t = Kind::Pattern)]
        kind: Kind,

        value: String,
    },

    /// Match candidates against glob patterns under a deadline
    Match {
        /// Glob pattern; repeat for several
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Deadline override in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(required = true)]
        candidates: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Pattern,
    Temp,
    Static,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WardenConfig> {
    let mut config = match path {
        Some(path) => WardenConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WardenConfig::default(),
    };
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    debug!(?config, "Effective configuration");
    Ok(config)
}

/// Print one verdict per value. Exit code 1 when any is rejected.
fn report<V: Validator>(protector: &Protector<V>, values: &[String]) -> anyhow::Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut all_valid = true;

    for value in values {
        let verdict = protector.validate(value);
        all_valid &= verdict.is_valid;
        writeln!(out, "{}", serde_json::to_string(&verdict)?)?;
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run_match(
    config: &WardenConfig,
    patterns: &[String],
    timeout_ms: Option<u64>,
    candidates: &[String],
) -> anyhow::Result<ExitCode> {
    let mut options = CallOptions::new().with_context("warden match");
    if let Some(ms) = timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let protector = config.pattern_protector(default_sink());
    let matcher = SafeMatcher::new(GlobCrateMatcher::new(), protector).with_options(options);

    let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let candidates: Vec<&str> = candidates.iter().map(String::as_str).collect();

    match matcher.try_match_list(&candidates, &patterns).await.into_result() {
        Ok(matches) => {
            println!("{}", serde_json::to_string(&matches)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("[]");
            eprintln!("Match refused: {err}");
            Ok(ExitCode::from(1))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Pattern { patterns } => report(&config.pattern_protector(default_sink()), &patterns),
        Command::Temp { paths } => report(&config.temp_file_protector(default_sink()), &paths),
        Command::Static { paths } => report(&config.static_file_protector(default_sink()), &paths),
        Command::Sanitize { kind, value } => {
            let sanitized = match kind {
                Kind::Pattern => config.pattern_protector(default_sink()).sanitize(&value),
                Kind::Temp => config.temp_file_protector(default_sink()).sanitize(&value),
                Kind::Static => config.static_file_protector(default_sink()).sanitize(&value),
            };
            println!("{sanitized}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Match {
            patterns,
            timeout_ms,
            candidates,
        } => run_match(&config, &patterns, timeout_ms, &candidates).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
