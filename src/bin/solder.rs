//! Solder CLI
//!
//! Expand `${token}` templates using a YAML token config.
//!
//! ```text
//! solder expand --config tokens.yaml --settings settings.yaml --input template.txt
//! echo 'Hello ${user}' | solder expand --config tokens.yaml --strict --show-tokens
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use solder::{AppSettings, SharedStorage, TokenConfig, WiringContext};

#[derive(Parser)]
#[command(name = "solder", about = "Token expansion from the command line", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand tokens in a template and print the result
    Expand {
        /// Token config (YAML)
        #[arg(long, short = 'c', env = solder::settings::TOKENS_PATH_VAR)]
        config: PathBuf,

        /// Settings file (YAML); defaults to SOLDER_SETTINGS or config/settings.yaml
        #[arg(long, short = 's')]
        settings: Option<PathBuf>,

        /// Template file; reads stdin when omitted
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Fail on the first unresolvable token
        #[arg(long)]
        strict: bool,

        /// Print the lookup keys seen to stderr
        #[arg(long)]
        show_tokens: bool,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries the expansion
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Expand {
            config,
            settings,
            input,
            strict,
            show_tokens,
        } => expand(config, settings, input, strict, show_tokens),
    }
}

fn expand(
    config_path: PathBuf,
    settings_path: Option<PathBuf>,
    input: Option<PathBuf>,
    strict: bool,
    show_tokens: bool,
) -> Result<()> {
    let settings = match settings_path {
        Some(path) => AppSettings::load(&path)?.with_env_overrides(solder::settings::ENV_PREFIX),
        None => AppSettings::from_env()?,
    };

    let mut config = TokenConfig::load(&config_path)?;
    if strict {
        config.strict = true;
    }

    let ctx = WiringContext::new(settings).with_storage(Arc::new(SharedStorage::new()));
    let wired = config
        .build(&ctx)
        .with_context(|| format!("Failed to wire tokens from {}", config_path.display()))?;

    let template = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read template from stdin")?;
            buf
        }
    };

    let expansion = wired.expand(&template).context("Token expansion failed")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(expansion.output.as_bytes())?;
    stdout.flush()?;

    if show_tokens {
        let keys = expansion.ordered_tokens();
        eprintln!("tokens ({}): {}", keys.len(), keys.join(", "));
        if expansion.unresolved > 0 {
            eprintln!("unresolved: {}", expansion.unresolved);
        }
    }

    Ok(())
}
