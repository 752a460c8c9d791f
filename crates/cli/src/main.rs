//! StockHub CLI - migrations, seeding, imports and dashboard figures.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! stockhub migrate
//!
//! # Insert demo products and coupons
//! stockhub seed
//!
//! # Ingest a synced product list
//! stockhub import products.json
//!
//! # Print dashboard statistics as JSON
//! stockhub stats
//! ```
//!
//! Configuration comes from the environment (see `stockhub_shop::config`).
//! Without a database URL every command except `migrate` runs against the
//! demo store.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockhub_shop::ShopConfig;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "stockhub")]
#[command(author, version, about = "StockHub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert demo products and coupons (safe to repeat)
    Seed,
    /// Import a synced product list (JSON array of products)
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Print dashboard statistics as JSON
    Stats,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ShopConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Warnings and errors become Sentry events, lower levels breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stockhub=info,stockhub_shop=info,stockhub_cli=info".into());

    // Logs go to stderr; stdout carries command output
    let json = std::env::var_os("STOCKHUB_LOG_JSON").is_some();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config first: Sentry needs its DSN before the subscriber is installed
    let config = match ShopConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ShopConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await,
        Commands::Seed => commands::seed::run(config).await,
        Commands::Import { file } => commands::import::run(config, &file).await,
        Commands::Stats => commands::stats::run(config).await,
    }
}
