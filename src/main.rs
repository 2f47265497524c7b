use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ratekey::config::{LogFormat, Settings};
use ratekey::fixture::RequestFixture;
use ratekey::plugin::RateLimitPlugin;
use ratekey::ratelimit::{ApiDefinition, KeyResolver, RateLimitConfig};
use ratekey::session::MemorySessionStore;

/// Rate limit key derivation for API gateways.
#[derive(Debug, Parser)]
#[command(name = "ratekey", version, about)]
struct Cli {
    /// Process settings file (YAML, TOML or JSON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a rate limiting configuration document
    Validate {
        /// JSON document containing a `rateLimiting` object
        #[arg(long)]
        config: PathBuf,
    },
    /// Resolve the session a request would receive
    Resolve {
        /// JSON document containing a `rateLimiting` object
        #[arg(long)]
        config: PathBuf,

        /// YAML request fixture
        #[arg(long)]
        request: PathBuf,

        /// Name of the API definition, used in logs
        #[arg(long, default_value = "ratekey-cli")]
        api_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref()).context("Failed to load settings")?;
    init_tracing(&settings);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ratekey");

    match cli.command {
        Command::Validate { config } => validate(&config),
        Command::Resolve {
            config,
            request,
            api_name,
        } => resolve(&settings, &config, &request, api_name).await,
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::builder()
        .with_default_directive(
            settings
                .logging
                .level
                .parse()
                .unwrap_or_else(|_| Level::INFO.into()),
        )
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    match settings.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = RateLimitConfig::from_file(path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    config.validate()?;

    println!(
        "active={} strategy={} overrides={} default={}/{}s session_ttl={}min",
        config.active,
        config.strategy.name,
        config.overrides.len(),
        config.default_requests,
        config.default_window_seconds,
        config.session_ttl_minutes,
    );
    Ok(())
}

async fn resolve(
    settings: &Settings,
    config: &Path,
    request: &Path,
    api_name: String,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(config)
        .with_context(|| format!("Failed to read {}", config.display()))?;
    let config_data: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid JSON in {}", config.display()))?;
    let api = ApiDefinition::new(api_name, config_data);

    let mut request = RequestFixture::from_file(request)?.into_request()?;

    let resolver = KeyResolver::new(settings.resolver.credential_decode_failure);
    let plugin = RateLimitPlugin::new(resolver, Arc::new(MemorySessionStore::new()));
    let session = plugin.handle(&api, &mut request).await?;

    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
