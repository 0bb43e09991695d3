//! omnicron - API gateway for free-tier chat completion, song recognition and OCR
//!
//! Routes chat requests across a pool of interchangeable providers with a
//! single strong-to-weak model fallback, and forwards audio and document
//! uploads to their recognition services.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omnicron::config::{Config, KeySource};

#[derive(Parser)]
#[command(name = "omnicron")]
#[command(about = "API gateway for free-tier chat completion, song recognition and OCR")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show configured providers and services
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("omnicron={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load(path: &str) -> anyhow::Result<(Config, Vec<(String, KeySource)>)> {
    Config::from_file_with_env(path).with_context(|| format!("loading configuration from {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut cfg, key_sources) = match load(&config) {
                Ok(loaded) => loaded,
                Err(e) => {
                    init_tracing("info");
                    tracing::error!(config = %config, error = %e, "Failed to load configuration");
                    return Err(e);
                }
            };
            init_tracing(&cfg.logging.level);
            tracing::info!(config = %config, "Loaded configuration");

            for (owner, source) in &key_sources {
                tracing::debug!(owner = %owner, source = %source, "Resolved API key");
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                cfg.server.listen = addr;
            }

            omnicron::proxy::run_server(cfg).await
        }

        Commands::Check { config } => {
            init_tracing("info");
            let (cfg, key_sources) = load(&config)?;

            println!("Configuration OK: {}", config);
            println!("  listen:   {}", cfg.server.listen);
            println!(
                "  models:   strong={} weak={} fallback={}",
                cfg.models.strong, cfg.models.weak, cfg.models.fallback
            );
            println!("  providers: {}", cfg.providers.len());
            for (owner, source) in &key_sources {
                println!("  key {:<16} {}", owner, source);
            }
            Ok(())
        }

        Commands::Providers { config } => {
            init_tracing("warn");
            let (cfg, key_sources) = load(&config)?;
            let source_of = |name: &str| {
                key_sources
                    .iter()
                    .find(|(owner, _)| owner == name)
                    .map(|(_, s)| s.to_string())
                    .unwrap_or_else(|| KeySource::None.to_string())
            };

            println!("{:<16} {:<40} {:<16} KEY", "NAME", "URL", "DEFAULT MODEL");
            for p in &cfg.providers {
                println!(
                    "{:<16} {:<40} {:<16} {}",
                    p.name,
                    p.url,
                    p.default_model.as_deref().unwrap_or(&cfg.models.weak),
                    source_of(&p.name)
                );
            }
            if let Some(p) = &cfg.image_provider {
                println!(
                    "{:<16} {:<40} {:<16} {} (image)",
                    p.name,
                    p.url,
                    p.default_model.as_deref().unwrap_or(&cfg.models.weak),
                    source_of(&p.name)
                );
            }
            for (section, service) in [("songs", &cfg.songs), ("ocr", &cfg.ocr)] {
                match service {
                    Some(s) => println!("{:<16} {} (timeout {}s)", section, s.url, s.timeout_secs),
                    None => println!("{:<16} not configured", section),
                }
            }
            Ok(())
        }
    }
}
