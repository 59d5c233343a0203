//! Arbiter - External Tie-Breaking Arbitrator
//!
//! A trusted third party outside a cluster's voting members, consulted to
//! resolve ties via simple atomic key-value state.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbiter::api::RpcServer;
use arbiter::config::ArbiterConfig;
use arbiter::error::Result;
use arbiter::store::KvStore;

/// Arbiter - External Tie-Breaking Arbitrator
#[derive(Parser)]
#[command(name = "arbiter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the arbitrator
    Start,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "arbiter.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => run_start(cli.config, cli.log_level).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the arbitrator
async fn run_start(config_path: PathBuf, log_level: Option<String>) -> Result<()> {
    let config = match ArbiterConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(e);
        }
    };

    let level = log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, &config.logging.format);

    tracing::info!("Starting arbitrator...");

    let store = Arc::new(KvStore::new());
    let server = RpcServer::new(config, store);
    server.start().await?;

    tracing::info!("Arbitrator stopped");
    Ok(())
}

/// Write a sample configuration file
fn run_init(output: PathBuf) -> Result<()> {
    if output.exists() {
        return Err(arbiter::Error::Config(format!(
            "refusing to overwrite existing file {:?}",
            output
        )));
    }

    let sample = r#"# Arbiter configuration
#
# The arbitrator should run on a host reachable by every cluster node but
# outside the cluster itself.

[server]
# Address and port the RPC endpoint listens on
bind_address = "0.0.0.0:6666"

[tls]
# Replace the example self-signed certificate with a signed one
enabled = true
cert_file = "certificate.pem"
key_file = "key.pem"

[auth]
# Shared credential every client call must present
username = "changeme"
password = "changeme"

[logging]
level = "info"
format = "pretty"
"#;

    std::fs::write(&output, sample)?;
    println!("Wrote sample configuration to {:?}", output);
    println!("Edit auth.username and auth.password before starting.");
    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    match ArbiterConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration {:?} is valid", config_path);
            println!("  bind address: {}", config.server.bind_address);
            println!("  tls enabled:  {}", config.tls.enabled);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration {:?} is invalid: {}", config_path, e);
            Err(e)
        }
    }
}
