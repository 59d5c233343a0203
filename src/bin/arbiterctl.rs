//! ArbiterCtl - Command line client for the arbitrator
//!
//! Usage:
//!   arbiterctl heartbeat <key>            - Record a liveness beacon
//!   arbiterctl get <key>                  - Read a value
//!   arbiterctl set <key> <value>          - Write a value unconditionally
//!   arbiterctl create <key> <value>       - Write only if the key is absent
//!   arbiterctl cas <key> <prev> <new>     - Compare-and-swap
//!   arbiterctl delete <key>               - Remove a key
//!
//! Each invocation performs exactly one RPC and prints the result.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

/// Arbiter Control Tool
#[derive(Parser)]
#[command(name = "arbiterctl")]
#[command(about = "Call the tie-breaking arbitrator", long_about = None)]
struct Cli {
    /// Endpoint to connect to
    #[arg(short, long, default_value = "https://127.0.0.1:6666")]
    endpoint: String,

    /// Username for authentication
    #[arg(short, long)]
    username: String,

    /// Password for authentication
    #[arg(short, long)]
    password: String,

    /// Accept self-signed server certificates
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a liveness beacon under a key; prints the timestamp written
    Heartbeat { key: String },

    /// Read the value of a key (prints an empty line if absent)
    Get { key: String },

    /// Write a value unconditionally
    Set { key: String, value: String },

    /// Write a value only if the key is absent (write-once registration)
    Create { key: String, value: String },

    /// Compare-and-swap: write `new` only if the key currently holds `prev`
    Cas {
        key: String,
        prev: String,
        new: String,
    },

    /// Remove a key
    Delete { key: String },
}

impl Commands {
    fn envelope(&self) -> Value {
        match self {
            Commands::Heartbeat { key } => json!({"method": "heartbeat", "params": [key]}),
            Commands::Get { key } => json!({"method": "get", "params": [key]}),
            Commands::Set { key, value } => json!({"method": "set", "params": [key, value]}),
            Commands::Create { key, value } => json!({"method": "create", "params": [key, value]}),
            Commands::Cas { key, prev, new } => {
                json!({"method": "set_if_prev", "params": [key, prev, new]})
            }
            Commands::Delete { key } => json!({"method": "delete", "params": [key]}),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()
        .context("failed to build HTTP client")?;

    let url = format!("{}/rpc", cli.endpoint.trim_end_matches('/'));
    let response = client
        .post(&url)
        .basic_auth(&cli.username, Some(&cli.password))
        .json(&cli.command.envelope())
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("invalid response from {} (HTTP {})", url, status))?;

    if let Some(error) = body.get("error").and_then(Value::as_str) {
        bail!(
            "{} ({})",
            error,
            body.get("code").and_then(Value::as_str).unwrap_or("?")
        );
    }
    if !status.is_success() {
        bail!("HTTP {}", status);
    }

    match body.get("result") {
        Some(Value::String(s)) => println!("{}", s),
        Some(other) => println!("{}", other),
        None => bail!("response carried no result"),
    }
    Ok(())
}
