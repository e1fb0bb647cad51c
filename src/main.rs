//! Ledger submission CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!   signed tx (base64 file)
//!        │
//!        ▼
//!   ┌──────────┐   send / resend    ┌───────────┐
//!   │Submitter │──────────────────▶│ RpcClient │──▶ RPC providers (failover)
//!   │          │◀── push ∥ poll ───│ + pubsub  │◀── websocket notifications
//!   └────┬─────┘                    └───────────┘
//!        │ timed out
//!        ▼
//!   ┌──────────┐
//!   │Simulator │──▶ diagnostic
//!   └──────────┘
//!        │
//!        ▼
//!   receipt (JSON on stdout)
//! ```

use base64::Engine;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ledger_submit::config::{load_config, EngineConfig};
use ledger_submit::ledger::{LedgerClient, RpcClient, TxId};
use ledger_submit::observability::{logging, metrics, TracingSink};
use ledger_submit::submission::{simulator, Submitter};

#[derive(Parser)]
#[command(name = "ledger-submit")]
#[command(about = "Submit signed ledger transactions and track them to a definitive outcome", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a signed transaction and wait for its outcome
    Send {
        /// File holding the base64-encoded signed transaction
        #[arg(long)]
        tx: PathBuf,
    },
    /// Query the current status of a transaction id
    Status { id: String },
    /// Dry-run a signed transaction against current state
    Simulate {
        #[arg(long)]
        tx: PathBuf,
    },
    /// Fetch the latest blockhash
    Blockhash,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    logging::init(&config.observability.log_level);
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match run(cli.command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one command; `Ok(false)` means it completed without a commit.
async fn run(command: Commands, config: EngineConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let client: Arc<dyn LedgerClient> = Arc::new(RpcClient::new(&config.rpc)?);
    let commitment = config.submission.commitment;

    match command {
        Commands::Send { tx } => {
            let raw = read_signed(&tx)?;
            let timeout = config.submission.confirm_timeout();
            let submitter = Submitter::new(client, config.submission, Arc::new(TracingSink));
            let receipt = submitter.submit(&raw, timeout, commitment).await?;
            print_json(&receipt)?;
            Ok(receipt.outcome.is_committed())
        }
        Commands::Status { id } => {
            let id: TxId = id.parse()?;
            let status = client
                .get_signature_statuses(&[id])
                .await?
                .into_iter()
                .next()
                .flatten();
            let committed = status.as_ref().is_some_and(|s| s.err.is_none() && s.is_committed());
            print_json(&serde_json::json!({ "id": id, "status": status }))?;
            Ok(committed)
        }
        Commands::Simulate { tx } => {
            let raw = read_signed(&tx)?;
            let result = client.simulate_transaction(&raw, commitment).await?;
            print_json(&serde_json::json!({
                "error": simulator::program_error(&result),
                "logs": result.logs,
            }))?;
            Ok(result.err.is_none())
        }
        Commands::Blockhash => {
            let reference = client.get_latest_blockhash(commitment).await?;
            print_json(&serde_json::json!({
                "blockhash": reference.blockhash.to_string(),
                "lastValidBlockHeight": reference.last_valid_block_height,
            }))?;
            Ok(true)
        }
    }
}

fn read_signed(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let encoded = std::fs::read_to_string(path)?;
    Ok(base64::engine::general_purpose::STANDARD.decode(encoded.trim())?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
