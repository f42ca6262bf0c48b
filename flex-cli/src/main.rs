//! FlexLedger Command Line Interface
//!
//! Usage:
//!   flex invoke <function> [args] - Submit a transaction and wait for commit
//!   flex query <function> [args]  - Evaluate a read-only contract function
//!   flex status <transaction-id>  - Look up a recent commit notification
//!
//! Connection settings come from the environment (FLEX_PROFILE_PATH,
//! FLEX_CLIENT_NODE, FLEX_AUTHORITY, ...); command-line flags override.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "flex")]
#[command(about = "FlexLedger market ledger connector CLI")]
#[command(version)]
struct Cli {
    /// Network profile path (overrides FLEX_PROFILE_PATH)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Organization id for the caller context
    #[arg(long, default_value = "operator-1")]
    organization: String,

    /// Caller role: system_operator, distribution_operator,
    /// balancing_provider or producer
    #[arg(long, default_value = "system_operator")]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a state-changing transaction and wait for commit
    Invoke {
        /// Contract function ("<Resource>.<operation>")
        function: String,
        /// Business arguments as a JSON array
        #[arg(default_value = "[]")]
        args: String,
        /// Target channel
        #[arg(short, long, default_value = "operations")]
        channel: String,
    },

    /// Evaluate a read-only contract function
    Query {
        /// Contract function ("<Resource>.<operation>")
        function: String,
        /// Business arguments as a JSON array
        #[arg(default_value = "[]")]
        args: String,
        /// Target channel
        #[arg(short, long, default_value = "operations")]
        channel: String,
    },

    /// Look up a recently observed commit notification
    Status {
        /// Transaction id
        transaction_id: String,
        /// Target channel
        #[arg(short, long, default_value = "operations")]
        channel: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    init_logging();

    let cli = Cli::parse();
    if let Err(e) = commands::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flex_cli=info,flex_connector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
