//! Order tool
//!
//! Small operational CLI: validate an order definition file the way
//! `create_order` would, and print the deterministic order hash for a
//! params/salt pair.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethereum_types::{H256, U256};
use tracing::info;

use order_manager::{order_hash, OrderManager, OrderParams};

#[derive(Parser)]
#[command(name = "order_tool", about = "Validate and hash order definitions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run creation-time validation on an order params JSON file
    Validate {
        /// Path to the order params JSON file
        file: String,
        /// Salt as a 0x-prefixed 32-byte hex string
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000000000000000000000000000")]
        salt: String,
    },
    /// Print the deterministic order hash for a params/salt pair
    Hash {
        /// Path to the order params JSON file
        file: String,
        /// Salt as a 0x-prefixed 32-byte hex string
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000000000000000000000000000")]
        salt: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { file, salt } => {
            let params = load_params(&file)?;
            let salt = parse_salt(&salt)?;
            // A throwaway manager: validation only needs the creator from
            // the params themselves.
            let mut manager = OrderManager::new(Default::default(), params.user);
            let hash = manager.create_order(params, salt, U256::zero())?;
            info!(order = ?hash, "order is valid");
            println!("{:?}", hash);
        }
        Command::Hash { file, salt } => {
            let params = load_params(&file)?;
            let salt = parse_salt(&salt)?;
            println!("{:?}", order_hash(&params, salt)?);
        }
    }
    Ok(())
}

fn load_params(path: &str) -> Result<OrderParams> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read order params file: {}", path))?;
    serde_json::from_str(&contents).context("Failed to parse order params JSON")
}

fn parse_salt(salt: &str) -> Result<H256> {
    let stripped = salt.strip_prefix("0x").unwrap_or(salt);
    let bytes = hex::decode(stripped).context("Salt is not valid hex")?;
    if bytes.len() != 32 {
        anyhow::bail!("Salt must be exactly 32 bytes, got {}", bytes.len());
    }
    Ok(H256::from_slice(&bytes))
}
