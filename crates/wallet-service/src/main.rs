//! Command-line entry point for the wallet.
//!
//! Loads the configuration, builds the wallet engine with the shipped
//! storage and delivery implementations, and runs one maintenance command:
//! validating the configuration or a new PIN, checking the PIN, looking up
//! receipts, or reconciling pending standby transactions.

use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Command;

/// Command-line arguments for the wallet.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = wallet_config::Config::from_file(config_path).await?;
	tracing::info!(account = %config.wallet.account, "Loaded configuration");

	let output = commands::run(args.command, config).await?;
	println!("{}", output);
	Ok(())
}
