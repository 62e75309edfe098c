//! Subcommands of the wallet CLI.

use clap::Subcommand;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use wallet_config::Config;
use wallet_core::{HostServices, WalletBuilder, WalletEngine, WalletFactories};
use wallet_delivery::implementations::evm::alloy::AlloyAccounts;
use wallet_pincode::{MemoryMnemonicStore, StaticPinPrompt};
use wallet_types::{HeadlessDevice, NetworkId, SecretString, TracingAnalytics, TransactionHash};

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Build the wallet from the configuration and summarize it
	ValidateConfig,
	/// Check a PIN against the wallet account
	CheckPin {
		#[arg(long, env = "WALLET_PIN", hide_env_values = true)]
		pin: String,
	},
	/// Check whether a PIN may be chosen as a new PIN
	ValidatePin { pin: String },
	/// Look up the receipt of a transaction
	Receipt {
		#[arg(long)]
		network: NetworkId,
		hash: TransactionHash,
		/// Poll until the transaction is mined
		#[arg(long)]
		wait: bool,
	},
	/// Confirm pending standby transactions that were mined and drop
	/// the ones settled earlier
	Reconcile,
}

/// Runs `command` and returns what to print.
pub async fn run(command: Command, config: Config) -> Result<String, Box<dyn Error>> {
	let engine = build_engine(config).await?;

	match command {
		Command::ValidateConfig => {
			let mut networks: Vec<NetworkId> = engine.config().networks.keys().copied().collect();
			networks.sort();
			let mut delivery: Vec<NetworkId> = engine.delivery().networks().collect();
			delivery.sort();
			let summary = json!({
				"account": engine.config().wallet.account,
				"networks": networks,
				"deliveryNetworks": delivery,
				"tokens": engine.config().tokens().len(),
				"pendingStandby": engine.standby().pending().await.len(),
			});
			Ok(serde_json::to_string_pretty(&summary)?)
		},
		Command::CheckPin { pin } => {
			let account = engine.config().wallet.account;
			let correct = engine
				.passwords()
				.check_pin(&SecretString::from(pin), &account)
				.await?;
			if correct {
				Ok("PIN is correct".to_string())
			} else {
				Err("PIN is incorrect".into())
			}
		},
		Command::ValidatePin { pin } => {
			engine.validate_new_pin(&pin)?;
			Ok("PIN accepted".to_string())
		},
		Command::Receipt {
			network,
			hash,
			wait,
		} => {
			let receipt = if wait {
				Some(engine.delivery().wait_for_receipt(network, &hash).await?)
			} else {
				engine.delivery().get_receipt(network, &hash).await?
			};
			match receipt {
				Some(receipt) => Ok(serde_json::to_string_pretty(&receipt)?),
				None => Ok(format!("Transaction {} is not mined yet", hash)),
			}
		},
		Command::Reconcile => {
			let report = engine.reconcile_standby().await?;
			Ok(format!(
				"Confirmed {} and removed {} standby transaction(s)",
				report.confirmed, report.removed
			))
		},
	}
}

/// Builds the engine for a headless run.
///
/// The account is unlocked through the node of the first configured
/// network, and there is no interactive PIN entry.
async fn build_engine(config: Config) -> Result<WalletEngine, Box<dyn Error>> {
	let account_network = config
		.networks
		.keys()
		.min()
		.copied()
		.ok_or("No networks configured")?;
	let rpc_url = config
		.network(account_network)
		.map(|network| network.rpc_url.clone())
		.ok_or("No networks configured")?;
	tracing::debug!(network = %account_network, "Using network node for account unlocking");

	let device = Arc::new(HeadlessDevice::new());
	let host = HostServices {
		prompt: Arc::new(StaticPinPrompt::new(None)),
		navigator: device.clone(),
		haptics: device,
		analytics: Arc::new(TracingAnalytics),
		accounts: Arc::new(AlloyAccounts::new(&rpc_url)?),
		mnemonics: Arc::new(MemoryMnemonicStore::new()),
		keychain: None,
		jumpstart_relay: None,
	};

	let engine = WalletBuilder::new(config)
		.build(host, WalletFactories::default())
		.await?;
	Ok(engine)
}
