//! Configuration builder for creating test and development configurations.
//!
//! Builds a [`Config`] directly, without going through TOML parsing, so
//! tests can tweak a single knob and keep sensible defaults for the rest.

use crate::{Config, DeliveryConfig, PincodeConfig, StorageConfig, WalletConfig};
use std::collections::HashMap;
use wallet_types::{Address, NetworkConfig, NetworkId, PincodeType, TokenConfig};

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	account: Address,
	pincode_type: PincodeType,
	networks: HashMap<NetworkId, NetworkConfig>,
	storage_primary: String,
	receipt_poll_interval_ms: u64,
	receipt_timeout_seconds: u64,
	pincode: PincodeConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a builder with a single local Celo network and fast timings.
	pub fn new() -> Self {
		let mut networks = HashMap::new();
		networks.insert(
			NetworkId::CeloAlfajores,
			NetworkConfig {
				chain_id: 44787,
				rpc_url: "http://localhost:8545".to_string(),
				gas_subsidized: false,
				jumpstart_contract_address: None,
				tokens: vec![TokenConfig {
					address: None,
					symbol: "CELO".to_string(),
					decimals: 18,
					is_fee_currency: true,
					is_native: true,
				}],
			},
		);

		Self {
			account: Address::repeat_byte(0x11),
			pincode_type: PincodeType::CustomPin,
			networks,
			storage_primary: "memory".to_string(),
			receipt_poll_interval_ms: 100,
			receipt_timeout_seconds: 5,
			pincode: PincodeConfig {
				password_release_delay_ms: 0,
				biometry_verification_delay_ms: 0,
				..PincodeConfig::default()
			},
		}
	}

	pub fn account(mut self, account: Address) -> Self {
		self.account = account;
		self
	}

	pub fn pincode_type(mut self, pincode_type: PincodeType) -> Self {
		self.pincode_type = pincode_type;
		self
	}

	/// Adds or replaces a network.
	pub fn network(mut self, network_id: NetworkId, network: NetworkConfig) -> Self {
		self.networks.insert(network_id, network);
		self
	}

	pub fn storage_primary(mut self, primary: String) -> Self {
		self.storage_primary = primary;
		self
	}

	pub fn receipt_poll_interval_ms(mut self, interval: u64) -> Self {
		self.receipt_poll_interval_ms = interval;
		self
	}

	pub fn receipt_timeout_seconds(mut self, timeout: u64) -> Self {
		self.receipt_timeout_seconds = timeout;
		self
	}

	pub fn pincode(mut self, pincode: PincodeConfig) -> Self {
		self.pincode = pincode;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			self.storage_primary.clone(),
			toml::Value::Table(toml::Table::new()),
		);

		Config {
			wallet: WalletConfig {
				account: self.account,
				pincode_type: self.pincode_type,
				event_bus_capacity: 1000,
			},
			networks: self.networks,
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: storage_implementations,
			},
			delivery: DeliveryConfig {
				implementations: HashMap::new(),
				receipt_poll_interval_ms: self.receipt_poll_interval_ms,
				receipt_timeout_seconds: self.receipt_timeout_seconds,
			},
			pincode: self.pincode,
		}
	}
}
