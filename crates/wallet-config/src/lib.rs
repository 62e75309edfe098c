//! Configuration module for the wallet.
//!
//! This module provides structures and utilities for managing wallet
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are present and within bounds.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use wallet_types::{
	networks::deserialize_networks, Address, NetworkConfig, NetworkId, NetworksConfig,
	PincodeType, TokenInfo,
};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Account identity and authentication settings.
	pub wallet: WalletConfig,
	/// Network and token configurations keyed by network id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Storage backend used by the keychain and the standby registry.
	pub storage: StorageConfig,
	/// Transaction delivery and receipt polling.
	pub delivery: DeliveryConfig,
	/// PIN gate and password cache settings.
	#[serde(default)]
	pub pincode: PincodeConfig,
}

/// Account identity and authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
	/// Address of the wallet account.
	pub account: Address,
	/// How the user authenticates. Defaults to `unset`.
	#[serde(default)]
	pub pincode_type: PincodeType,
	/// Buffer size of the action bus.
	#[serde(default = "default_event_bus_capacity")]
	pub event_bus_capacity: usize,
}

fn default_event_bus_capacity() -> usize {
	1000
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for delivery mechanisms.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
	/// Map of delivery implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval between receipt polls. Defaults to 1000 ms.
	#[serde(default = "default_receipt_poll_interval_ms")]
	pub receipt_poll_interval_ms: u64,
	/// How long to wait for a receipt before giving up. Defaults to 300 s.
	#[serde(default = "default_receipt_timeout_seconds")]
	pub receipt_timeout_seconds: u64,
}

fn default_receipt_poll_interval_ms() -> u64 {
	1000
}

fn default_receipt_timeout_seconds() -> u64 {
	300
}

/// PIN gate and password cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PincodeConfig {
	/// Reject PINs found in the bundled blocklist when setting a new PIN.
	#[serde(default = "default_true")]
	pub use_expanded_blocklist: bool,
	/// How long a resolved password request keeps answering followers.
	#[serde(default = "default_password_release_delay_ms")]
	pub password_release_delay_ms: u64,
	/// Pause after a biometric prompt so its animation can finish.
	#[serde(default = "default_biometry_verification_delay_ms")]
	pub biometry_verification_delay_ms: u64,
	/// Lifetime of cached pins, peppers and passwords.
	#[serde(default = "default_cache_timeout_seconds")]
	pub cache_timeout_seconds: u64,
	/// How long the account stays unlocked after a password check.
	#[serde(default = "default_unlock_duration_seconds")]
	pub unlock_duration_seconds: u64,
}

fn default_true() -> bool {
	true
}

fn default_password_release_delay_ms() -> u64 {
	500
}

fn default_biometry_verification_delay_ms() -> u64 {
	800
}

fn default_cache_timeout_seconds() -> u64 {
	300
}

fn default_unlock_duration_seconds() -> u64 {
	600
}

impl Default for PincodeConfig {
	fn default() -> Self {
		Self {
			use_expanded_blocklist: default_true(),
			password_release_delay_ms: default_password_release_delay_ms(),
			biometry_verification_delay_ms: default_biometry_verification_delay_ms(),
			cache_timeout_seconds: default_cache_timeout_seconds(),
			unlock_duration_seconds: default_unlock_duration_seconds(),
		}
	}
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply in reverse so earlier offsets stay valid
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following its `include` list.
	///
	/// Sections, and networks within `networks`, must each be defined in
	/// exactly one file.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		loader::load(Path::new(path)).await
	}

	/// Returns the configuration of a network, if configured.
	pub fn network(&self, network_id: NetworkId) -> Option<&NetworkConfig> {
		self.networks.get(&network_id)
	}

	/// Whether gas is subsidized for flows on this network.
	pub fn is_gas_subsidized(&self, network_id: NetworkId) -> bool {
		self.network(network_id)
			.is_some_and(|network| network.gas_subsidized)
	}

	/// Token metadata for every token configured across all networks.
	pub fn tokens(&self) -> Vec<TokenInfo> {
		let mut tokens: Vec<TokenInfo> = self
			.networks
			.iter()
			.flat_map(|(network_id, network)| {
				network.tokens.iter().map(move |token| TokenInfo {
					token_id: TokenInfo::token_id_for(*network_id, token.address.as_ref()),
					network_id: *network_id,
					address: token.address,
					symbol: token.symbol.clone(),
					decimals: token.decimals,
					is_native: token.is_native,
					is_fee_currency: token.is_fee_currency || token.is_native,
				})
			})
			.collect();
		tokens.sort_by(|a, b| a.token_id.cmp(&b.token_id));
		tokens
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.wallet.account == Address::ZERO {
			return Err(ConfigError::Validation(
				"Wallet account cannot be the zero address".into(),
			));
		}
		if self.wallet.event_bus_capacity == 0 {
			return Err(ConfigError::Validation(
				"event_bus_capacity must be greater than 0".into(),
			));
		}

		self.validate_networks()?;

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Delivery
		if self.delivery.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one delivery implementation required".into(),
			));
		}
		if !(100..=60_000).contains(&self.delivery.receipt_poll_interval_ms) {
			return Err(ConfigError::Validation(
				"receipt_poll_interval_ms must be between 100 and 60000".into(),
			));
		}
		if self.delivery.receipt_timeout_seconds == 0 || self.delivery.receipt_timeout_seconds > 3600 {
			return Err(ConfigError::Validation(
				"receipt_timeout_seconds must be between 1 and 3600".into(),
			));
		}
		if self.delivery.receipt_poll_interval_ms >= self.delivery.receipt_timeout_seconds * 1000 {
			return Err(ConfigError::Validation(
				"receipt_poll_interval_ms must be shorter than receipt_timeout_seconds".into(),
			));
		}

		// Pincode
		if self.pincode.password_release_delay_ms > 10_000 {
			return Err(ConfigError::Validation(
				"password_release_delay_ms cannot exceed 10000".into(),
			));
		}
		if self.pincode.cache_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"cache_timeout_seconds must be greater than 0".into(),
			));
		}
		if self.pincode.unlock_duration_seconds == 0 {
			return Err(ConfigError::Validation(
				"unlock_duration_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}

	fn validate_networks(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}

		for (network_id, network) in &self.networks {
			if network.chain_id == 0 {
				return Err(ConfigError::Validation(format!(
					"Network {} must have a non-zero chain_id",
					network_id
				)));
			}
			if !network.rpc_url.starts_with("http://") && !network.rpc_url.starts_with("https://") {
				return Err(ConfigError::Validation(format!(
					"Network {} rpc_url must be an http(s) url",
					network_id
				)));
			}
			let native_count = network.tokens.iter().filter(|t| t.is_native).count();
			if native_count > 1 {
				return Err(ConfigError::Validation(format!(
					"Network {} has more than one native token",
					network_id
				)));
			}
			for token in &network.tokens {
				if token.symbol.is_empty() {
					return Err(ConfigError::Validation(format!(
						"Network {} has a token without symbol",
						network_id
					)));
				}
				if !token.is_native && token.address.is_none() {
					return Err(ConfigError::Validation(format!(
						"Token {} on network {} must have an address",
						token.symbol, network_id
					)));
				}
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[wallet]
account = "${TEST_WALLET_ACCOUNT:-0x0000000000000000000000000000000000007E57}"
pincode_type = "custom-pin"

[networks.celo-alfajores]
chain_id = 44787
rpc_url = "https://alfajores-forno.celo-testnet.org"
jumpstart_contract_address = "0x7bf3fefe9881127553d23a8cd225a2c2442c438c"
[[networks.celo-alfajores.tokens]]
symbol = "CELO"
decimals = 18
is_native = true
[[networks.celo-alfajores.tokens]]
address = "0x874069fa1eb16d44d622f2e0ca25eea172369bc1"
symbol = "cUSD"
decimals = 18
is_fee_currency = true

[networks.arbitrum-sepolia]
chain_id = 421614
rpc_url = "https://sepolia-rollup.arbitrum.io/rpc"
gas_subsidized = true
[[networks.arbitrum-sepolia.tokens]]
address = "0x75faf114eafb1bdbe2f0316df893fd58ce46aa4d"
symbol = "USDC"
decimals = 6

[storage]
primary = "memory"
[storage.implementations.memory]

[delivery]
receipt_poll_interval_ms = 500
[delivery.implementations.evm_alloy]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_WALLET_RPC_HOST", "localhost");
		std::env::set_var("TEST_WALLET_RPC_PORT", "8545");

		let input = "rpc_url = \"http://${TEST_WALLET_RPC_HOST}:${TEST_WALLET_RPC_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("TEST_WALLET_RPC_HOST");
		std::env::remove_var("TEST_WALLET_RPC_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_WALLET_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_WALLET_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("MISSING_WALLET_VAR"));
	}

	#[test]
	fn test_parse_full_config() {
		let config: Config = BASE_CONFIG.parse().unwrap();

		assert_eq!(config.wallet.pincode_type, PincodeType::CustomPin);
		assert_eq!(config.networks.len(), 2);
		assert!(config.is_gas_subsidized(NetworkId::ArbitrumSepolia));
		assert!(!config.is_gas_subsidized(NetworkId::CeloAlfajores));
		assert_eq!(config.delivery.receipt_poll_interval_ms, 500);
		assert_eq!(config.delivery.receipt_timeout_seconds, 300);

		// pincode section is optional
		assert!(config.pincode.use_expanded_blocklist);
		assert_eq!(config.pincode.password_release_delay_ms, 500);
		assert_eq!(config.pincode.unlock_duration_seconds, 600);

		let tokens = config.tokens();
		assert_eq!(tokens.len(), 3);
		let celo = tokens
			.iter()
			.find(|t| t.token_id == "celo-alfajores:native")
			.unwrap();
		assert!(celo.is_fee_currency);
		assert!(tokens
			.iter()
			.any(|t| t.token_id == "arbitrum-sepolia:0x75faf114eafb1bdbe2f0316df893fd58ce46aa4d"));
	}

	#[test]
	fn test_unknown_network_rejected() {
		let config_str = BASE_CONFIG.replace("arbitrum-sepolia", "arbitrum-nova");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("arbitrum-nova"), "got: {}", err);
	}

	#[test]
	fn test_missing_primary_storage_rejected() {
		let config_str = BASE_CONFIG.replace("primary = \"memory\"", "primary = \"file\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary storage 'file' not found in implementations"));
	}

	#[test]
	fn test_poll_interval_bounds() {
		let config_str = BASE_CONFIG.replace(
			"receipt_poll_interval_ms = 500",
			"receipt_poll_interval_ms = 5",
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("receipt_poll_interval_ms"));
	}

	#[test]
	fn test_token_without_address_rejected() {
		let config_str = BASE_CONFIG.replace(
			"address = \"0x75faf114eafb1bdbe2f0316df893fd58ce46aa4d\"\n",
			"",
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("must have an address"), "got: {}", err);
	}
}
