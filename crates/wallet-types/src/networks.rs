//! Network configuration types for multi-chain wallet operations.
//!
//! This module defines the identifiers of the networks the wallet talks to
//! and the configuration structures holding RPC endpoints, gas subsidy
//! flags, contract addresses and supported tokens for each of them.

use crate::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a network the wallet can submit transactions to.
///
/// Serialized in kebab-case, e.g. `celo-mainnet` or `arbitrum-sepolia`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkId {
	CeloMainnet,
	CeloAlfajores,
	EthereumMainnet,
	EthereumSepolia,
	ArbitrumOne,
	ArbitrumSepolia,
	OpMainnet,
	OpSepolia,
	PolygonPosMainnet,
	PolygonPosAmoy,
	BaseMainnet,
	BaseSepolia,
}

/// Chain family a network belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkKind {
	Celo,
	Ethereum,
	Arbitrum,
	Optimism,
	PolygonPoS,
	Base,
}

impl NetworkId {
	/// Returns the string representation of the network id.
	pub fn as_str(&self) -> &'static str {
		match self {
			NetworkId::CeloMainnet => "celo-mainnet",
			NetworkId::CeloAlfajores => "celo-alfajores",
			NetworkId::EthereumMainnet => "ethereum-mainnet",
			NetworkId::EthereumSepolia => "ethereum-sepolia",
			NetworkId::ArbitrumOne => "arbitrum-one",
			NetworkId::ArbitrumSepolia => "arbitrum-sepolia",
			NetworkId::OpMainnet => "op-mainnet",
			NetworkId::OpSepolia => "op-sepolia",
			NetworkId::PolygonPosMainnet => "polygon-pos-mainnet",
			NetworkId::PolygonPosAmoy => "polygon-pos-amoy",
			NetworkId::BaseMainnet => "base-mainnet",
			NetworkId::BaseSepolia => "base-sepolia",
		}
	}

	/// Returns an iterator over all NetworkId variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::CeloMainnet,
			Self::CeloAlfajores,
			Self::EthereumMainnet,
			Self::EthereumSepolia,
			Self::ArbitrumOne,
			Self::ArbitrumSepolia,
			Self::OpMainnet,
			Self::OpSepolia,
			Self::PolygonPosMainnet,
			Self::PolygonPosAmoy,
			Self::BaseMainnet,
			Self::BaseSepolia,
		]
		.into_iter()
	}

	/// Chain family of this network.
	pub fn kind(&self) -> NetworkKind {
		match self {
			NetworkId::CeloMainnet | NetworkId::CeloAlfajores => NetworkKind::Celo,
			NetworkId::EthereumMainnet | NetworkId::EthereumSepolia => NetworkKind::Ethereum,
			NetworkId::ArbitrumOne | NetworkId::ArbitrumSepolia => NetworkKind::Arbitrum,
			NetworkId::OpMainnet | NetworkId::OpSepolia => NetworkKind::Optimism,
			NetworkId::PolygonPosMainnet | NetworkId::PolygonPosAmoy => NetworkKind::PolygonPoS,
			NetworkId::BaseMainnet | NetworkId::BaseSepolia => NetworkKind::Base,
		}
	}

	/// Whether transactions on this network may pay gas in an ERC-20 fee currency.
	pub fn supports_fee_currency(&self) -> bool {
		self.kind() == NetworkKind::Celo
	}
}

impl fmt::Display for NetworkId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for NetworkId {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		NetworkId::all()
			.find(|id| id.as_str() == s)
			.ok_or_else(|| format!("Unknown network id '{}'", s))
	}
}

/// Configuration for a token on a specific network.
///
/// Native tokens have no contract address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TokenConfig {
	#[serde(default)]
	pub address: Option<Address>,
	pub symbol: String,
	pub decimals: u8,
	/// Whether the token may be used to pay for gas.
	#[serde(default)]
	pub is_fee_currency: bool,
	/// Whether this is the native gas token of the network.
	#[serde(default)]
	pub is_native: bool,
}

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `chain_id` - EIP-155 chain id
/// * `rpc_url` - The HTTP(S) RPC endpoint for blockchain interaction
/// * `gas_subsidized` - Whether flows on this network are gas subsidized
/// * `jumpstart_contract_address` - Escrow contract used by jumpstart links
/// * `tokens` - List of supported tokens on this network
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub chain_id: u64,
	pub rpc_url: String,
	#[serde(default)]
	pub gas_subsidized: bool,
	#[serde(default)]
	pub jumpstart_contract_address: Option<Address>,
	#[serde(default)]
	pub tokens: Vec<TokenConfig>,
}

/// Networks configuration keyed by network id.
pub type NetworksConfig = HashMap<NetworkId, NetworkConfig>;

/// Helper function to deserialize network configurations from TOML.
///
/// TOML table keys are plain strings, so each key is parsed into a
/// [`NetworkId`] here.
///
/// # Errors
///
/// Returns a deserialization error if a key is not a known network id or
/// the underlying network configuration is invalid.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let network_id = key.parse::<NetworkId>().map_err(serde::de::Error::custom)?;
		result.insert(network_id, value);
	}

	Ok(result)
}
