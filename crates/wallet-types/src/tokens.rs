//! Token metadata types.

use crate::{Address, NetworkId};
use serde::{Deserialize, Serialize};

/// Metadata for a token known to the wallet.
///
/// Token ids have the form `<network-id>:<lowercase address>` for ERC-20
/// tokens and `<network-id>:native` for the gas token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
	pub token_id: String,
	pub network_id: NetworkId,
	pub address: Option<Address>,
	pub symbol: String,
	pub decimals: u8,
	#[serde(default)]
	pub is_native: bool,
	#[serde(default)]
	pub is_fee_currency: bool,
}

impl TokenInfo {
	/// Builds the canonical token id for a token on a network.
	pub fn token_id_for(network_id: NetworkId, address: Option<&Address>) -> String {
		match address {
			Some(address) => format!("{}:{:#x}", network_id, address),
			None => format!("{}:native", network_id),
		}
	}
}

/// An amount of a token, kept as a decimal display string.
///
/// Negative values denote outgoing amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
	pub value: String,
	pub token_id: String,
}

impl TokenAmount {
	pub fn new(value: impl Into<String>, token_id: impl Into<String>) -> Self {
		Self {
			value: value.into(),
			token_id: token_id.into(),
		}
	}

	/// Same amount with the opposite sign.
	pub fn negated(&self) -> Self {
		let value = match self.value.strip_prefix('-') {
			Some(positive) => positive.to_string(),
			None if self.value.chars().all(|c| c == '0' || c == '.') => self.value.clone(),
			None => format!("-{}", self.value),
		};
		Self {
			value,
			token_id: self.token_id.clone(),
		}
	}
}
