//! Token metadata lookups for the flows.
//!
//! The `TokenManager` is built once from the configured networks and answers
//! token-id, address and fee-currency lookups.

use std::collections::HashMap;
use wallet_types::{Address, NetworkId, TokenInfo};

pub struct TokenManager {
	tokens: HashMap<String, TokenInfo>,
}

impl TokenManager {
	pub fn new(tokens: Vec<TokenInfo>) -> Self {
		Self {
			tokens: tokens
				.into_iter()
				.map(|token| (token.token_id.clone(), token))
				.collect(),
		}
	}

	pub fn get(&self, token_id: &str) -> Option<&TokenInfo> {
		self.tokens.get(token_id)
	}

	pub fn by_address(&self, network_id: NetworkId, address: &Address) -> Option<&TokenInfo> {
		self.get(&TokenInfo::token_id_for(network_id, Some(address)))
	}

	pub fn native(&self, network_id: NetworkId) -> Option<&TokenInfo> {
		self.tokens
			.values()
			.find(|token| token.network_id == network_id && token.is_native)
	}

	/// Token id of the currency a transaction pays gas in.
	///
	/// `fee_currency` is `None` for the native token. Unknown fee currencies
	/// yield `None`.
	pub fn fee_currency_id(
		&self,
		network_id: NetworkId,
		fee_currency: Option<&Address>,
	) -> Option<String> {
		let token = match fee_currency {
			Some(address) => self.by_address(network_id, address),
			None => self.native(network_id),
		}?;
		token.is_fee_currency.then(|| token.token_id.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn token(network_id: NetworkId, address: Option<Address>, symbol: &str) -> TokenInfo {
		TokenInfo {
			token_id: TokenInfo::token_id_for(network_id, address.as_ref()),
			network_id,
			address,
			symbol: symbol.to_string(),
			decimals: 18,
			is_native: address.is_none(),
			is_fee_currency: address.is_none() || symbol == "cUSD",
		}
	}

	#[test]
	fn test_fee_currency_lookup() {
		let cusd = Address::repeat_byte(0xcd);
		let other = Address::repeat_byte(0x0f);
		let manager = TokenManager::new(vec![
			token(NetworkId::CeloAlfajores, None, "CELO"),
			token(NetworkId::CeloAlfajores, Some(cusd), "cUSD"),
			token(NetworkId::CeloAlfajores, Some(other), "OTHER"),
		]);

		assert_eq!(
			manager.fee_currency_id(NetworkId::CeloAlfajores, None),
			Some("celo-alfajores:native".to_string())
		);
		assert_eq!(
			manager.fee_currency_id(NetworkId::CeloAlfajores, Some(&cusd)),
			Some(TokenInfo::token_id_for(NetworkId::CeloAlfajores, Some(&cusd)))
		);
		assert_eq!(
			manager.fee_currency_id(NetworkId::CeloAlfajores, Some(&other)),
			None
		);
		assert_eq!(manager.fee_currency_id(NetworkId::BaseMainnet, None), None);
		assert_eq!(
			manager
				.by_address(NetworkId::CeloAlfajores, &cusd)
				.map(|t| t.symbol.as_str()),
			Some("cUSD")
		);
	}
}
