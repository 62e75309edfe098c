//! Alloy-based EVM delivery.
//!
//! One HTTP provider per configured network. With a `signer_key` the
//! provider signs locally; without one, transactions are handed to the node
//! with `eth_sendTransaction` and signed by the account the node holds
//! (unlocked through [`AlloyAccounts`]).
//!
//! Alloy's Ethereum request type has no fee currency field. Transactions
//! paying gas in a fee currency are sent to the node as raw
//! `eth_sendTransaction` requests carrying `feeCurrency`, which only Celo
//! nodes accept and only for accounts the node signs for.

use crate::{poll_for_receipt, DeliveryError, DeliveryInterface, ReceiptPolling};
use alloy::consensus::TxReceipt;
use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use wallet_types::{
	AccountError, AccountUnlocker, Address, Bytes, ConfigSchema, Field, FieldType,
	ImplementationRegistry, NetworkId, NetworksConfig, PreparedTransaction, ReceiptLog,
	ReceiptStatus, Schema, SecretString, TransactionHash, TransactionReceipt, ValidationError, B256,
};

/// EVM delivery over alloy HTTP providers.
pub struct AlloyDelivery {
	providers: HashMap<NetworkId, DynProvider>,
	polling: ReceiptPolling,
	local_signing: bool,
}

impl AlloyDelivery {
	/// Connects a provider for each of `network_ids`.
	pub fn new(
		network_ids: Vec<NetworkId>,
		networks: &NetworksConfig,
		signer: Option<PrivateKeySigner>,
		polling: ReceiptPolling,
	) -> Result<Self, DeliveryError> {
		if network_ids.is_empty() {
			return Err(DeliveryError::Configuration(
				"At least one network must be served".to_string(),
			));
		}

		let local_signing = signer.is_some();
		let mut providers = HashMap::new();
		for network_id in network_ids {
			let network = networks.get(&network_id).ok_or_else(|| {
				DeliveryError::Configuration(format!(
					"Network {} not found in configuration",
					network_id
				))
			})?;

			let url: url::Url = network.rpc_url.parse().map_err(|e: url::ParseError| {
				DeliveryError::Configuration(format!(
					"Invalid RPC URL for network {}: {}",
					network_id, e
				))
			})?;

			let provider = match &signer {
				Some(signer) => {
					let signer = signer.clone().with_chain_id(Some(network.chain_id));
					ProviderBuilder::new()
						.wallet(EthereumWallet::from(signer))
						.connect_http(url)
						.erased()
				},
				None => ProviderBuilder::new().connect_http(url).erased(),
			};

			tracing::debug!(network = %network_id, chain_id = network.chain_id, "Connected provider");
			providers.insert(network_id, provider);
		}

		Ok(Self {
			providers,
			polling,
			local_signing,
		})
	}

	fn get_provider(&self, network_id: NetworkId) -> Result<&DynProvider, DeliveryError> {
		self.providers
			.get(&network_id)
			.ok_or(DeliveryError::NoProviderAvailable(network_id))
	}
}

fn to_request(tx: &PreparedTransaction) -> TransactionRequest {
	let mut request = TransactionRequest::default()
		.from(tx.from)
		.to(tx.to)
		.value(tx.value)
		.input(tx.data.clone().into())
		.gas_limit(tx.gas);

	if let Some(max_fee) = tx.max_fee_per_gas {
		request = request.max_fee_per_gas(max_fee);
	}
	if let Some(priority_fee) = tx.max_priority_fee_per_gas {
		request = request.max_priority_fee_per_gas(priority_fee);
	}
	if let Some(gas_price) = tx.gas_price {
		request = request.gas_price(gas_price);
	}
	request
}

/// Raw `eth_sendTransaction` params paying gas in `tx.fee_currency`, or
/// `None` when gas is paid in the native token.
fn fee_currency_request(
	network_id: NetworkId,
	tx: &PreparedTransaction,
	local_signing: bool,
) -> Result<Option<Value>, DeliveryError> {
	let Some(fee_currency) = tx.fee_currency else {
		return Ok(None);
	};
	if !network_id.supports_fee_currency() {
		return Err(DeliveryError::FeeCurrencyUnsupported {
			network_id,
			reason: "the network has no fee currencies".to_string(),
		});
	}
	if local_signing {
		return Err(DeliveryError::FeeCurrencyUnsupported {
			network_id,
			reason: "fee currency transactions must be signed by the node".to_string(),
		});
	}

	let mut request = serde_json::to_value(to_request(tx))
		.map_err(|e| DeliveryError::TransactionFailed(e.to_string()))?;
	if let Some(fields) = request.as_object_mut() {
		fields.insert("feeCurrency".to_string(), json!(fee_currency));
	}
	Ok(Some(request))
}

/// Configuration schema for [`AlloyDelivery`].
pub struct AlloyDeliverySchema;

impl AlloyDeliverySchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		Self.validate(config)
	}
}

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![
			Field::new("network_ids", FieldType::StringList).with_validator(|value| {
				let ids = value.as_array().map(Vec::as_slice).unwrap_or_default();
				if ids.is_empty() {
					return Err("network_ids cannot be empty".to_string());
				}
				for id in ids {
					let id = id.as_str().unwrap_or_default();
					NetworkId::from_str(id).map_err(|_| format!("Unknown network id: {}", id))?;
				}
				Ok(())
			}),
			Field::new("signer_key", FieldType::String).with_validator(|value| {
				let key = value.as_str().unwrap_or_default();
				PrivateKeySigner::from_str(key)
					.map(|_| ())
					.map_err(|_| "signer_key must be a hex private key".to_string())
			}),
		]);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	async fn send_transaction(
		&self,
		network_id: NetworkId,
		tx: &PreparedTransaction,
	) -> Result<TransactionHash, DeliveryError> {
		let provider = self.get_provider(network_id)?;

		let hash = match fee_currency_request(network_id, tx, self.local_signing)? {
			Some(request) => {
				tracing::debug!(fee_currency = ?tx.fee_currency, "Paying gas in fee currency");
				let hash: B256 = provider
					.raw_request("eth_sendTransaction".into(), (request,))
					.await
					.map_err(|e| DeliveryError::TransactionFailed(e.to_string()))?;
				TransactionHash(hash)
			},
			None => {
				let pending = provider
					.send_transaction(to_request(tx))
					.await
					.map_err(|e| DeliveryError::TransactionFailed(e.to_string()))?;
				TransactionHash(*pending.tx_hash())
			},
		};
		tracing::info!(tx_hash = %hash, network = %network_id, "Submitted transaction");
		Ok(hash)
	}

	async fn get_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let provider = self.get_provider(network_id)?;

		let receipt = provider
			.get_transaction_receipt(hash.0)
			.await
			.map_err(|e| {
				DeliveryError::Network(format!(
					"Failed to get receipt on {}: {}",
					network_id, e
				))
			})?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash),
			block_number: receipt.block_number.unwrap_or(0),
			status: if receipt.status() {
				ReceiptStatus::Success
			} else {
				ReceiptStatus::Reverted
			},
			gas_used: receipt.gas_used,
			cumulative_gas_used: receipt.inner.cumulative_gas_used(),
			effective_gas_price: receipt.effective_gas_price,
			logs: receipt
				.inner
				.logs()
				.iter()
				.map(|log| ReceiptLog {
					address: log.address(),
					topics: log.topics().to_vec(),
					data: log.data().data.clone(),
				})
				.collect(),
		}))
	}

	async fn wait_for_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		tracing::info!(
			tx_hash = %hash,
			timeout_seconds = self.polling.timeout.as_secs(),
			"Waiting for receipt"
		);
		poll_for_receipt(self, network_id, hash, self.polling).await
	}

	async fn call(
		&self,
		network_id: NetworkId,
		to: Address,
		data: Bytes,
	) -> Result<Bytes, DeliveryError> {
		let provider = self.get_provider(network_id)?;
		let request = TransactionRequest::default().to(to).input(data.into());

		provider
			.call(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Call to {} failed: {}", to, e)))
	}

	async fn get_block_number(&self, network_id: NetworkId) -> Result<u64, DeliveryError> {
		self.get_provider(network_id)?
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}
}

/// Unlocks node-managed accounts through the `personal` RPC namespace.
pub struct AlloyAccounts {
	provider: DynProvider,
}

impl AlloyAccounts {
	pub fn new(rpc_url: &str) -> Result<Self, DeliveryError> {
		let url: url::Url = rpc_url.parse().map_err(|e: url::ParseError| {
			DeliveryError::Configuration(format!("Invalid RPC URL: {}", e))
		})?;
		Ok(Self {
			provider: ProviderBuilder::new().connect_http(url).erased(),
		})
	}
}

#[async_trait]
impl AccountUnlocker for AlloyAccounts {
	async fn unlock(
		&self,
		account: &Address,
		password: &SecretString,
		duration_seconds: u64,
	) -> Result<bool, AccountError> {
		let params = (*account, password.expose_secret(), duration_seconds);
		match self
			.provider
			.raw_request::<_, bool>("personal_unlockAccount".into(), params)
			.await
		{
			Ok(unlocked) => Ok(unlocked),
			Err(e) if e.to_string().contains("could not decrypt") => {
				tracing::debug!(account = %account, "Wrong password for account");
				Ok(false)
			},
			Err(e) => Err(AccountError::Backend(e.to_string())),
		}
	}

	async fn update_passphrase(
		&self,
		_account: &Address,
		_old_password: &SecretString,
		_new_password: &SecretString,
	) -> Result<bool, AccountError> {
		Err(AccountError::Unsupported(
			"Node-managed accounts cannot change their passphrase over RPC".to_string(),
		))
	}
}

/// Factory function to create a delivery provider from configuration.
///
/// Configuration parameters:
/// - `network_ids`: networks to serve, all configured networks when absent
/// - `signer_key`: hex private key for local signing, node signing when absent
pub fn create_delivery(
	config: &toml::Value,
	networks: &NetworksConfig,
	polling: ReceiptPolling,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema::validate_config(config)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid configuration: {}", e)))?;

	let mut network_ids: Vec<NetworkId> = match config.get("network_ids") {
		Some(ids) => ids
			.as_array()
			.into_iter()
			.flatten()
			.filter_map(|id| id.as_str())
			.map(NetworkId::from_str)
			.collect::<Result<_, _>>()
			.map_err(|e| DeliveryError::Configuration(e.to_string()))?,
		None => networks.keys().copied().collect(),
	};
	network_ids.sort();

	let signer = config
		.get("signer_key")
		.and_then(|v| v.as_str())
		.map(PrivateKeySigner::from_str)
		.transpose()
		.map_err(|e| DeliveryError::Configuration(format!("Invalid signer key: {}", e)))?;

	let delivery = AlloyDelivery::new(network_ids, networks, signer, polling)?;
	Ok(Box::new(delivery))
}

/// Registry for the alloy delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}
