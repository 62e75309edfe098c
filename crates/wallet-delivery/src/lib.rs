//! Transaction delivery for the wallet.
//!
//! Broadcasts prepared transactions and waits for their receipts. Each
//! network is served by a [`DeliveryInterface`] implementation, and the
//! [`DeliveryService`] routes calls to the right one by [`NetworkId`].

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wallet_types::{
	Address, Bytes, ConfigSchema, ImplementationRegistry, NetworkId, NetworksConfig,
	PreparedTransaction, TransactionHash, TransactionReceipt,
};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The node refused the transaction.
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	#[error("No provider available for network {0}")]
	NoProviderAvailable(NetworkId),
	#[error("Timed out after {seconds}s waiting for receipt of {hash}")]
	Timeout { hash: TransactionHash, seconds: u64 },
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Cannot pay gas in a fee currency on {network_id}: {reason}")]
	FeeCurrencyUnsupported { network_id: NetworkId, reason: String },
}

/// How receipts are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolling {
	pub interval: Duration,
	pub timeout: Duration,
}

impl Default for ReceiptPolling {
	fn default() -> Self {
		Self {
			interval: Duration::from_secs(1),
			timeout: Duration::from_secs(300),
		}
	}
}

/// Chain access for one or more networks.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Signs (or has the node sign) and broadcasts a prepared transaction.
	async fn send_transaction(
		&self,
		network_id: NetworkId,
		tx: &PreparedTransaction,
	) -> Result<TransactionHash, DeliveryError>;

	/// Current receipt of a transaction, `None` while it is not mined.
	async fn get_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Polls until the transaction is mined or the timeout is reached.
	async fn wait_for_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Executes a read-only call.
	async fn call(
		&self,
		network_id: NetworkId,
		to: Address,
		data: Bytes,
	) -> Result<Bytes, DeliveryError>;

	async fn get_block_number(&self, network_id: NetworkId) -> Result<u64, DeliveryError>;
}

/// Polls `get_receipt` every `polling.interval` until it yields a receipt.
///
/// Shared by implementations whose `wait_for_receipt` is a plain poll.
pub async fn poll_for_receipt<D>(
	delivery: &D,
	network_id: NetworkId,
	hash: &TransactionHash,
	polling: ReceiptPolling,
) -> Result<TransactionReceipt, DeliveryError>
where
	D: DeliveryInterface + ?Sized,
{
	let started = tokio::time::Instant::now();
	loop {
		if let Some(receipt) = delivery.get_receipt(network_id, hash).await? {
			return Ok(receipt);
		}
		if started.elapsed() >= polling.timeout {
			return Err(DeliveryError::Timeout {
				hash: *hash,
				seconds: polling.timeout.as_secs(),
			});
		}
		tracing::trace!(tx_hash = %hash, network = %network_id, "Receipt not available yet");
		tokio::time::sleep(polling.interval).await;
	}
}

/// Type alias for delivery factory functions.
pub type DeliveryFactory = fn(
	&toml::Value,
	&NetworksConfig,
	ReceiptPolling,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Returns every registered delivery implementation as `(name, factory)`.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Routes delivery calls to the implementation serving each network.
pub struct DeliveryService {
	providers: HashMap<NetworkId, Arc<dyn DeliveryInterface>>,
}

impl DeliveryService {
	pub fn new(providers: HashMap<NetworkId, Arc<dyn DeliveryInterface>>) -> Self {
		Self { providers }
	}

	/// Serves every network in `network_ids` with the same implementation.
	pub fn single(
		delivery: Arc<dyn DeliveryInterface>,
		network_ids: impl IntoIterator<Item = NetworkId>,
	) -> Self {
		let providers = network_ids
			.into_iter()
			.map(|network_id| (network_id, Arc::clone(&delivery)))
			.collect();
		Self { providers }
	}

	pub fn networks(&self) -> impl Iterator<Item = NetworkId> + '_ {
		self.providers.keys().copied()
	}

	fn provider(&self, network_id: NetworkId) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		self.providers
			.get(&network_id)
			.ok_or(DeliveryError::NoProviderAvailable(network_id))
	}

	pub async fn send_transaction(
		&self,
		network_id: NetworkId,
		tx: &PreparedTransaction,
	) -> Result<TransactionHash, DeliveryError> {
		self.provider(network_id)?
			.send_transaction(network_id, tx)
			.await
	}

	pub async fn get_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		self.provider(network_id)?.get_receipt(network_id, hash).await
	}

	pub async fn wait_for_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.provider(network_id)?
			.wait_for_receipt(network_id, hash)
			.await
	}

	/// Waits for all receipts concurrently, each hash on its own.
	///
	/// Results come back in the order of `hashes`; a timeout on one hash
	/// leaves the receipts of the others intact.
	pub async fn wait_for_receipts(
		&self,
		network_id: NetworkId,
		hashes: &[TransactionHash],
	) -> Vec<Result<TransactionReceipt, DeliveryError>> {
		let provider = match self.provider(network_id) {
			Ok(provider) => provider,
			Err(_) => {
				return hashes
					.iter()
					.map(|_| Err(DeliveryError::NoProviderAvailable(network_id)))
					.collect()
			},
		};
		join_all(
			hashes
				.iter()
				.map(|hash| provider.wait_for_receipt(network_id, hash)),
		)
		.await
	}

	pub async fn call(
		&self,
		network_id: NetworkId,
		to: Address,
		data: Bytes,
	) -> Result<Bytes, DeliveryError> {
		self.provider(network_id)?.call(network_id, to, data).await
	}

	pub async fn get_block_number(&self, network_id: NetworkId) -> Result<u64, DeliveryError> {
		self.provider(network_id)?.get_block_number(network_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::ScriptedDelivery;
	use wallet_types::{ReceiptStatus, B256};

	fn hash(byte: u8) -> TransactionHash {
		TransactionHash(B256::repeat_byte(byte))
	}

	#[tokio::test]
	async fn test_receipts_keep_submission_order() {
		let delivery = Arc::new(ScriptedDelivery::new());
		// The first receipt shows up last
		delivery.mine_after(hash(1), ReceiptStatus::Success, 3);
		delivery.mine_after(hash(2), ReceiptStatus::Reverted, 0);
		delivery.mine_after(hash(3), ReceiptStatus::Success, 1);

		let service = DeliveryService::single(delivery, [NetworkId::CeloAlfajores]);
		let receipts: Vec<_> = service
			.wait_for_receipts(NetworkId::CeloAlfajores, &[hash(1), hash(2), hash(3)])
			.await
			.into_iter()
			.map(Result::unwrap)
			.collect();

		let order: Vec<_> = receipts.iter().map(|r| r.hash).collect();
		assert_eq!(order, vec![hash(1), hash(2), hash(3)]);
		assert_eq!(receipts[1].status, ReceiptStatus::Reverted);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_keeps_other_receipts() {
		let delivery = Arc::new(ScriptedDelivery::new());
		delivery.mine_after(hash(1), ReceiptStatus::Success, 0);
		// hash(2) is never mined

		let service = DeliveryService::single(delivery, [NetworkId::CeloAlfajores]);
		let results = service
			.wait_for_receipts(NetworkId::CeloAlfajores, &[hash(1), hash(2)])
			.await;

		assert_eq!(results.len(), 2);
		assert_eq!(results[0].as_ref().unwrap().hash, hash(1));
		assert!(matches!(results[1], Err(DeliveryError::Timeout { .. })));
	}

	#[tokio::test]
	async fn test_receipts_on_unserved_network() {
		let service = DeliveryService::single(
			Arc::new(ScriptedDelivery::new()),
			[NetworkId::CeloAlfajores],
		);

		let results = service
			.wait_for_receipts(NetworkId::BaseMainnet, &[hash(1)])
			.await;
		assert!(matches!(
			results[..],
			[Err(DeliveryError::NoProviderAvailable(NetworkId::BaseMainnet))]
		));
	}

	#[tokio::test]
	async fn test_unknown_network() {
		let service = DeliveryService::single(
			Arc::new(ScriptedDelivery::new()),
			[NetworkId::CeloAlfajores],
		);

		let err = service
			.get_block_number(NetworkId::ArbitrumOne)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			DeliveryError::NoProviderAvailable(NetworkId::ArbitrumOne)
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_poll_times_out() {
		let delivery = ScriptedDelivery::new();
		let polling = ReceiptPolling {
			interval: Duration::from_millis(100),
			timeout: Duration::from_secs(2),
		};

		let err = poll_for_receipt(&delivery, NetworkId::CeloAlfajores, &hash(9), polling)
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Timeout { seconds: 2, .. }));
	}
}
