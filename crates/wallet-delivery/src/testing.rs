//! Scripted delivery for tests in this and dependent crates.

use crate::{poll_for_receipt, DeliveryError, DeliveryInterface, ReceiptPolling};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use wallet_types::{
	Address, Bytes, ConfigSchema, NetworkId, PreparedTransaction, ReceiptLog, ReceiptStatus,
	Schema, TransactionHash, TransactionReceipt, ValidationError, B256,
};

struct Pending {
	status: ReceiptStatus,
	polls_left: usize,
	logs: Vec<ReceiptLog>,
}

/// Delivery that mines transactions as scripted.
///
/// Sent transactions get the hashes `0x00..01`, `0x00..02` and so on. Each
/// send takes the next queued outcome; a send with no queued outcome is
/// never mined.
#[derive(Default)]
pub struct ScriptedDelivery {
	sent: Mutex<Vec<(NetworkId, PreparedTransaction)>>,
	outcomes: Mutex<VecDeque<ReceiptStatus>>,
	pending: Mutex<HashMap<TransactionHash, Pending>>,
	/// Sends from this index on fail with the message.
	fail_sends: Mutex<Option<(usize, String)>>,
	calls: Mutex<HashMap<(Address, Bytes), Bytes>>,
}

impl ScriptedDelivery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Hash assigned to the `n`th sent transaction, counting from zero.
	pub fn hash_of(n: usize) -> TransactionHash {
		TransactionHash(B256::with_last_byte(n as u8 + 1))
	}

	/// Queues the receipt status of the next send.
	pub fn queue_outcome(&self, status: ReceiptStatus) -> &Self {
		self.outcomes.lock().unwrap().push_back(status);
		self
	}

	/// Makes `hash` mined with `status` after `polls` unsuccessful lookups.
	pub fn mine_after(&self, hash: TransactionHash, status: ReceiptStatus, polls: usize) {
		self.pending.lock().unwrap().insert(
			hash,
			Pending {
				status,
				polls_left: polls,
				logs: Vec::new(),
			},
		);
	}

	/// Makes `hash` mined successfully with `logs`.
	pub fn mine_with_logs(&self, hash: TransactionHash, logs: Vec<ReceiptLog>) {
		self.pending.lock().unwrap().insert(
			hash,
			Pending {
				status: ReceiptStatus::Success,
				polls_left: 0,
				logs,
			},
		);
	}

	/// Makes every following send fail with `message`.
	pub fn fail_sends(&self, message: &str) {
		let sent = self.sent.lock().unwrap().len();
		self.fail_sends_from(sent, message);
	}

	/// Makes the `index`th send, counting from zero, and all after it fail.
	pub fn fail_sends_from(&self, index: usize, message: &str) {
		*self.fail_sends.lock().unwrap() = Some((index, message.to_string()));
	}

	/// Answers calls of `data` on `to` with `output`.
	pub fn respond_to_call(&self, to: Address, data: Bytes, output: Bytes) {
		self.calls.lock().unwrap().insert((to, data), output);
	}

	pub fn sent(&self) -> Vec<(NetworkId, PreparedTransaction)> {
		self.sent.lock().unwrap().clone()
	}
}

struct NoSchema;

impl ConfigSchema for NoSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::empty().validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for ScriptedDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(NoSchema)
	}

	async fn send_transaction(
		&self,
		network_id: NetworkId,
		tx: &PreparedTransaction,
	) -> Result<TransactionHash, DeliveryError> {
		let hash = {
			let mut sent = self.sent.lock().unwrap();
			if let Some((from, message)) = self.fail_sends.lock().unwrap().clone() {
				if sent.len() >= from {
					return Err(DeliveryError::TransactionFailed(message));
				}
			}
			sent.push((network_id, tx.clone()));
			Self::hash_of(sent.len() - 1)
		};
		if let Some(status) = self.outcomes.lock().unwrap().pop_front() {
			self.mine_after(hash, status, 0);
		}
		Ok(hash)
	}

	async fn get_receipt(
		&self,
		_network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let mut pending = self.pending.lock().unwrap();
		let Some(entry) = pending.get_mut(hash) else {
			return Ok(None);
		};
		if entry.polls_left > 0 {
			entry.polls_left -= 1;
			return Ok(None);
		}
		Ok(Some(TransactionReceipt {
			hash: *hash,
			block_number: 100,
			status: entry.status,
			gas_used: 50_000,
			cumulative_gas_used: 50_000,
			effective_gas_price: 1_000_000_000,
			logs: entry.logs.clone(),
		}))
	}

	async fn wait_for_receipt(
		&self,
		network_id: NetworkId,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		let polling = ReceiptPolling {
			interval: Duration::from_millis(5),
			timeout: Duration::from_secs(5),
		};
		poll_for_receipt(self, network_id, hash, polling).await
	}

	async fn call(
		&self,
		_network_id: NetworkId,
		to: Address,
		data: Bytes,
	) -> Result<Bytes, DeliveryError> {
		self.calls
			.lock()
			.unwrap()
			.get(&(to, data))
			.cloned()
			.ok_or_else(|| DeliveryError::Network(format!("Call to {} reverted", to)))
	}

	async fn get_block_number(&self, _network_id: NetworkId) -> Result<u64, DeliveryError> {
		Ok(100)
	}
}
