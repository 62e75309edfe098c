//! Standby transaction registry.
//!
//! Keeps the optimistic record of broadcast transactions until each is
//! reconciled with its receipt or dropped in favour of the confirmed
//! transaction feed. The list is persisted so pending entries survive a
//! restart, and every change is published on the event bus. Changes are
//! applied to a copy of the list and only swapped in once it is persisted.

use std::sync::Arc;
use tokio::sync::RwLock;
use wallet_storage::{StorageError, StorageService};
use wallet_types::{
	current_timestamp_millis, BaseStandbyTransaction, EventBus, NetworkId, ReceiptStatus,
	StandbyTransaction, StorageKey, TransactionHash, TransactionReceipt, TransactionStatus,
	TransactionsAction, WalletAction,
};

const STANDBY_LIST_ID: &str = "all";

pub struct StandbyRegistry {
	storage: Arc<StorageService>,
	events: EventBus,
	entries: RwLock<Vec<StandbyTransaction>>,
}

impl StandbyRegistry {
	pub fn new(storage: Arc<StorageService>, events: EventBus) -> Self {
		Self {
			storage,
			events,
			entries: RwLock::new(Vec::new()),
		}
	}

	/// Restores the persisted list, replacing what is held in memory.
	pub async fn load(&self) -> Result<usize, StorageError> {
		let stored: Option<Vec<StandbyTransaction>> = self
			.storage
			.retrieve_optional(StorageKey::StandbyTransactions, STANDBY_LIST_ID)
			.await?;
		let stored = stored.unwrap_or_default();
		let count = stored.len();
		*self.entries.write().await = stored;
		tracing::debug!(count, "Loaded standby transactions");
		Ok(count)
	}

	async fn persist(&self, entries: &[StandbyTransaction]) -> Result<(), StorageError> {
		self.storage
			.store(StorageKey::StandbyTransactions, STANDBY_LIST_ID, &entries)
			.await
	}

	fn publish(&self, action: TransactionsAction) {
		self.events.publish(WalletAction::Transactions(action)).ok();
	}

	/// Records a pending transaction.
	///
	/// An entry with the same context id, or the same hash on the same
	/// network, is replaced.
	pub async fn add(&self, base: BaseStandbyTransaction) -> Result<StandbyTransaction, StorageError> {
		let transaction = StandbyTransaction::pending(base, current_timestamp_millis());

		let mut entries = self.entries.write().await;
		let mut next = entries.clone();
		next.retain(|existing| !is_same_transaction(existing, &transaction));
		next.push(transaction.clone());
		self.persist(&next).await?;
		*entries = next;
		drop(entries);

		tracing::info!(
			context_id = %transaction.context.id,
			tag = %transaction.context.tag,
			kind = ?transaction.kind(),
			"Added standby transaction"
		);
		self.publish(TransactionsAction::StandbyAdded {
			transaction: transaction.clone(),
		});
		Ok(transaction)
	}

	/// Reconciles the entry of `context_id` with its receipt.
	///
	/// Returns `None` when no such entry exists.
	pub async fn confirm(
		&self,
		context_id: &str,
		receipt: &TransactionReceipt,
	) -> Result<Option<StandbyTransaction>, StorageError> {
		let status = match receipt.status {
			ReceiptStatus::Success => TransactionStatus::Complete,
			ReceiptStatus::Reverted => TransactionStatus::Failed,
		};

		let updated = self
			.update(context_id, |entry| {
				entry.status = status;
				entry.block = Some(receipt.block_number);
				entry.transaction_hash = Some(receipt.hash);
			})
			.await?;

		if updated.is_some() {
			self.publish(TransactionsAction::TransactionConfirmed {
				context_id: context_id.to_string(),
				transaction_hash: receipt.hash,
				status,
				block: receipt.block_number,
			});
		}
		Ok(updated)
	}

	/// Gives up on the entry of `context_id` without a receipt.
	pub async fn fail(&self, context_id: &str) -> Result<Option<StandbyTransaction>, StorageError> {
		let updated = self
			.update(context_id, |entry| entry.status = TransactionStatus::Failed)
			.await?;

		if updated.is_some() {
			tracing::warn!(context_id, "Marked standby transaction as failed");
			self.publish(TransactionsAction::TransactionFailed {
				context_id: context_id.to_string(),
			});
		}
		Ok(updated)
	}

	async fn update<F>(
		&self,
		context_id: &str,
		updater: F,
	) -> Result<Option<StandbyTransaction>, StorageError>
	where
		F: FnOnce(&mut StandbyTransaction),
	{
		let mut entries = self.entries.write().await;
		let Some(index) = entries
			.iter()
			.position(|entry| entry.context.id == context_id)
		else {
			return Ok(None);
		};
		let mut next = entries.clone();
		updater(&mut next[index]);
		let updated = next[index].clone();
		self.persist(&next).await?;
		*entries = next;
		Ok(Some(updated))
	}

	/// Drops entries that now appear in the confirmed feed of `network_id`.
	///
	/// Returns the hashes that were removed.
	pub async fn remove_confirmed(
		&self,
		network_id: NetworkId,
		confirmed: &[TransactionHash],
	) -> Result<Vec<TransactionHash>, StorageError> {
		let mut entries = self.entries.write().await;
		let mut removed = Vec::new();
		let next: Vec<StandbyTransaction> = entries
			.iter()
			.filter(|entry| match entry.transaction_hash {
				Some(hash) if entry.network_id == network_id && confirmed.contains(&hash) => {
					removed.push(hash);
					false
				},
				_ => true,
			})
			.cloned()
			.collect();

		if removed.is_empty() {
			return Ok(removed);
		}
		self.persist(&next).await?;
		*entries = next;
		drop(entries);

		self.publish(TransactionsAction::StandbyRemoved {
			network_id,
			transaction_hashes: removed.clone(),
		});
		Ok(removed)
	}

	pub async fn get(&self, context_id: &str) -> Option<StandbyTransaction> {
		self.entries
			.read()
			.await
			.iter()
			.find(|entry| entry.context.id == context_id)
			.cloned()
	}

	pub async fn all(&self) -> Vec<StandbyTransaction> {
		self.entries.read().await.clone()
	}

	pub async fn pending(&self) -> Vec<StandbyTransaction> {
		self.entries
			.read()
			.await
			.iter()
			.filter(|entry| entry.is_pending())
			.cloned()
			.collect()
	}
}

fn is_same_transaction(a: &StandbyTransaction, b: &StandbyTransaction) -> bool {
	if a.context.id == b.context.id {
		return true;
	}
	match (a.transaction_hash, b.transaction_hash) {
		(Some(x), Some(y)) => x == y && a.network_id == b.network_id,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::FailingWrites;
	use wallet_storage::implementations::memory::MemoryStorage;
	use wallet_types::{StandbyDetails, TokenAmount, TransactionContext, B256};

	fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	fn base(tag: &str, hash: u8) -> BaseStandbyTransaction {
		BaseStandbyTransaction {
			context: TransactionContext::new(tag, None),
			network_id: NetworkId::CeloAlfajores,
			transaction_hash: Some(TransactionHash(B256::repeat_byte(hash))),
			fee_currency_id: Some("celo-alfajores:native".to_string()),
			details: StandbyDetails::Sent {
				amount: TokenAmount::new("-1", "celo-alfajores:native"),
				address: None,
			},
		}
	}

	fn receipt(hash: u8, status: ReceiptStatus) -> TransactionReceipt {
		TransactionReceipt {
			hash: TransactionHash(B256::repeat_byte(hash)),
			block_number: 42,
			status,
			gas_used: 21_000,
			cumulative_gas_used: 21_000,
			effective_gas_price: 1,
			logs: vec![],
		}
	}

	#[tokio::test]
	async fn test_add_deduplicates() {
		let registry = StandbyRegistry::new(storage(), EventBus::new(16));

		let first = base("send", 1);
		registry.add(first.clone()).await.unwrap();
		// Same context id
		registry.add(first.clone()).await.unwrap();
		// Same hash under a new context
		registry.add(base("send-again", 1)).await.unwrap();
		assert_eq!(registry.all().await.len(), 1);
		assert_eq!(registry.all().await[0].context.tag, "send-again");

		registry.add(base("other", 2)).await.unwrap();
		assert_eq!(registry.pending().await.len(), 2);
	}

	#[tokio::test]
	async fn test_confirm_and_fail() {
		let events = EventBus::new(16);
		let mut actions = events.subscribe();
		let registry = StandbyRegistry::new(storage(), events);

		let ok = registry.add(base("ok", 1)).await.unwrap();
		let reverted = registry.add(base("reverted", 2)).await.unwrap();
		let lost = registry.add(base("lost", 3)).await.unwrap();

		let confirmed = registry
			.confirm(&ok.context.id, &receipt(1, ReceiptStatus::Success))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(confirmed.status, TransactionStatus::Complete);
		assert_eq!(confirmed.block, Some(42));

		registry
			.confirm(&reverted.context.id, &receipt(2, ReceiptStatus::Reverted))
			.await
			.unwrap();
		registry.fail(&lost.context.id).await.unwrap();

		assert!(registry.pending().await.is_empty());
		assert_eq!(
			registry.get(&reverted.context.id).await.unwrap().status,
			TransactionStatus::Failed
		);
		assert!(registry.fail("unknown").await.unwrap().is_none());

		let mut names = Vec::new();
		while let Ok(WalletAction::Transactions(action)) = actions.try_recv() {
			names.push(match action {
				TransactionsAction::StandbyAdded { .. } => "added",
				TransactionsAction::TransactionConfirmed { .. } => "confirmed",
				TransactionsAction::TransactionFailed { .. } => "failed",
				TransactionsAction::StandbyRemoved { .. } => "removed",
			});
		}
		assert_eq!(
			names,
			vec!["added", "added", "added", "confirmed", "confirmed", "failed"]
		);
	}

	#[tokio::test]
	async fn test_remove_confirmed_only_matches_network() {
		let registry = StandbyRegistry::new(storage(), EventBus::new(16));
		registry.add(base("a", 1)).await.unwrap();
		let mut elsewhere = base("b", 2);
		elsewhere.network_id = NetworkId::ArbitrumSepolia;
		registry.add(elsewhere).await.unwrap();

		let confirmed = [
			TransactionHash(B256::repeat_byte(1)),
			TransactionHash(B256::repeat_byte(2)),
		];
		let removed = registry
			.remove_confirmed(NetworkId::CeloAlfajores, &confirmed)
			.await
			.unwrap();

		assert_eq!(removed, vec![confirmed[0]]);
		assert_eq!(registry.all().await.len(), 1);
		assert_eq!(registry.all().await[0].network_id, NetworkId::ArbitrumSepolia);
	}

	#[tokio::test]
	async fn test_survives_reload() {
		let storage = storage();
		let registry = StandbyRegistry::new(storage.clone(), EventBus::new(16));
		registry.add(base("a", 1)).await.unwrap();

		let reloaded = StandbyRegistry::new(storage, EventBus::new(16));
		assert_eq!(reloaded.load().await.unwrap(), 1);
		assert_eq!(reloaded.all().await, registry.all().await);
	}

	#[tokio::test]
	async fn test_failed_write_leaves_entries_unchanged() {
		// Writes: add a, add b, confirm a (fails), remove b (fails)
		let storage = Arc::new(StorageService::new(Box::new(FailingWrites::on(&[2, 3]))));
		let registry = StandbyRegistry::new(storage.clone(), EventBus::new(16));
		let a = registry.add(base("a", 1)).await.unwrap();
		registry.add(base("b", 2)).await.unwrap();

		let err = registry
			.confirm(&a.context.id, &receipt(1, ReceiptStatus::Success))
			.await;
		assert!(err.is_err());
		assert!(registry.get(&a.context.id).await.unwrap().is_pending());

		let removed = registry
			.remove_confirmed(
				NetworkId::CeloAlfajores,
				&[TransactionHash(B256::repeat_byte(2))],
			)
			.await;
		assert!(removed.is_err());
		assert_eq!(registry.all().await.len(), 2);

		// Memory still matches what was last persisted
		let reloaded = StandbyRegistry::new(storage, EventBus::new(16));
		reloaded.load().await.unwrap();
		assert_eq!(reloaded.all().await, registry.all().await);
	}
}
