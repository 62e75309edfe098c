//! Wallet actions and the event bus that carries them.
//!
//! Flows never mutate shared application state directly. They publish
//! [`WalletAction`]s on an [`EventBus`] and interested components (the
//! activity feed, UI state, tests) subscribe to them.

use crate::{NetworkId, StandbyTransaction, TransactionHash, TransactionStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Main action type encompassing everything a flow can dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalletAction {
	/// Actions of the earn deposit and withdraw flows.
	Earn(EarnAction),
	/// Actions of the jumpstart send and reclaim flows.
	Jumpstart(JumpstartAction),
	/// Standby registry changes.
	Transactions(TransactionsAction),
	/// Identity and credential state changes.
	Identity(IdentityAction),
}

/// Actions related to earn pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EarnAction {
	DepositStart {
		pool_id: String,
	},
	DepositSuccess {
		token_id: String,
		network_id: NetworkId,
		transaction_hash: TransactionHash,
	},
	DepositError,
	DepositCancel,
	WithdrawStart {
		pool_id: String,
	},
	WithdrawSuccess,
	WithdrawError,
	WithdrawCancel,
}

/// Actions related to jumpstart links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JumpstartAction {
	DepositTransactionStarted,
	DepositTransactionSucceeded,
	DepositTransactionFailed,
	DepositTransactionCancelled,
	ReclaimStarted {
		deposit_tx_hash: String,
	},
	ReclaimSucceeded,
	ReclaimFailed,
	ReclaimCancelled,
	ClaimStarted,
	ClaimSucceeded,
	ClaimFailed,
}

/// Changes to the standby transaction registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionsAction {
	/// A standby transaction was recorded.
	StandbyAdded { transaction: StandbyTransaction },
	/// A standby transaction was reconciled with its receipt.
	TransactionConfirmed {
		context_id: String,
		transaction_hash: TransactionHash,
		status: TransactionStatus,
		block: u64,
	},
	/// A standby transaction was given up on without a receipt.
	TransactionFailed { context_id: String },
	/// Standby entries superseded by the confirmed feed were dropped.
	StandbyRemoved {
		network_id: NetworkId,
		transaction_hashes: Vec<TransactionHash>,
	},
}

/// Identity and credential actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentityAction {
	/// The stored password hash was rewritten after a successful unlock.
	StoredPasswordRefreshed,
}

/// Broadcast bus for wallet actions.
///
/// Cloning the bus is cheap and every clone publishes to the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WalletAction>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` actions per lagging subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all actions published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<WalletAction> {
		self.sender.subscribe()
	}

	/// Publishes an action. Fails only when there are no subscribers.
	pub fn publish(
		&self,
		action: WalletAction,
	) -> Result<usize, broadcast::error::SendError<WalletAction>> {
		self.sender.send(action)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}
