//! Standby transaction types.
//!
//! A standby transaction is the wallet's optimistic local record of a
//! transaction it has broadcast but not yet seen confirmed. Each one is
//! created from a [`BaseStandbyTransaction`] once the hash is known and
//! later reconciled with exactly one receipt.

use crate::{Address, NetworkId, TokenAmount, TransactionHash};
use serde::{Deserialize, Serialize};

/// Identifies the user-visible intent a transaction belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionContext {
	pub id: String,
	pub tag: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl TransactionContext {
	/// Creates a context with a fresh random id.
	pub fn new(tag: impl Into<String>, description: Option<String>) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			tag: tag.into(),
			description,
		}
	}
}

/// Lifecycle status of a standby transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
	Pending,
	Complete,
	Failed,
}

/// Transaction types as shown in the activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenTransactionType {
	Exchange,
	Received,
	Sent,
	NftReceived,
	NftSent,
	SwapTransaction,
	CrossChainSwapTransaction,
	Approval,
	Deposit,
	Withdraw,
	ClaimReward,
	EarnDeposit,
	EarnSwapDeposit,
	EarnWithdraw,
	EarnClaimReward,
}

/// The swap leg of a swap-and-deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapLeg {
	pub in_amount: TokenAmount,
	pub out_amount: TokenAmount,
}

/// An NFT moved by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransfer {
	/// Lowercase hex address of the ERC-721 contract.
	pub contract_address: String,
	pub token_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_uri: Option<String>,
}

/// Kind-specific payload of a standby transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StandbyDetails {
	#[serde(rename_all = "camelCase")]
	Sent {
		amount: TokenAmount,
		address: Option<Address>,
	},
	#[serde(rename_all = "camelCase")]
	Received {
		amount: TokenAmount,
		address: Option<Address>,
	},
	#[serde(rename_all = "camelCase")]
	NftReceived { nfts: Vec<NftTransfer> },
	#[serde(rename_all = "camelCase")]
	Approval {
		token_id: String,
		approved_amount: Option<String>,
	},
	#[serde(rename_all = "camelCase")]
	EarnDeposit {
		in_amount: TokenAmount,
		out_amount: TokenAmount,
		app_name: String,
		swap: Option<SwapLeg>,
	},
	#[serde(rename_all = "camelCase")]
	CrossChainDeposit {
		in_amount: TokenAmount,
		out_amount: TokenAmount,
		app_name: String,
		swap: SwapLeg,
	},
	#[serde(rename_all = "camelCase")]
	EarnWithdraw {
		in_amount: TokenAmount,
		out_amount: TokenAmount,
		provider_id: String,
	},
	#[serde(rename_all = "camelCase")]
	EarnClaimReward {
		amount: TokenAmount,
		provider_id: String,
	},
}

impl StandbyDetails {
	/// Feed type of this standby transaction.
	pub fn kind(&self) -> TokenTransactionType {
		match self {
			StandbyDetails::Sent { .. } => TokenTransactionType::Sent,
			StandbyDetails::Received { .. } => TokenTransactionType::Received,
			StandbyDetails::NftReceived { .. } => TokenTransactionType::NftReceived,
			StandbyDetails::Approval { .. } => TokenTransactionType::Approval,
			StandbyDetails::EarnDeposit { swap: None, .. } => TokenTransactionType::EarnDeposit,
			StandbyDetails::EarnDeposit { swap: Some(_), .. } => TokenTransactionType::EarnSwapDeposit,
			StandbyDetails::CrossChainDeposit { .. } => TokenTransactionType::CrossChainSwapTransaction,
			StandbyDetails::EarnWithdraw { .. } => TokenTransactionType::EarnWithdraw,
			StandbyDetails::EarnClaimReward { .. } => TokenTransactionType::EarnClaimReward,
		}
	}
}

/// A network fee attached to a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
	#[serde(rename = "type")]
	pub fee_type: FeeType,
	pub amount: TokenAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
	SecurityFee,
	AppFee,
	CrossChainFee,
}

/// Standby transaction as produced by a standby constructor, before the
/// registry stamps it with a status and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStandbyTransaction {
	pub context: TransactionContext,
	pub network_id: NetworkId,
	pub transaction_hash: Option<TransactionHash>,
	pub fee_currency_id: Option<String>,
	#[serde(flatten)]
	pub details: StandbyDetails,
}

/// Optimistic local record of an in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandbyTransaction {
	pub context: TransactionContext,
	pub network_id: NetworkId,
	pub transaction_hash: Option<TransactionHash>,
	pub fee_currency_id: Option<String>,
	#[serde(flatten)]
	pub details: StandbyDetails,
	pub status: TransactionStatus,
	/// Unix timestamp in milliseconds.
	pub timestamp: i64,
	#[serde(default)]
	pub block: Option<u64>,
	#[serde(default)]
	pub fees: Vec<Fee>,
}

impl StandbyTransaction {
	/// Stamps a base transaction as pending at `timestamp`.
	pub fn pending(base: BaseStandbyTransaction, timestamp: i64) -> Self {
		Self {
			context: base.context,
			network_id: base.network_id,
			transaction_hash: base.transaction_hash,
			fee_currency_id: base.fee_currency_id,
			details: base.details,
			status: TransactionStatus::Pending,
			timestamp,
			block: None,
			fees: Vec::new(),
		}
	}

	pub fn kind(&self) -> TokenTransactionType {
		self.details.kind()
	}

	pub fn is_pending(&self) -> bool {
		self.status == TransactionStatus::Pending
	}
}
