//! Transaction types for the wallet.
//!
//! This module defines prepared transactions (ready to sign and broadcast),
//! their JSON-friendly serializable form, transaction hashes and receipts.

use crate::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when a serialized prepared transaction cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionParseError {
	#[error("Invalid address for field '{field}': {value}")]
	InvalidAddress { field: &'static str, value: String },
	#[error("Invalid integer for field '{field}': {value}")]
	InvalidInteger { field: &'static str, value: String },
	#[error("Invalid calldata: {0}")]
	InvalidData(String),
	#[error("Invalid transaction hash: {0}")]
	InvalidHash(String),
}

/// Blockchain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

impl FromStr for TransactionHash {
	type Err = TransactionParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse::<B256>()
			.map(TransactionHash)
			.map_err(|_| TransactionParseError::InvalidHash(s.to_string()))
	}
}

impl From<B256> for TransactionHash {
	fn from(value: B256) -> Self {
		Self(value)
	}
}

/// Execution status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
	Success,
	Reverted,
}

/// An event log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
	/// Contract that emitted the log.
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
}

/// Transaction receipt containing execution details.
///
/// Read-only once fetched from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub status: ReceiptStatus,
	/// Gas consumed by this transaction.
	pub gas_used: u64,
	/// Gas consumed by the block up to and including this transaction.
	pub cumulative_gas_used: u64,
	/// Price paid per unit of gas, in the smallest unit of the fee token.
	pub effective_gas_price: u128,
	#[serde(default)]
	pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
	pub fn is_success(&self) -> bool {
		self.status == ReceiptStatus::Success
	}

	/// Total fee paid, `gas_used * effective_gas_price`.
	pub fn gas_fee(&self) -> U256 {
		U256::from(self.gas_used) * U256::from(self.effective_gas_price)
	}
}

/// A transaction that has been prepared (gas and fees estimated) and is
/// ready to be signed and broadcast. Consumed once by the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
	pub from: Address,
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	pub gas: u64,
	pub max_fee_per_gas: Option<u128>,
	pub max_priority_fee_per_gas: Option<u128>,
	/// Legacy gas price, set instead of the EIP-1559 fields.
	pub gas_price: Option<u128>,
	/// ERC-20 token used to pay gas, on networks supporting it.
	pub fee_currency: Option<Address>,
	/// Base fee observed when the transaction was prepared.
	pub base_fee_per_gas: Option<u128>,
	/// Gas the preparer expects to be consumed, used for fee estimates.
	pub estimated_gas_use: Option<u64>,
}

impl PreparedTransaction {
	/// Largest fee this transaction may pay, `gas * max_fee_per_gas`.
	pub fn max_gas_fee(&self) -> U256 {
		let price = self.max_fee_per_gas.or(self.gas_price).unwrap_or_default();
		U256::from(self.gas) * U256::from(price)
	}

	/// Expected fee, `estimated_gas_use (or gas) * (base fee + priority fee)`.
	pub fn estimated_gas_fee(&self) -> U256 {
		let gas = self.estimated_gas_use.unwrap_or(self.gas);
		let price = match (self.base_fee_per_gas, self.max_priority_fee_per_gas) {
			(Some(base), Some(tip)) => base.saturating_add(tip),
			(Some(base), None) => base,
			_ => self.max_fee_per_gas.or(self.gas_price).unwrap_or_default(),
		};
		U256::from(gas) * U256::from(price)
	}
}

/// JSON-friendly prepared transaction with big integers as decimal strings.
///
/// This is the shape produced by the transaction preparer and carried in
/// flow action payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializablePreparedTransaction {
	pub from: String,
	pub to: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	pub gas: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_fee_per_gas: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_priority_fee_per_gas: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fee_currency: Option<String>,
	#[serde(rename = "_baseFeePerGas", default, skip_serializing_if = "Option::is_none")]
	pub base_fee_per_gas: Option<String>,
	#[serde(rename = "_estimatedGasUse", default, skip_serializing_if = "Option::is_none")]
	pub estimated_gas_use: Option<String>,
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, TransactionParseError> {
	value
		.parse::<Address>()
		.map_err(|_| TransactionParseError::InvalidAddress {
			field,
			value: value.to_string(),
		})
}

fn parse_u128(field: &'static str, value: &Option<String>) -> Result<Option<u128>, TransactionParseError> {
	value
		.as_deref()
		.map(|v| {
			v.parse::<u128>()
				.map_err(|_| TransactionParseError::InvalidInteger {
					field,
					value: v.to_string(),
				})
		})
		.transpose()
}

impl TryFrom<SerializablePreparedTransaction> for PreparedTransaction {
	type Error = TransactionParseError;

	fn try_from(tx: SerializablePreparedTransaction) -> Result<Self, Self::Error> {
		let data = match tx.data.as_deref() {
			Some(hex_data) => hex_data
				.parse::<Bytes>()
				.map_err(|e| TransactionParseError::InvalidData(e.to_string()))?,
			None => Bytes::new(),
		};
		let value = match tx.value.as_deref() {
			Some(v) => U256::from_str_radix(v, 10).map_err(|_| TransactionParseError::InvalidInteger {
				field: "value",
				value: v.to_string(),
			})?,
			None => U256::ZERO,
		};
		let gas = tx
			.gas
			.parse::<u64>()
			.map_err(|_| TransactionParseError::InvalidInteger {
				field: "gas",
				value: tx.gas.clone(),
			})?;
		let estimated_gas_use = parse_u128("_estimatedGasUse", &tx.estimated_gas_use)?
			.map(|v| v.min(u64::MAX as u128) as u64);

		Ok(PreparedTransaction {
			from: parse_address("from", &tx.from)?,
			to: parse_address("to", &tx.to)?,
			data,
			value,
			gas,
			max_fee_per_gas: parse_u128("maxFeePerGas", &tx.max_fee_per_gas)?,
			max_priority_fee_per_gas: parse_u128("maxPriorityFeePerGas", &tx.max_priority_fee_per_gas)?,
			gas_price: parse_u128("gasPrice", &tx.gas_price)?,
			fee_currency: tx
				.fee_currency
				.as_deref()
				.map(|v| parse_address("feeCurrency", v))
				.transpose()?,
			base_fee_per_gas: parse_u128("_baseFeePerGas", &tx.base_fee_per_gas)?,
			estimated_gas_use,
		})
	}
}

impl From<&PreparedTransaction> for SerializablePreparedTransaction {
	fn from(tx: &PreparedTransaction) -> Self {
		Self {
			from: tx.from.to_string(),
			to: tx.to.to_string(),
			data: (!tx.data.is_empty()).then(|| tx.data.to_string()),
			value: (!tx.value.is_zero()).then(|| tx.value.to_string()),
			gas: tx.gas.to_string(),
			max_fee_per_gas: tx.max_fee_per_gas.map(|v| v.to_string()),
			max_priority_fee_per_gas: tx.max_priority_fee_per_gas.map(|v| v.to_string()),
			gas_price: tx.gas_price.map(|v| v.to_string()),
			fee_currency: tx.fee_currency.map(|v| v.to_string()),
			base_fee_per_gas: tx.base_fee_per_gas.map(|v| v.to_string()),
			estimated_gas_use: tx.estimated_gas_use.map(|v| v.to_string()),
		}
	}
}

/// Parses a batch of serialized transactions, failing on the first bad one.
pub fn parse_prepared_transactions(
	txs: &[SerializablePreparedTransaction],
) -> Result<Vec<PreparedTransaction>, TransactionParseError> {
	txs.iter().cloned().map(PreparedTransaction::try_from).collect()
}
