//! Errors raised by the transaction flows.

use crate::state::FlowState;
use thiserror::Error;
use wallet_delivery::DeliveryError;
use wallet_pincode::AuthError;
use wallet_storage::StorageError;
use wallet_types::{Address, TransactionParseError};

/// Why a flow did not reach `Succeeded`.
///
/// `Cancelled` is control flow: the user dismissed the PIN or biometry
/// prompt before anything was broadcast. Flows report it with their cancel
/// action and no error telemetry.
#[derive(Debug, Error)]
pub enum FlowError {
	#[error("Cancelled by user")]
	Cancelled,
	#[error("Validation error: {0}")]
	Validation(String),
	#[error("Token info not found for {0}")]
	MissingTokenInfo(String),
	#[error("Transaction reverted: {0}")]
	Reverted(String),
	#[error("Failed to unlock account {0}")]
	AccountLocked(Address),
	#[error("Invalid flow transition from {from:?} to {to:?}")]
	InvalidTransition { from: FlowState, to: FlowState },
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
	#[error(transparent)]
	Auth(AuthError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error("Failed to update {count} standby transaction(s): {first}")]
	StandbyUpdate { count: usize, first: StorageError },
	#[error("Claim failed: {0}")]
	Claim(String),
}

impl FlowError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, FlowError::Cancelled)
	}
}

impl From<AuthError> for FlowError {
	fn from(err: AuthError) -> Self {
		match err {
			AuthError::Cancelled => FlowError::Cancelled,
			other => FlowError::Auth(other),
		}
	}
}

impl From<TransactionParseError> for FlowError {
	fn from(err: TransactionParseError) -> Self {
		FlowError::Validation(err.to_string())
	}
}
