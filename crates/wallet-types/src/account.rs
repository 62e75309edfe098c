//! Account credential types.
//!
//! The wallet account is unlocked with a password derived from the user's
//! PIN. Unlocking and mnemonic storage are provided by the host (a local
//! keystore or a node-managed account) behind the traits defined here.

use crate::{Address, NetworkId, SecretString, TransactionHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the user authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PincodeType {
	/// No PIN has been chosen yet.
	#[default]
	Unset,
	/// A 6-digit PIN entered on every unlock.
	CustomPin,
	/// A PIN stored behind device biometry, with PIN entry as fallback.
	PhoneAuth,
}

/// Errors raised by account collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
	#[error("Account backend error: {0}")]
	Backend(String),
	#[error("Operation not supported: {0}")]
	Unsupported(String),
}

/// Unlocks the signing account with a password.
#[async_trait]
pub trait AccountUnlocker: Send + Sync {
	/// Unlocks `account` for `duration_seconds`. Returns `false` when the
	/// password is wrong.
	async fn unlock(
		&self,
		account: &Address,
		password: &SecretString,
		duration_seconds: u64,
	) -> Result<bool, AccountError>;

	/// Re-encrypts the account key under a new password.
	async fn update_passphrase(
		&self,
		account: &Address,
		old_password: &SecretString,
		new_password: &SecretString,
	) -> Result<bool, AccountError>;
}

/// Password-protected storage of the account's recovery phrase.
#[async_trait]
pub trait MnemonicStore: Send + Sync {
	async fn get_stored_mnemonic(
		&self,
		account: &Address,
		password: &SecretString,
	) -> Result<Option<SecretString>, AccountError>;

	async fn store_mnemonic(
		&self,
		mnemonic: &SecretString,
		account: &Address,
		password: &SecretString,
	) -> Result<(), AccountError>;
}


/// Relays jumpstart claims to the escrow contract.
///
/// The link's private key signs the beneficiary; the relayer submits and
/// pays for the claim, so the beneficiary needs no PIN or gas.
#[async_trait]
pub trait JumpstartRelay: Send + Sync {
	/// Claims the funds escrowed for `private_key` on `contract` into
	/// `beneficiary`. Returns the hashes of the claim transactions.
	async fn claim(
		&self,
		private_key: &SecretString,
		network_id: NetworkId,
		contract: Address,
		beneficiary: Address,
	) -> Result<Vec<TransactionHash>, AccountError>;
}
