//! In-memory recovery phrase store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use wallet_types::{AccountError, Address, MnemonicStore, SecretString};

/// Keeps each account's phrase together with the password it was stored
/// under. Reads with any other password return nothing.
#[derive(Default)]
pub struct MemoryMnemonicStore {
	phrases: Mutex<HashMap<Address, (SecretString, SecretString)>>,
}

impl MemoryMnemonicStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl MnemonicStore for MemoryMnemonicStore {
	async fn get_stored_mnemonic(
		&self,
		account: &Address,
		password: &SecretString,
	) -> Result<Option<SecretString>, AccountError> {
		let phrases = self
			.phrases
			.lock()
			.map_err(|e| AccountError::Backend(e.to_string()))?;
		Ok(phrases
			.get(account)
			.filter(|(stored_password, _)| stored_password == password)
			.map(|(_, phrase)| phrase.clone()))
	}

	async fn store_mnemonic(
		&self,
		mnemonic: &SecretString,
		account: &Address,
		password: &SecretString,
	) -> Result<(), AccountError> {
		let mut phrases = self
			.phrases
			.lock()
			.map_err(|e| AccountError::Backend(e.to_string()))?;
		phrases.insert(*account, (password.clone(), mnemonic.clone()));
		Ok(())
	}
}
