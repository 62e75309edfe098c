//! Keychain access for PIN-derived secrets.
//!
//! [`KeychainInterface`] is the raw secure store (the platform keychain on a
//! device, [`StorageKeychain`] elsewhere). [`Keychain`] wraps it and checks
//! every write by reading the value back.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use wallet_storage::{StorageError, StorageService};
use wallet_types::{KeychainKey, SecretString, StorageKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeychainError {
	/// The user dismissed the biometric or device prompt.
	#[error("User cancelled keychain access")]
	UserCancelled,
	#[error("Retrieved value for key '{0}' does not match stored value")]
	Mismatch(String),
	#[error("Keychain backend error: {0}")]
	Backend(String),
}

impl From<StorageError> for KeychainError {
	fn from(err: StorageError) -> Self {
		KeychainError::Backend(err.to_string())
	}
}

/// Who may read a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemAccess {
	/// Readable while the device is unlocked.
	#[default]
	WhenUnlocked,
	/// Readable only after a successful biometric check on this device.
	Biometry,
}

#[async_trait]
pub trait KeychainInterface: Send + Sync {
	async fn store_item(
		&self,
		key: &KeychainKey,
		value: &SecretString,
		access: ItemAccess,
	) -> Result<(), KeychainError>;

	/// Reads an item. `prompt` is shown when the item is biometry protected.
	async fn retrieve_item(
		&self,
		key: &KeychainKey,
		prompt: Option<&str>,
	) -> Result<Option<SecretString>, KeychainError>;

	async fn remove_item(&self, key: &KeychainKey) -> Result<(), KeychainError>;
}

/// Keychain with read-back verification of writes.
#[derive(Clone)]
pub struct Keychain {
	backend: Arc<dyn KeychainInterface>,
}

impl Keychain {
	pub fn new(backend: Arc<dyn KeychainInterface>) -> Self {
		Self { backend }
	}

	/// Stores an item and verifies it reads back unchanged. On mismatch the
	/// item is removed again.
	pub async fn store_item(
		&self,
		key: &KeychainKey,
		value: &SecretString,
		access: ItemAccess,
	) -> Result<(), KeychainError> {
		self.backend.store_item(key, value, access).await?;

		let retrieved = self.backend.retrieve_item(key, None).await?;
		if retrieved.as_ref() != Some(value) {
			tracing::error!(key = %key, "Keychain read-back mismatch");
			self.backend.remove_item(key).await?;
			return Err(KeychainError::Mismatch(key.as_string()));
		}
		Ok(())
	}

	pub async fn retrieve_item(
		&self,
		key: &KeychainKey,
		prompt: Option<&str>,
	) -> Result<Option<SecretString>, KeychainError> {
		self.backend.retrieve_item(key, prompt).await
	}

	pub async fn remove_item(&self, key: &KeychainKey) -> Result<(), KeychainError> {
		self.backend.remove_item(key).await
	}
}

/// Keychain backed by a [`StorageService`].
///
/// There is no secure enclave behind it, so biometry protection is only
/// recorded in the logs.
pub struct StorageKeychain {
	storage: Arc<StorageService>,
}

impl StorageKeychain {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl KeychainInterface for StorageKeychain {
	async fn store_item(
		&self,
		key: &KeychainKey,
		value: &SecretString,
		access: ItemAccess,
	) -> Result<(), KeychainError> {
		if access == ItemAccess::Biometry {
			tracing::debug!(key = %key, "Biometry protection not available, storing item as is");
		}
		self.storage
			.store(StorageKey::Keychain, &key.as_string(), &value.expose_secret())
			.await?;
		Ok(())
	}

	async fn retrieve_item(
		&self,
		key: &KeychainKey,
		_prompt: Option<&str>,
	) -> Result<Option<SecretString>, KeychainError> {
		let value: Option<String> = self
			.storage
			.retrieve_optional(StorageKey::Keychain, &key.as_string())
			.await?;
		Ok(value.map(SecretString::new))
	}

	async fn remove_item(&self, key: &KeychainKey) -> Result<(), KeychainError> {
		self.storage
			.remove(StorageKey::Keychain, &key.as_string())
			.await?;
		Ok(())
	}
}
