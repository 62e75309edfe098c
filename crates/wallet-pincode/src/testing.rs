//! Fakes of the host collaborators, for tests in this and dependent crates.

use crate::keychain::{ItemAccess, KeychainError, KeychainInterface};
use crate::prompt::{PinPrompt, PinRequest, PromptError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wallet_types::{AccountError, AccountUnlocker, Address, KeychainKey, SecretString};

/// What the fake keychain does when a biometry-protected item is read
/// with a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiometryBehavior {
	#[default]
	Allow,
	Cancel,
	ReturnNothing,
}

/// Keychain held in a map, with scriptable biometry.
#[derive(Default)]
pub struct FakeKeychain {
	items: Mutex<HashMap<String, (SecretString, ItemAccess)>>,
	biometry: Mutex<BiometryBehavior>,
}

impl FakeKeychain {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_biometry(&self, behavior: BiometryBehavior) {
		*self.biometry.lock().unwrap() = behavior;
	}

	pub fn get(&self, key: &KeychainKey) -> Option<SecretString> {
		self.items
			.lock()
			.unwrap()
			.get(&key.as_string())
			.map(|(value, _)| value.clone())
	}

	pub fn access(&self, key: &KeychainKey) -> Option<ItemAccess> {
		self.items
			.lock()
			.unwrap()
			.get(&key.as_string())
			.map(|(_, access)| *access)
	}
}

#[async_trait]
impl KeychainInterface for FakeKeychain {
	async fn store_item(
		&self,
		key: &KeychainKey,
		value: &SecretString,
		access: ItemAccess,
	) -> Result<(), KeychainError> {
		self.items
			.lock()
			.unwrap()
			.insert(key.as_string(), (value.clone(), access));
		Ok(())
	}

	async fn retrieve_item(
		&self,
		key: &KeychainKey,
		prompt: Option<&str>,
	) -> Result<Option<SecretString>, KeychainError> {
		let item = self.items.lock().unwrap().get(&key.as_string()).cloned();
		match item {
			Some((_, ItemAccess::Biometry)) if prompt.is_some() => {
				match *self.biometry.lock().unwrap() {
					BiometryBehavior::Allow => Ok(item.map(|(value, _)| value)),
					BiometryBehavior::Cancel => Err(KeychainError::UserCancelled),
					BiometryBehavior::ReturnNothing => Ok(None),
				}
			},
			_ => Ok(item.map(|(value, _)| value)),
		}
	}

	async fn remove_item(&self, key: &KeychainKey) -> Result<(), KeychainError> {
		self.items.lock().unwrap().remove(&key.as_string());
		Ok(())
	}
}

/// Prompt that answers after a delay and counts requests.
pub struct ScriptedPrompt {
	answer: Result<SecretString, PromptError>,
	delay: Duration,
	requests: AtomicUsize,
}

impl ScriptedPrompt {
	pub fn answering(pin: &str) -> Self {
		Self {
			answer: Ok(SecretString::from(pin)),
			delay: Duration::ZERO,
			requests: AtomicUsize::new(0),
		}
	}

	pub fn cancelling() -> Self {
		Self {
			answer: Err(PromptError::Cancelled),
			delay: Duration::ZERO,
			requests: AtomicUsize::new(0),
		}
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	pub fn request_count(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PinPrompt for ScriptedPrompt {
	async fn request_pin(&self, _request: PinRequest) -> Result<SecretString, PromptError> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		self.answer.clone()
	}
}

/// Account unlocker accepting one password.
pub struct FakeAccounts {
	password: Mutex<Option<SecretString>>,
	unlocks: AtomicUsize,
}

impl FakeAccounts {
	/// Accepts no password until [`set_password`](Self::set_password).
	pub fn new() -> Self {
		Self {
			password: Mutex::new(None),
			unlocks: AtomicUsize::new(0),
		}
	}

	pub fn set_password(&self, password: SecretString) {
		*self.password.lock().unwrap() = Some(password);
	}

	pub fn unlock_count(&self) -> usize {
		self.unlocks.load(Ordering::SeqCst)
	}
}

impl Default for FakeAccounts {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl AccountUnlocker for FakeAccounts {
	async fn unlock(
		&self,
		_account: &Address,
		password: &SecretString,
		_duration_seconds: u64,
	) -> Result<bool, AccountError> {
		self.unlocks.fetch_add(1, Ordering::SeqCst);
		Ok(self.password.lock().unwrap().as_ref() == Some(password))
	}

	async fn update_passphrase(
		&self,
		_account: &Address,
		old_password: &SecretString,
		new_password: &SecretString,
	) -> Result<bool, AccountError> {
		let mut current = self.password.lock().unwrap();
		if current.as_ref() != Some(old_password) {
			return Ok(false);
		}
		*current = Some(new_password.clone());
		Ok(true)
	}
}
