//! In-memory caches for PIN-derived secrets.
//!
//! Pins, peppers and passwords expire after a timeout. Password hashes are
//! not secret and are kept until the caches are cleared.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use wallet_types::SecretString;

/// Cache slot used for the PIN and the pepper, which are not per account.
pub const DEFAULT_CACHE_ACCOUNT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SecretKind {
	Pin,
	Pepper,
	Password,
}

struct Entry {
	value: SecretString,
	stored_at: Instant,
}

pub struct PasswordCache {
	timeout: Duration,
	secrets: Mutex<HashMap<(SecretKind, String), Entry>>,
	password_hashes: Mutex<HashMap<String, String>>,
}

impl PasswordCache {
	pub fn new(timeout: Duration) -> Self {
		Self {
			timeout,
			secrets: Mutex::new(HashMap::new()),
			password_hashes: Mutex::new(HashMap::new()),
		}
	}

	fn get(&self, kind: SecretKind, account: &str) -> Option<SecretString> {
		let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
		let key = (kind, account.to_string());
		let entry = secrets.get(&key)?;
		if entry.stored_at.elapsed() >= self.timeout {
			secrets.remove(&key);
			return None;
		}
		Some(entry.value.clone())
	}

	fn set(&self, kind: SecretKind, account: &str, value: SecretString) {
		let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
		secrets.insert(
			(kind, account.to_string()),
			Entry {
				value,
				stored_at: Instant::now(),
			},
		);
	}

	pub fn get_pin(&self, account: &str) -> Option<SecretString> {
		self.get(SecretKind::Pin, account)
	}

	pub fn set_pin(&self, account: &str, pin: SecretString) {
		self.set(SecretKind::Pin, account, pin)
	}

	pub fn get_pepper(&self, account: &str) -> Option<SecretString> {
		self.get(SecretKind::Pepper, account)
	}

	pub fn set_pepper(&self, account: &str, pepper: SecretString) {
		self.set(SecretKind::Pepper, account, pepper)
	}

	pub fn get_password(&self, account: &str) -> Option<SecretString> {
		self.get(SecretKind::Password, account)
	}

	pub fn set_password(&self, account: &str, password: SecretString) {
		self.set(SecretKind::Password, account, password)
	}

	pub fn get_password_hash(&self, account: &str) -> Option<String> {
		let hashes = self.password_hashes.lock().unwrap_or_else(|e| e.into_inner());
		hashes.get(account).cloned()
	}

	pub fn set_password_hash(&self, account: &str, hash: String) {
		let mut hashes = self.password_hashes.lock().unwrap_or_else(|e| e.into_inner());
		hashes.insert(account.to_string(), hash);
	}

	/// Drops every cached pin, pepper, password and password hash.
	pub fn clear(&self) {
		self.secrets
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clear();
		self.password_hashes
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.clear();
	}
}

impl Default for PasswordCache {
	fn default() -> Self {
		Self::new(Duration::from_secs(300))
	}
}
