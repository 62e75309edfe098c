//! Storage-related types for the wallet.

use std::str::FromStr;

/// Keys of the items the wallet keeps in the keychain.
///
/// Password hashes are stored per account; see [`KeychainKey::PasswordHash`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeychainKey {
	/// Randomly generated pepper combined with the PIN to form the password.
	Pepper,
	/// Hash of the password for the given normalized account address.
	PasswordHash(String),
	/// The PIN itself, stored behind biometry.
	Pin,
	/// Message signed with the account key.
	SignedMessage,
}

impl KeychainKey {
	/// Returns the string under which the item is stored.
	pub fn as_string(&self) -> String {
		match self {
			KeychainKey::Pepper => "PEPPER".to_string(),
			KeychainKey::PasswordHash(account) => format!("PASSWORD_HASH-{}", account),
			KeychainKey::Pin => "PIN".to_string(),
			KeychainKey::SignedMessage => "SIGNED_MESSAGE".to_string(),
		}
	}
}

impl std::fmt::Display for KeychainKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.as_string())
	}
}

/// Storage namespaces for persisted wallet data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Keychain items
	Keychain,
	/// Standby transactions
	StandbyTransactions,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Keychain => "keychain",
			StorageKey::StandbyTransactions => "standby_transactions",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Keychain, Self::StandbyTransactions].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"keychain" => Ok(Self::Keychain),
			"standby_transactions" => Ok(Self::StandbyTransactions),
			_ => Err(()),
		}
	}
}
