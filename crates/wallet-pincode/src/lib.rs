//! PIN gate and password management for the wallet.
//!
//! The account password is the concatenation of a per-install pepper and the
//! user's 6-digit PIN. This crate turns PIN entry (typed or unlocked with
//! biometry) into that password, caches it, and makes sure concurrent
//! requests for the same account share a single prompt.
//!
//! It also ships the blocklist of weak PINs used when a new PIN is chosen.

pub mod authentication;
pub mod blocklist;
pub mod cache;
pub mod keychain;
pub mod mnemonic;
pub mod policy;
pub mod prompt;
pub mod single_flight;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use authentication::{
	get_password_hash, password_hash_storage_key, AuthCollaborators, AuthError, PasswordService,
	PasswordSettings,
};
pub use blocklist::PinBlocklist;
pub use cache::{PasswordCache, DEFAULT_CACHE_ACCOUNT};
pub use keychain::{ItemAccess, Keychain, KeychainError, KeychainInterface, StorageKeychain};
pub use mnemonic::MemoryMnemonicStore;
pub use policy::{is_pin_valid, PinPolicy, PIN_LENGTH};
pub use prompt::{PinPrompt, PinRequest, PromptError, StaticPinPrompt};
pub use single_flight::SingleFlight;

use thiserror::Error;

/// Errors raised by PIN validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinError {
	#[error("Invalid PIN: {0}")]
	InvalidFormat(String),
	#[error("PIN is too easy to guess")]
	Blocklisted,
	#[error("Malformed PIN blocklist: {0}")]
	MalformedBlocklist(String),
}
