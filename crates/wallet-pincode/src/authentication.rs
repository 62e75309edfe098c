//! Account password management.
//!
//! The PIN is a short numeric string the user enters. The pepper is
//! generated once and kept in the keychain. The password, `pepper ‖ pin`,
//! unlocks the account.
//!
//! [`PasswordService::get_password`] is the entry point used by the
//! transaction flows. Concurrent calls for the same account are coalesced
//! into one PIN request through a [`SingleFlight`].

use crate::cache::{PasswordCache, DEFAULT_CACHE_ACCOUNT};
use crate::keychain::{ItemAccess, Keychain, KeychainError, KeychainInterface};
use crate::prompt::{PinPrompt, PinRequest, PromptError};
use crate::single_flight::SingleFlight;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use wallet_types::{
	AccountError, AccountUnlocker, Address, Analytics, AnalyticsEvent, EventBus, IdentityAction,
	KeychainKey, MnemonicStore, Navigator, PincodeType, SecretString, WalletAction,
};
use zeroize::Zeroizing;

const PEPPER_LENGTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
	/// The user dismissed the PIN prompt.
	#[error("PIN input cancelled")]
	Cancelled,
	#[error("Pin has never been set")]
	PinNeverSet,
	#[error("Pincode confirmation returned empty pin")]
	EmptyPin,
	#[error("Failed to retrieve pin with biometry, received null value")]
	BiometryReturnedNothing,
	#[error("Expecting valid address for computing storage key, got '{0}'")]
	InvalidAccount(String),
	#[error("Couldn't find stored mnemonic")]
	MnemonicNotFound,
	#[error("PIN input failed: {0}")]
	Prompt(String),
	#[error(transparent)]
	Keychain(#[from] KeychainError),
	#[error(transparent)]
	Account(#[from] AccountError),
}

impl From<PromptError> for AuthError {
	fn from(err: PromptError) -> Self {
		match err {
			PromptError::Cancelled => AuthError::Cancelled,
			PromptError::Failed(message) => AuthError::Prompt(message),
		}
	}
}

/// Timings of the password service.
#[derive(Debug, Clone)]
pub struct PasswordSettings {
	/// How long a resolved request keeps answering followers.
	pub release_delay: Duration,
	/// Pause after biometry so its animation can finish.
	pub biometry_verification_delay: Duration,
	/// Lifetime of cached pins, peppers and passwords.
	pub cache_timeout: Duration,
	/// Unlock duration passed to the account unlocker.
	pub unlock_duration_seconds: u64,
}

impl Default for PasswordSettings {
	fn default() -> Self {
		Self {
			release_delay: Duration::from_millis(500),
			biometry_verification_delay: Duration::from_millis(800),
			cache_timeout: Duration::from_secs(300),
			unlock_duration_seconds: 600,
		}
	}
}

/// Host collaborators of the password service.
pub struct AuthCollaborators {
	pub keychain: Arc<dyn KeychainInterface>,
	pub prompt: Arc<dyn PinPrompt>,
	pub navigator: Arc<dyn Navigator>,
	pub analytics: Arc<dyn Analytics>,
	pub accounts: Arc<dyn AccountUnlocker>,
	pub mnemonics: Arc<dyn MnemonicStore>,
	pub events: EventBus,
}

/// SHA-256 of the password read as hex, as lowercase hex without `0x`.
///
/// Decoding stops at the first pair that is not hex, and a trailing odd
/// nibble is ignored.
pub fn get_password_hash(password: &SecretString) -> String {
	let bytes = Zeroizing::new(password.with_exposed(lenient_hex_decode));
	hex::encode(Sha256::digest(bytes.as_slice()))
}

fn lenient_hex_decode(input: &str) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(input.len() / 2);
	for pair in input.as_bytes().chunks_exact(2) {
		let (Some(high), Some(low)) = (
			char::from(pair[0]).to_digit(16),
			char::from(pair[1]).to_digit(16),
		) else {
			break;
		};
		bytes.push((high * 16 + low) as u8);
	}
	bytes
}

/// Keychain key of an account's password hash. `account` must be a valid
/// address, with or without `0x`.
pub fn password_hash_storage_key(account: &str) -> Result<KeychainKey, AuthError> {
	let address = Address::from_str(account.trim())
		.map_err(|_| AuthError::InvalidAccount(account.to_string()))?;
	Ok(password_hash_key(&address))
}

fn password_hash_key(account: &Address) -> KeychainKey {
	KeychainKey::PasswordHash(account_slot(account))
}

/// Normalized address used as a cache slot.
fn account_slot(account: &Address) -> String {
	hex::encode(account.as_slice())
}

/// State shared with in-flight password requests.
struct Authenticator {
	keychain: Keychain,
	cache: PasswordCache,
	prompt: Arc<dyn PinPrompt>,
	navigator: Arc<dyn Navigator>,
	analytics: Arc<dyn Analytics>,
	pincode_type: RwLock<PincodeType>,
	biometry_verification_delay: Duration,
}

impl Authenticator {
	fn pincode_type(&self) -> PincodeType {
		*self.pincode_type.read().unwrap_or_else(|e| e.into_inner())
	}

	async fn retrieve_or_generate_pepper(&self) -> Result<SecretString, AuthError> {
		if let Some(pepper) = self.cache.get_pepper(DEFAULT_CACHE_ACCOUNT) {
			return Ok(pepper);
		}

		let pepper = match self.keychain.retrieve_item(&KeychainKey::Pepper, None).await? {
			Some(pepper) => pepper,
			None => {
				tracing::debug!("No stored pepper, generating new pepper and storing it to the keychain");
				let mut random = Zeroizing::new([0u8; PEPPER_LENGTH]);
				rand::thread_rng().fill_bytes(random.as_mut_slice());
				let pepper = SecretString::new(hex::encode(random.as_slice()));
				self.keychain
					.store_item(&KeychainKey::Pepper, &pepper, ItemAccess::WhenUnlocked)
					.await?;
				pepper
			},
		};

		self.cache.set_pepper(DEFAULT_CACHE_ACCOUNT, pepper.clone());
		Ok(pepper)
	}

	async fn password_for_pin(&self, pin: &SecretString) -> Result<SecretString, AuthError> {
		let pepper = self.retrieve_or_generate_pepper().await?;
		Ok(pepper.concat(pin))
	}

	async fn store_password_hash(&self, hash: String, account: &Address) -> Result<(), AuthError> {
		self.cache.set_password_hash(&account_slot(account), hash.clone());
		self.keychain
			.store_item(
				&password_hash_key(account),
				&SecretString::new(hash),
				ItemAccess::WhenUnlocked,
			)
			.await?;
		Ok(())
	}

	async fn store_pin_with_biometry(&self, pin: &SecretString) -> Result<(), AuthError> {
		self.keychain
			.store_item(&KeychainKey::Pin, pin, ItemAccess::Biometry)
			.await?;
		Ok(())
	}

	/// Resolves the password for one request. Runs inside the single flight.
	async fn resolve_password(
		&self,
		account: Address,
		with_verification: bool,
		store_hash: bool,
	) -> Result<SecretString, AuthError> {
		let slot = account_slot(&account);
		if let Some(password) = self.cache.get_password(&slot) {
			return Ok(password);
		}

		self.analytics.track(AnalyticsEvent::GetPincodeStart, Value::Null);
		let pin = self.get_pincode(with_verification).await?;
		self.analytics
			.track(AnalyticsEvent::GetPincodeComplete, Value::Null);

		let password = self.password_for_pin(&pin).await?;
		if store_hash {
			self.store_password_hash(get_password_hash(&password), &account)
				.await?;
		}

		self.cache.set_password(&slot, password.clone());
		Ok(password)
	}

	async fn get_pincode(&self, with_verification: bool) -> Result<SecretString, AuthError> {
		if let Some(pin) = self.cache.get_pin(DEFAULT_CACHE_ACCOUNT) {
			return Ok(pin);
		}

		if self.pincode_type() == PincodeType::PhoneAuth {
			match self.get_pincode_with_biometry().await {
				Ok(pin) => return Ok(pin),
				// PIN entry is the fallback when biometry fails
				Err(AuthError::Keychain(KeychainError::UserCancelled)) => {},
				Err(e) => tracing::warn!(error = %e, "Failed to retrieve pin with biometry"),
			}
		}

		self.request_pincode_input(with_verification, true, None)
			.await
	}

	async fn get_pincode_with_biometry(&self) -> Result<SecretString, AuthError> {
		self.analytics
			.track(AnalyticsEvent::GetPincodeWithBiometryStart, Value::Null);

		let result = match self
			.keychain
			.retrieve_item(&KeychainKey::Pin, Some("Unlock with biometry"))
			.await
		{
			Ok(Some(pin)) => Ok(pin),
			Ok(None) => Err(AuthError::BiometryReturnedNothing),
			Err(e) => Err(AuthError::from(e)),
		};

		match result {
			Ok(pin) => {
				self.analytics
					.track(AnalyticsEvent::GetPincodeWithBiometryComplete, Value::Null);
				self.cache.set_pin(DEFAULT_CACHE_ACCOUNT, pin.clone());
				tokio::time::sleep(self.biometry_verification_delay).await;
				Ok(pin)
			},
			Err(e) => {
				self.analytics
					.track(AnalyticsEvent::GetPincodeWithBiometryError, Value::Null);
				tracing::warn!(error = %e, "Failed to retrieve pin with biometry");
				Err(e)
			},
		}
	}

	async fn request_pincode_input(
		&self,
		with_verification: bool,
		should_navigate_back: bool,
		account: Option<Address>,
	) -> Result<SecretString, AuthError> {
		let pin = self
			.prompt
			.request_pin(PinRequest {
				with_verification,
				account,
			})
			.await?;

		if should_navigate_back {
			self.navigator.navigate_back();
		}

		if pin.is_empty() {
			return Err(AuthError::EmptyPin);
		}

		self.cache.set_pin(DEFAULT_CACHE_ACCOUNT, pin.clone());
		Ok(pin)
	}
}

/// PIN and password operations for the wallet account.
pub struct PasswordService {
	auth: Arc<Authenticator>,
	flight: SingleFlight<Address, SecretString, AuthError>,
	accounts: Arc<dyn AccountUnlocker>,
	mnemonics: Arc<dyn MnemonicStore>,
	events: EventBus,
	refresh_stored_password_hash: AtomicBool,
	unlock_duration_seconds: u64,
}

impl PasswordService {
	pub fn new(
		settings: PasswordSettings,
		pincode_type: PincodeType,
		collaborators: AuthCollaborators,
	) -> Self {
		let auth = Authenticator {
			keychain: Keychain::new(collaborators.keychain),
			cache: PasswordCache::new(settings.cache_timeout),
			prompt: collaborators.prompt,
			navigator: collaborators.navigator,
			analytics: collaborators.analytics,
			pincode_type: RwLock::new(pincode_type),
			biometry_verification_delay: settings.biometry_verification_delay,
		};

		Self {
			auth: Arc::new(auth),
			flight: SingleFlight::new(settings.release_delay),
			accounts: collaborators.accounts,
			mnemonics: collaborators.mnemonics,
			events: collaborators.events,
			refresh_stored_password_hash: AtomicBool::new(false),
			unlock_duration_seconds: settings.unlock_duration_seconds,
		}
	}

	pub fn pincode_type(&self) -> PincodeType {
		self.auth.pincode_type()
	}

	pub fn set_pincode_type(&self, pincode_type: PincodeType) {
		*self
			.auth
			.pincode_type
			.write()
			.unwrap_or_else(|e| e.into_inner()) = pincode_type;
	}

	/// Makes the next [`check_pin`](Self::check_pin) verify against the
	/// account and rewrite the stored hash.
	pub fn request_password_hash_refresh(&self) {
		self.refresh_stored_password_hash
			.store(true, Ordering::SeqCst);
	}

	pub fn cache(&self) -> &PasswordCache {
		&self.auth.cache
	}

	/// Returns the account password, asking for the PIN if nothing is cached.
	///
	/// Calls for the same account made while a request is in flight, or
	/// shortly after it resolved, share its result or error.
	#[instrument(skip_all, fields(account = %account))]
	pub async fn get_password(
		&self,
		account: Address,
		with_verification: bool,
		store_hash: bool,
	) -> Result<SecretString, AuthError> {
		let auth = Arc::clone(&self.auth);
		self.flight
			.run(account, move || async move {
				auth.resolve_password(account, with_verification, store_hash)
					.await
			})
			.await
	}

	/// [`get_password`](Self::get_password) for transaction flows, which
	/// require a PIN to have been set.
	pub async fn get_password_for_flow(
		&self,
		account: Address,
		with_verification: bool,
		store_hash: bool,
	) -> Result<SecretString, AuthError> {
		if self.pincode_type() == PincodeType::Unset {
			tracing::debug!("Pin has never been set");
			self.auth
				.analytics
				.track(AnalyticsEvent::PinNeverSet, Value::Null);
			return Err(AuthError::PinNeverSet);
		}

		self.get_password(account, with_verification, store_hash)
			.await
	}

	pub async fn retrieve_or_generate_pepper(&self) -> Result<SecretString, AuthError> {
		self.auth.retrieve_or_generate_pepper().await
	}

	/// Current PIN from the cache, biometry or the PIN screen, in that order.
	pub async fn get_pincode(&self, with_verification: bool) -> Result<SecretString, AuthError> {
		self.auth.get_pincode(with_verification).await
	}

	pub async fn get_pincode_with_biometry(&self) -> Result<SecretString, AuthError> {
		self.auth.get_pincode_with_biometry().await
	}

	pub async fn request_pincode_input(
		&self,
		with_verification: bool,
		should_navigate_back: bool,
		account: Option<Address>,
	) -> Result<SecretString, AuthError> {
		self.auth
			.request_pincode_input(with_verification, should_navigate_back, account)
			.await
	}

	/// Stores the current PIN behind biometry, asking for it if not cached.
	pub async fn set_pincode_with_biometry(&self) -> Result<(), AuthError> {
		let pin = match self.auth.cache.get_pin(DEFAULT_CACHE_ACCOUNT) {
			Some(pin) => pin,
			None => self.auth.request_pincode_input(true, true, None).await?,
		};

		// Overwrites stale items from earlier installs or failed attempts
		if let Err(e) = self.auth.store_pin_with_biometry(&pin).await {
			tracing::warn!(error = %e, "Failed to save pin with biometry");
			return Err(e);
		}
		tokio::time::sleep(self.auth.biometry_verification_delay).await;
		Ok(())
	}

	/// Cached or stored password hash of `account`. Storage errors and a
	/// missing hash both yield `None`.
	pub async fn retrieve_password_hash(&self, account: &Address) -> Option<String> {
		let slot = account_slot(account);
		if let Some(hash) = self.auth.cache.get_password_hash(&slot) {
			return Some(hash);
		}

		match self
			.auth
			.keychain
			.retrieve_item(&password_hash_key(account), None)
			.await
		{
			Ok(Some(hash)) => {
				let hash = hash.expose_secret().to_string();
				self.auth.cache.set_password_hash(&slot, hash.clone());
				Some(hash)
			},
			Ok(None) => {
				tracing::warn!("No password hash found in store");
				None
			},
			Err(e) => {
				tracing::error!(error = %e, "Error retrieving hash");
				None
			},
		}
	}

	/// Checks `pin` against the stored password hash.
	///
	/// Without a stored hash, or when a refresh was requested, the account
	/// is unlocked instead and the hash is rewritten on success.
	#[instrument(skip_all, fields(account = %account))]
	pub async fn check_pin(&self, pin: &SecretString, account: &Address) -> Result<bool, AuthError> {
		let should_refresh = self.refresh_stored_password_hash.load(Ordering::SeqCst);

		let password = self.auth.password_for_pin(pin).await?;
		let hash_for_pin = get_password_hash(&password);

		match self.retrieve_password_hash(account).await {
			Some(correct_hash) if !should_refresh => Ok(hash_for_pin == correct_hash),
			_ => {
				tracing::warn!("Validating pin without stored password hash");
				if !self.ensure_correct_password(&password, account).await {
					return Ok(false);
				}
				self.auth.store_password_hash(hash_for_pin, account).await?;
				self.refresh_stored_password_hash
					.store(false, Ordering::SeqCst);
				if self
					.events
					.publish(WalletAction::Identity(IdentityAction::StoredPasswordRefreshed))
					.is_err()
				{
					tracing::debug!("No subscribers for stored password refresh");
				}
				Ok(true)
			},
		}
	}

	/// Re-encrypts the account under the password for `new_pin`.
	///
	/// Returns `false` when the old PIN is wrong or any step fails.
	#[instrument(skip_all, fields(account = %account))]
	pub async fn update_pin(
		&self,
		account: &Address,
		old_pin: &SecretString,
		new_pin: &SecretString,
	) -> bool {
		match self.try_update_pin(account, old_pin, new_pin).await {
			Ok(updated) => updated,
			Err(e) => {
				tracing::error!(error = %e, "Error updating pin");
				false
			},
		}
	}

	async fn try_update_pin(
		&self,
		account: &Address,
		old_pin: &SecretString,
		new_pin: &SecretString,
	) -> Result<bool, AuthError> {
		let old_password = self.auth.password_for_pin(old_pin).await?;
		let new_password = self.auth.password_for_pin(new_pin).await?;

		if !self
			.accounts
			.update_passphrase(account, &old_password, &new_password)
			.await?
		{
			return Ok(false);
		}

		self.auth.cache.clear();
		self.auth
			.cache
			.set_pin(DEFAULT_CACHE_ACCOUNT, new_pin.clone());
		self.auth
			.store_password_hash(get_password_hash(&new_password), account)
			.await?;
		if self.pincode_type() == PincodeType::PhoneAuth {
			self.auth.store_pin_with_biometry(new_pin).await?;
		}

		let phrase = self
			.mnemonics
			.get_stored_mnemonic(account, &old_password)
			.await?
			.ok_or(AuthError::MnemonicNotFound)?;
		self.mnemonics
			.store_mnemonic(&phrase, account, &new_password)
			.await?;

		Ok(true)
	}

	/// Verifies `password` by unlocking the account with it.
	pub async fn ensure_correct_password(&self, password: &SecretString, account: &Address) -> bool {
		match self
			.accounts
			.unlock(account, password, self.unlock_duration_seconds)
			.await
		{
			Ok(unlocked) => unlocked,
			Err(e) => {
				tracing::error!(error = %e, "Error attempting to unlock wallet");
				false
			},
		}
	}

	pub async fn store_signed_message(&self, message: &SecretString) -> Result<(), AuthError> {
		self.auth
			.keychain
			.store_item(&KeychainKey::SignedMessage, message, ItemAccess::WhenUnlocked)
			.await?;
		Ok(())
	}

	pub async fn retrieve_signed_message(&self) -> Result<Option<SecretString>, AuthError> {
		Ok(self
			.auth
			.keychain
			.retrieve_item(&KeychainKey::SignedMessage, None)
			.await?)
	}

	pub async fn remove_stored_pin(&self) -> Result<(), AuthError> {
		self.auth.keychain.remove_item(&KeychainKey::Pin).await?;
		Ok(())
	}

	/// Forgets every secret of `account` kept on this device.
	#[instrument(skip_all, fields(account = %account))]
	pub async fn remove_account_locally(&self, account: &Address) -> Result<(), AuthError> {
		self.auth.cache.clear();

		let keychain = &self.auth.keychain;
		let hash_key = password_hash_key(account);
		tokio::try_join!(
			keychain.remove_item(&KeychainKey::Pepper),
			keychain.remove_item(&hash_key),
			keychain.remove_item(&KeychainKey::Pin),
			keychain.remove_item(&KeychainKey::SignedMessage),
		)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mnemonic::MemoryMnemonicStore;
	use crate::testing::{BiometryBehavior, FakeAccounts, FakeKeychain, ScriptedPrompt};
	use wallet_types::{HeadlessDevice, RecordingAnalytics};

	struct Harness {
		service: Arc<PasswordService>,
		keychain: Arc<FakeKeychain>,
		prompt: Arc<ScriptedPrompt>,
		accounts: Arc<FakeAccounts>,
		mnemonics: Arc<MemoryMnemonicStore>,
		analytics: Arc<RecordingAnalytics>,
		device: Arc<HeadlessDevice>,
		events: EventBus,
	}

	fn account() -> Address {
		Address::repeat_byte(0x7e)
	}

	fn harness(pincode_type: PincodeType, prompt: ScriptedPrompt) -> Harness {
		let keychain = Arc::new(FakeKeychain::new());
		let prompt = Arc::new(prompt);
		let accounts = Arc::new(FakeAccounts::new());
		let mnemonics = Arc::new(MemoryMnemonicStore::new());
		let analytics = Arc::new(RecordingAnalytics::new());
		let device = Arc::new(HeadlessDevice::new());
		let events = EventBus::new(16);

		let settings = PasswordSettings {
			release_delay: Duration::from_millis(50),
			biometry_verification_delay: Duration::ZERO,
			..PasswordSettings::default()
		};
		let service = PasswordService::new(
			settings,
			pincode_type,
			AuthCollaborators {
				keychain: keychain.clone(),
				prompt: prompt.clone(),
				navigator: device.clone(),
				analytics: analytics.clone(),
				accounts: accounts.clone(),
				mnemonics: mnemonics.clone(),
				events: events.clone(),
			},
		);

		Harness {
			service: Arc::new(service),
			keychain,
			prompt,
			accounts,
			mnemonics,
			analytics,
			device,
			events,
		}
	}

	#[test]
	fn test_password_hash_vectors() {
		let hash = |password: &str| get_password_hash(&SecretString::from(password));

		assert_eq!(
			hash("123456"),
			"bf7cbe09d71a1bcc373ab9a764917f730a6ed951ffa1a7399b7abd8f8fd73cb4"
		);
		assert_eq!(
			hash(&format!("{}111555", "01".repeat(64))),
			"30fb8abeffeaeeef688d8d52a48ac60506db2e890aa32651c975e31cf06369a0"
		);

		// Prefixes are not hex, so nothing is decoded
		let empty = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
		assert_eq!(hash("0x123456"), empty);
		assert_eq!(hash("0x1234567"), empty);

		// Decoding stops at the first invalid pair or a trailing nibble
		let single_ab = "087d80f7f182dd44f184aa86ca34488853ebcc04f0c60d5294919a466b463831";
		assert_eq!(hash("abx"), single_ab);
		assert_eq!(hash("abxy"), single_ab);
		assert_eq!(hash("ABXY"), single_ab);
	}

	#[test]
	fn test_password_hash_storage_key() {
		let key = password_hash_storage_key("0x000000000000000000000000000000000000007E57").unwrap_err();
		assert!(matches!(key, AuthError::InvalidAccount(_)));

		let key = password_hash_storage_key("0x0000000000000000000000000000000000007E57").unwrap();
		assert_eq!(
			key.as_string(),
			"PASSWORD_HASH-0000000000000000000000000000000000007e57"
		);
		assert!(password_hash_storage_key("not an address").is_err());
	}

	#[tokio::test]
	async fn test_pepper_generated_once() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));

		let pepper = h.service.retrieve_or_generate_pepper().await.unwrap();
		assert_eq!(pepper.len(), PEPPER_LENGTH * 2);
		assert!(pepper.expose_secret().chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(h.keychain.get(&KeychainKey::Pepper), Some(pepper.clone()));

		// Survives a cache wipe through the keychain
		h.service.cache().clear();
		assert_eq!(h.service.retrieve_or_generate_pepper().await.unwrap(), pepper);
	}

	#[tokio::test]
	async fn test_get_password_combines_pepper_and_pin() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));

		let password = h.service.get_password(account(), true, true).await.unwrap();
		let pepper = h.service.retrieve_or_generate_pepper().await.unwrap();

		assert_eq!(password, pepper.concat(&SecretString::from("143826")));
		assert_eq!(
			h.keychain.get(&password_hash_key(&account())),
			Some(SecretString::new(get_password_hash(&password)))
		);
		assert_eq!(
			h.analytics.names(),
			vec![AnalyticsEvent::GetPincodeStart, AnalyticsEvent::GetPincodeComplete]
		);
		assert_eq!(h.device.back_count(), 1);
	}

	#[tokio::test]
	async fn test_concurrent_requests_share_one_prompt() {
		let h = harness(
			PincodeType::CustomPin,
			ScriptedPrompt::answering("143826").with_delay(Duration::from_millis(50)),
		);

		let calls = (0..4).map(|_| {
			let service = Arc::clone(&h.service);
			tokio::spawn(async move { service.get_password(account(), true, false).await })
		});
		let results: Vec<_> = futures::future::join_all(calls)
			.await
			.into_iter()
			.map(|joined| joined.unwrap())
			.collect();

		assert_eq!(h.prompt.request_count(), 1);
		let first = results[0].clone().unwrap();
		assert!(results.iter().all(|r| r.as_ref() == Ok(&first)));
	}

	#[tokio::test]
	async fn test_concurrent_requests_share_one_cancellation() {
		let h = harness(
			PincodeType::CustomPin,
			ScriptedPrompt::cancelling().with_delay(Duration::from_millis(50)),
		);

		let calls = (0..3).map(|_| {
			let service = Arc::clone(&h.service);
			tokio::spawn(async move { service.get_password(account(), true, false).await })
		});
		let results = futures::future::join_all(calls).await;

		assert_eq!(h.prompt.request_count(), 1);
		for result in results {
			assert_eq!(result.unwrap(), Err(AuthError::Cancelled));
		}
		// A cancelled prompt does not navigate back
		assert_eq!(h.device.back_count(), 0);
	}

	#[tokio::test]
	async fn test_flow_requires_pin_to_be_set() {
		let h = harness(PincodeType::Unset, ScriptedPrompt::answering("143826"));

		let err = h
			.service
			.get_password_for_flow(account(), true, false)
			.await
			.unwrap_err();

		assert_eq!(err, AuthError::PinNeverSet);
		assert_eq!(h.analytics.names(), vec![AnalyticsEvent::PinNeverSet]);
		assert_eq!(h.prompt.request_count(), 0);
	}

	#[tokio::test]
	async fn test_phone_auth_uses_biometry() {
		let h = harness(PincodeType::PhoneAuth, ScriptedPrompt::answering("999999"));
		h.keychain
			.store_item(&KeychainKey::Pin, &SecretString::from("143826"), ItemAccess::Biometry)
			.await
			.unwrap();

		let pin = h.service.get_pincode(true).await.unwrap();

		assert_eq!(pin, SecretString::from("143826"));
		assert_eq!(h.prompt.request_count(), 0);
		assert_eq!(
			h.analytics.names(),
			vec![
				AnalyticsEvent::GetPincodeWithBiometryStart,
				AnalyticsEvent::GetPincodeWithBiometryComplete
			]
		);
		assert_eq!(
			h.service.cache().get_pin(DEFAULT_CACHE_ACCOUNT),
			Some(SecretString::from("143826"))
		);
	}

	#[tokio::test]
	async fn test_biometry_failure_falls_back_to_prompt() {
		for behavior in [BiometryBehavior::Cancel, BiometryBehavior::ReturnNothing] {
			let h = harness(PincodeType::PhoneAuth, ScriptedPrompt::answering("483917"));
			h.keychain
				.store_item(&KeychainKey::Pin, &SecretString::from("143826"), ItemAccess::Biometry)
				.await
				.unwrap();
			h.keychain.set_biometry(behavior);

			let pin = h.service.get_pincode(true).await.unwrap();

			assert_eq!(pin, SecretString::from("483917"));
			assert_eq!(h.prompt.request_count(), 1);
			assert!(h
				.analytics
				.names()
				.contains(&AnalyticsEvent::GetPincodeWithBiometryError));
		}
	}

	#[tokio::test]
	async fn test_set_pincode_with_biometry() {
		let h = harness(PincodeType::PhoneAuth, ScriptedPrompt::answering("143826"));

		h.service.set_pincode_with_biometry().await.unwrap();

		assert_eq!(h.keychain.access(&KeychainKey::Pin), Some(ItemAccess::Biometry));
		assert_eq!(h.keychain.get(&KeychainKey::Pin), Some(SecretString::from("143826")));

		h.service.remove_stored_pin().await.unwrap();
		assert!(h.keychain.get(&KeychainKey::Pin).is_none());
	}

	#[tokio::test]
	async fn test_check_pin_without_stored_hash_unlocks() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));
		let mut actions = h.events.subscribe();
		let pin = SecretString::from("143826");
		let password = h.service.auth.password_for_pin(&pin).await.unwrap();
		h.accounts.set_password(password.clone());

		assert!(!h
			.service
			.check_pin(&SecretString::from("483917"), &account())
			.await
			.unwrap());
		assert!(h.service.check_pin(&pin, &account()).await.unwrap());
		assert_eq!(h.accounts.unlock_count(), 2);
		assert_eq!(
			actions.recv().await.unwrap(),
			WalletAction::Identity(IdentityAction::StoredPasswordRefreshed)
		);

		// The stored hash now answers without unlocking
		assert!(h.service.check_pin(&pin, &account()).await.unwrap());
		assert!(!h
			.service
			.check_pin(&SecretString::from("483917"), &account())
			.await
			.unwrap());
		assert_eq!(h.accounts.unlock_count(), 2);

		h.service.request_password_hash_refresh();
		assert!(h.service.check_pin(&pin, &account()).await.unwrap());
		assert_eq!(h.accounts.unlock_count(), 3);
	}

	#[tokio::test]
	async fn test_update_pin_moves_mnemonic() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));
		let old_pin = SecretString::from("143826");
		let new_pin = SecretString::from("483917");
		let old_password = h.service.auth.password_for_pin(&old_pin).await.unwrap();
		let new_password = h.service.auth.password_for_pin(&new_pin).await.unwrap();
		let phrase = SecretString::from("test test test junk");

		h.accounts.set_password(old_password.clone());
		h.mnemonics
			.store_mnemonic(&phrase, &account(), &old_password)
			.await
			.unwrap();

		assert!(h.service.update_pin(&account(), &old_pin, &new_pin).await);

		assert_eq!(
			h.mnemonics
				.get_stored_mnemonic(&account(), &new_password)
				.await
				.unwrap(),
			Some(phrase)
		);
		assert_eq!(
			h.service.cache().get_pin(DEFAULT_CACHE_ACCOUNT),
			Some(new_pin.clone())
		);
		assert_eq!(
			h.service.retrieve_password_hash(&account()).await,
			Some(get_password_hash(&new_password))
		);

		// Old PIN no longer updates
		assert!(!h.service.update_pin(&account(), &old_pin, &new_pin).await);
	}

	#[tokio::test]
	async fn test_update_pin_without_mnemonic_fails() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));
		let old_pin = SecretString::from("143826");
		let old_password = h.service.auth.password_for_pin(&old_pin).await.unwrap();
		h.accounts.set_password(old_password);

		assert!(
			!h.service
				.update_pin(&account(), &old_pin, &SecretString::from("483917"))
				.await
		);
	}

	#[tokio::test]
	async fn test_remove_account_locally() {
		let h = harness(PincodeType::CustomPin, ScriptedPrompt::answering("143826"));
		h.service.get_password(account(), true, true).await.unwrap();
		h.service
			.store_signed_message(&SecretString::from("signed"))
			.await
			.unwrap();
		assert_eq!(
			h.service.retrieve_signed_message().await.unwrap(),
			Some(SecretString::from("signed"))
		);

		h.service.remove_account_locally(&account()).await.unwrap();

		assert!(h.keychain.get(&KeychainKey::Pepper).is_none());
		assert!(h.keychain.get(&password_hash_key(&account())).is_none());
		assert!(h.service.retrieve_signed_message().await.unwrap().is_none());
		assert!(h.service.cache().get_pin(DEFAULT_CACHE_ACCOUNT).is_none());
	}
}
