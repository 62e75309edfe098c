//! Test harness wiring an engine to scripted collaborators.

use crate::builder::{HostServices, WalletBuilder, WalletFactories};
use crate::engine::WalletEngine;
use alloy::primitives::address;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use wallet_config::builders::config::ConfigBuilder;
use wallet_delivery::testing::ScriptedDelivery;
use wallet_delivery::DeliveryService;
use wallet_pincode::testing::{FakeAccounts, FakeKeychain, ScriptedPrompt};
use wallet_pincode::{ItemAccess, KeychainInterface, MemoryMnemonicStore};
use wallet_storage::implementations::memory::MemoryStorage;
use wallet_storage::{StorageError, StorageInterface};
use wallet_types::{
	AccountError, Address, ConfigSchema, HeadlessDevice, JumpstartRelay, KeychainKey,
	NetworkConfig, NetworkId, RecordingAnalytics, SecretString, SerializablePreparedTransaction,
	TokenConfig, TransactionHash, WalletAction,
};

pub(crate) const CUSD: Address = address!("874069fa1eb16d44d622f2e0ca25eea172369bc1");
pub(crate) const POOL_TOKEN: Address = address!("4ee5b0b1a8b2f8c4e2a1c1e0b9f3e8a5b7c6d5e4");
pub(crate) const JUMPSTART: Address = address!("22d0bd0dbb5e1b8b8c9a8c3a1b2b54e7b0e8d6f1");

const PEPPER: &str = "abababababababababababababababababababababababababababababababababababababababababababababababababababababababababababababababab";

pub(crate) struct Harness {
	pub engine: WalletEngine,
	pub delivery: Arc<ScriptedDelivery>,
	pub analytics: Arc<RecordingAnalytics>,
	pub device: Arc<HeadlessDevice>,
	pub prompt: Arc<ScriptedPrompt>,
	pub relay: Arc<FakeRelay>,
	actions: broadcast::Receiver<WalletAction>,
}

impl Harness {
	/// Hash of the `n`th sent transaction.
	pub fn hash(&self, n: usize) -> TransactionHash {
		ScriptedDelivery::hash_of(n)
	}

	/// Actions published since the last call.
	pub fn drain_actions(&mut self) -> Vec<WalletAction> {
		let mut actions = Vec::new();
		while let Ok(action) = self.actions.try_recv() {
			actions.push(action);
		}
		actions
	}
}

/// Engine on Celo Alfajores with cUSD, a pool token and a jumpstart
/// escrow. The account password is the fixed pepper followed by `143826`.
pub(crate) async fn harness(prompt: ScriptedPrompt) -> Harness {
	let config = ConfigBuilder::new()
		.network(
			NetworkId::CeloAlfajores,
			NetworkConfig {
				chain_id: 44787,
				rpc_url: "http://localhost:8545".to_string(),
				gas_subsidized: false,
				jumpstart_contract_address: Some(JUMPSTART),
				tokens: vec![
					TokenConfig {
						address: None,
						symbol: "CELO".to_string(),
						decimals: 18,
						is_fee_currency: true,
						is_native: true,
					},
					TokenConfig {
						address: Some(CUSD),
						symbol: "cUSD".to_string(),
						decimals: 18,
						is_fee_currency: true,
						is_native: false,
					},
					TokenConfig {
						address: Some(POOL_TOKEN),
						symbol: "aCUSD".to_string(),
						decimals: 18,
						is_fee_currency: false,
						is_native: false,
					},
				],
			},
		)
		.build();

	let keychain = Arc::new(FakeKeychain::new());
	let pepper = SecretString::from(PEPPER);
	keychain
		.store_item(&KeychainKey::Pepper, &pepper, ItemAccess::WhenUnlocked)
		.await
		.unwrap();
	let accounts = Arc::new(FakeAccounts::new());
	accounts.set_password(pepper.concat(&SecretString::from("143826")));

	let delivery = Arc::new(ScriptedDelivery::new());
	let analytics = Arc::new(RecordingAnalytics::new());
	let device = Arc::new(HeadlessDevice::new());
	let prompt = Arc::new(prompt);
	let relay = Arc::new(FakeRelay::default());

	let engine = WalletBuilder::new(config)
		.with_delivery(Arc::new(DeliveryService::single(
			delivery.clone(),
			NetworkId::all(),
		)))
		.build(
			HostServices {
				prompt: prompt.clone(),
				navigator: device.clone(),
				haptics: device.clone(),
				analytics: analytics.clone(),
				accounts,
				mnemonics: Arc::new(MemoryMnemonicStore::new()),
				keychain: Some(keychain),
				jumpstart_relay: Some(relay.clone()),
			},
			WalletFactories::default(),
		)
		.await
		.unwrap();
	let actions = engine.events().subscribe();

	Harness {
		engine,
		delivery,
		analytics,
		device,
		prompt,
		relay,
		actions,
	}
}

/// Calldata of `approve(spender, amount)`.
pub(crate) fn approve_data(amount: u128) -> String {
	format!(
		"0x095ea7b3{:0>64}{:064x}",
		alloy::primitives::hex::encode(JUMPSTART.as_slice()),
		amount
	)
}

pub(crate) fn serialized(to: Address, data: &str) -> SerializablePreparedTransaction {
	SerializablePreparedTransaction {
		from: format!("{:#x}", Address::repeat_byte(0x11)),
		to: format!("{:#x}", to),
		data: Some(data.to_string()),
		value: Some("0".to_string()),
		gas: "59480".to_string(),
		max_fee_per_gas: Some("12000000000".to_string()),
		max_priority_fee_per_gas: None,
		gas_price: None,
		fee_currency: None,
		base_fee_per_gas: None,
		estimated_gas_use: None,
	}
}

/// Relay answering claims with scripted hashes.
#[derive(Default)]
pub(crate) struct FakeRelay {
	response: Mutex<Option<Result<Vec<TransactionHash>, AccountError>>>,
	claims: Mutex<Vec<(NetworkId, Address, Address)>>,
}

impl FakeRelay {
	pub fn respond(&self, response: Result<Vec<TransactionHash>, AccountError>) {
		*self.response.lock().unwrap() = Some(response);
	}

	/// `(network, contract, beneficiary)` of every claim.
	pub fn claims(&self) -> Vec<(NetworkId, Address, Address)> {
		self.claims.lock().unwrap().clone()
	}
}

#[async_trait]
impl JumpstartRelay for FakeRelay {
	async fn claim(
		&self,
		_private_key: &SecretString,
		network_id: NetworkId,
		contract: Address,
		beneficiary: Address,
	) -> Result<Vec<TransactionHash>, AccountError> {
		self.claims
			.lock()
			.unwrap()
			.push((network_id, contract, beneficiary));
		self.response
			.lock()
			.unwrap()
			.clone()
			.unwrap_or_else(|| Err(AccountError::Backend("no response scripted".to_string())))
	}
}

/// In-memory storage whose `n`th writes fail, counting from zero.
pub(crate) struct FailingWrites {
	inner: MemoryStorage,
	failing: Vec<usize>,
	writes: AtomicUsize,
}

impl FailingWrites {
	pub fn on(failing: &[usize]) -> Self {
		Self {
			inner: MemoryStorage::new(),
			failing: failing.to_vec(),
			writes: AtomicUsize::new(0),
		}
	}
}

#[async_trait]
impl StorageInterface for FailingWrites {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let write = self.writes.fetch_add(1, Ordering::SeqCst);
		if self.failing.contains(&write) {
			return Err(StorageError::Backend(format!("write {} failed", write)));
		}
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}
