//! Builder pattern for constructing wallet engines.
//!
//! Composes a [`WalletEngine`] from the configuration, storage and delivery
//! factories, and the host services (PIN screen, navigation, haptics,
//! analytics, account unlocking) the embedding application provides.

use crate::engine::token_manager::TokenManager;
use crate::engine::WalletEngine;
use crate::handlers::{FlowContext, FlowRunner};
use crate::standby::StandbyRegistry;
use crate::submitter::TransactionSubmitter;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wallet_config::Config;
use wallet_delivery::{DeliveryFactory, DeliveryInterface, DeliveryService, ReceiptPolling};
use wallet_pincode::{
	AuthCollaborators, KeychainInterface, PasswordService, PasswordSettings, PinPolicy, PinPrompt,
	StorageKeychain,
};
use wallet_storage::{StorageFactory, StorageService};
use wallet_types::{
	AccountUnlocker, Analytics, EventBus, Haptics, JumpstartRelay, MnemonicStore, Navigator,
	NetworkId,
};

/// Errors that can occur during wallet engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for the pluggable services, keyed by implementation name.
pub struct WalletFactories {
	pub storage_factories: HashMap<String, StorageFactory>,
	pub delivery_factories: HashMap<String, DeliveryFactory>,
}

impl Default for WalletFactories {
	/// Every implementation shipped with the storage and delivery crates.
	fn default() -> Self {
		Self {
			storage_factories: wallet_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			delivery_factories: wallet_delivery::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}
}

/// Services owned by the embedding application.
pub struct HostServices {
	pub prompt: Arc<dyn PinPrompt>,
	pub navigator: Arc<dyn Navigator>,
	pub haptics: Arc<dyn Haptics>,
	pub analytics: Arc<dyn Analytics>,
	pub accounts: Arc<dyn AccountUnlocker>,
	pub mnemonics: Arc<dyn MnemonicStore>,
	/// Secure store for PIN material. Defaults to the primary storage.
	pub keychain: Option<Arc<dyn KeychainInterface>>,
	/// Relayer of jumpstart claims. Claims fail without one.
	pub jumpstart_relay: Option<Arc<dyn JumpstartRelay>>,
}

/// Builder for constructing a [`WalletEngine`].
pub struct WalletBuilder {
	config: Config,
	delivery: Option<Arc<DeliveryService>>,
}

impl WalletBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			delivery: None,
		}
	}

	/// Uses `delivery` instead of building it from the delivery factories.
	pub fn with_delivery(mut self, delivery: Arc<DeliveryService>) -> Self {
		self.delivery = Some(delivery);
		self
	}

	/// Builds the engine and restores persisted standby transactions.
	pub async fn build(
		self,
		host: HostServices,
		factories: WalletFactories,
	) -> Result<WalletEngine, BuilderError> {
		let storage = Arc::new(self.build_storage(&factories)?);
		let delivery = match self.delivery.clone() {
			Some(delivery) => delivery,
			None => Arc::new(self.build_delivery(&factories)?),
		};

		let config = self.config;
		let events = EventBus::new(config.wallet.event_bus_capacity);
		let keychain = host
			.keychain
			.unwrap_or_else(|| Arc::new(StorageKeychain::new(storage.clone())));

		let settings = PasswordSettings {
			release_delay: Duration::from_millis(config.pincode.password_release_delay_ms),
			biometry_verification_delay: Duration::from_millis(
				config.pincode.biometry_verification_delay_ms,
			),
			cache_timeout: Duration::from_secs(config.pincode.cache_timeout_seconds),
			unlock_duration_seconds: config.pincode.unlock_duration_seconds,
		};
		let passwords = Arc::new(PasswordService::new(
			settings,
			config.wallet.pincode_type,
			AuthCollaborators {
				keychain,
				prompt: host.prompt,
				navigator: host.navigator.clone(),
				analytics: host.analytics.clone(),
				accounts: host.accounts,
				mnemonics: host.mnemonics,
				events: events.clone(),
			},
		));

		let pin_policy = PinPolicy::from_settings(config.pincode.use_expanded_blocklist)
			.map_err(|e| BuilderError::Config(format!("Failed to load PIN blocklist: {}", e)))?;

		let standby = Arc::new(StandbyRegistry::new(storage.clone(), events.clone()));
		let restored = standby.load().await.map_err(|e| {
			BuilderError::Config(format!("Failed to restore standby transactions: {}", e))
		})?;
		tracing::info!(component = "standby", restored, "Loaded");

		let tokens = Arc::new(TokenManager::new(config.tokens()));
		let submitter = Arc::new(TransactionSubmitter::new(
			config.wallet.account,
			passwords.clone(),
			delivery.clone(),
			standby.clone(),
			tokens.clone(),
		));
		let context = Arc::new(FlowContext {
			runner: FlowRunner::new(submitter, delivery.clone(), standby.clone(), host.navigator),
			tokens,
			networks: config.networks.clone(),
			events: events.clone(),
			analytics: host.analytics,
			haptics: host.haptics,
			jumpstart_relay: host.jumpstart_relay,
		});

		Ok(WalletEngine::new(
			config, storage, delivery, passwords, standby, events, pin_policy, context,
		))
	}

	fn build_storage(&self, factories: &WalletFactories) -> Result<StorageService, BuilderError> {
		let primary = &self.config.storage.primary;
		let config = self.config.storage.implementations.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(backend) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(StorageService::new(backend))
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	fn build_delivery(&self, factories: &WalletFactories) -> Result<DeliveryService, BuilderError> {
		let polling = ReceiptPolling {
			interval: Duration::from_millis(self.config.delivery.receipt_poll_interval_ms),
			timeout: Duration::from_secs(self.config.delivery.receipt_timeout_seconds),
		};

		let mut providers = HashMap::new();
		for (name, config) in &self.config.delivery.implementations {
			let Some(factory) = factories.delivery_factories.get(name) else {
				tracing::warn!(component = "delivery", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			let implementation: Arc<dyn DeliveryInterface> =
				match factory(config, &self.config.networks, polling) {
					Ok(implementation) => implementation.into(),
					Err(e) => {
						tracing::error!(
							component = "delivery",
							implementation = %name,
							error = %e,
							"Failed to create delivery implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create delivery implementation '{}': {}",
							name, e
						)));
					},
				};

			for network_id in self.served_networks(config)? {
				tracing::info!(component = "delivery", implementation = %name, network_id = %network_id, "Loaded");
				providers.insert(network_id, implementation.clone());
			}
		}

		if providers.is_empty() {
			tracing::warn!("No delivery implementations available - wallet will not be able to submit any transactions");
		}
		Ok(DeliveryService::new(providers))
	}

	/// Networks listed under `network_ids`, or every configured network.
	fn served_networks(&self, config: &toml::Value) -> Result<Vec<NetworkId>, BuilderError> {
		match config.get("network_ids").and_then(|v| v.as_array()) {
			Some(ids) => ids
				.iter()
				.map(|id| {
					id.as_str()
						.ok_or_else(|| BuilderError::Config("network_ids must be strings".into()))
						.and_then(|id| NetworkId::from_str(id).map_err(BuilderError::Config))
				})
				.collect(),
			None => Ok(self.config.networks.keys().copied().collect()),
		}
	}
}
