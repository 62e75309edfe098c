//! The wallet engine: owns the services and runs one flow per kind at a time.

pub mod token_manager;

use crate::handlers::earn::{DepositInfo, WithdrawInfo};
use crate::handlers::jumpstart::{JumpstartClaimInfo, JumpstartReclaimInfo, JumpstartSendInfo};
use crate::handlers::{EarnHandler, FlowContext, JumpstartHandler};
use crate::standby::StandbyRegistry;
use crate::state::FlowState;
use crate::FlowError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use token_manager::TokenManager;
use wallet_config::Config;
use wallet_delivery::DeliveryService;
use wallet_pincode::{PasswordService, PinError, PinPolicy};
use wallet_storage::StorageService;
use wallet_types::{
	EarnAction, EventBus, JumpstartAction, NetworkId, TransactionHash, WalletAction,
};

/// Kinds of flows the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
	EarnDeposit,
	EarnWithdraw,
	JumpstartSend,
	JumpstartReclaim,
	JumpstartClaim,
}

/// Marks a flow kind as running until dropped.
struct RunningGuard<'a> {
	running: &'a Mutex<HashSet<FlowKind>>,
	kind: FlowKind,
}

impl Drop for RunningGuard<'_> {
	fn drop(&mut self) {
		if let Ok(mut running) = self.running.lock() {
			running.remove(&self.kind);
		}
	}
}

/// Main wallet engine.
pub struct WalletEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) delivery: Arc<DeliveryService>,
	pub(crate) passwords: Arc<PasswordService>,
	pub(crate) standby: Arc<StandbyRegistry>,
	pub(crate) tokens: Arc<TokenManager>,
	pub(crate) events: EventBus,
	pub(crate) pin_policy: PinPolicy,
	earn: EarnHandler,
	jumpstart: JumpstartHandler,
	running: Mutex<HashSet<FlowKind>>,
}

impl WalletEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		delivery: Arc<DeliveryService>,
		passwords: Arc<PasswordService>,
		standby: Arc<StandbyRegistry>,
		events: EventBus,
		pin_policy: PinPolicy,
		context: Arc<FlowContext>,
	) -> Self {
		Self {
			tokens: context.tokens.clone(),
			earn: EarnHandler::new(context.clone()),
			jumpstart: JumpstartHandler::new(context),
			config,
			storage,
			delivery,
			passwords,
			standby,
			events,
			pin_policy,
			running: Mutex::new(HashSet::new()),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn delivery(&self) -> &Arc<DeliveryService> {
		&self.delivery
	}

	pub fn passwords(&self) -> &Arc<PasswordService> {
		&self.passwords
	}

	pub fn standby(&self) -> &Arc<StandbyRegistry> {
		&self.standby
	}

	pub fn tokens(&self) -> &Arc<TokenManager> {
		&self.tokens
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn earn(&self) -> &EarnHandler {
		&self.earn
	}

	pub fn jumpstart(&self) -> &JumpstartHandler {
		&self.jumpstart
	}

	/// Checks a PIN the user wants to set.
	pub fn validate_new_pin(&self, pin: &str) -> Result<(), PinError> {
		self.pin_policy.validate_new_pin(pin)
	}

	/// Whether a flow of `kind` is in progress.
	pub fn is_running(&self, kind: FlowKind) -> bool {
		self.running
			.lock()
			.map(|running| running.contains(&kind))
			.unwrap_or(false)
	}

	fn try_start(&self, kind: FlowKind) -> Option<RunningGuard<'_>> {
		let mut running = self.running.lock().ok()?;
		if !running.insert(kind) {
			tracing::debug!(?kind, "Flow already running, ignoring request");
			return None;
		}
		Some(RunningGuard {
			running: &self.running,
			kind,
		})
	}

	fn dispatch(&self, action: WalletAction) {
		self.events.publish(action).ok();
	}

	/// Starts an earn deposit. Returns `None` while another deposit runs.
	pub async fn deposit(&self, info: DepositInfo) -> Option<FlowState> {
		let _guard = self.try_start(FlowKind::EarnDeposit)?;
		self.dispatch(WalletAction::Earn(EarnAction::DepositStart {
			pool_id: info.pool.position_id.clone(),
		}));
		Some(self.earn.deposit(info).await)
	}

	/// Starts an earn withdrawal. Returns `None` while another one runs.
	pub async fn withdraw(&self, info: WithdrawInfo) -> Option<FlowState> {
		let _guard = self.try_start(FlowKind::EarnWithdraw)?;
		self.dispatch(WalletAction::Earn(EarnAction::WithdrawStart {
			pool_id: info.pool.position_id.clone(),
		}));
		Some(self.earn.withdraw(info).await)
	}

	pub async fn jumpstart_send(&self, info: JumpstartSendInfo) -> Option<FlowState> {
		let _guard = self.try_start(FlowKind::JumpstartSend)?;
		self.dispatch(WalletAction::Jumpstart(
			JumpstartAction::DepositTransactionStarted,
		));
		Some(self.jumpstart.send(info).await)
	}

	pub async fn jumpstart_reclaim(&self, info: JumpstartReclaimInfo) -> Option<FlowState> {
		let _guard = self.try_start(FlowKind::JumpstartReclaim)?;
		self.dispatch(WalletAction::Jumpstart(JumpstartAction::ReclaimStarted {
			deposit_tx_hash: info.deposit_tx_hash.clone(),
		}));
		Some(self.jumpstart.reclaim(info).await)
	}

	/// Claims a received jumpstart link. Returns `None` while another
	/// claim runs.
	pub async fn jumpstart_claim(&self, info: JumpstartClaimInfo) -> Option<FlowState> {
		let _guard = self.try_start(FlowKind::JumpstartClaim)?;
		self.dispatch(WalletAction::Jumpstart(JumpstartAction::ClaimStarted));
		Some(self.jumpstart.claim(info).await)
	}

	/// Looks up receipts of pending standby transactions once, confirming
	/// the ones that were mined, and drops entries settled before this call.
	///
	/// Used after a restart, when the flows that recorded them are gone. An
	/// entry confirmed here stays listed until the next reconcile.
	pub async fn reconcile_standby(&self) -> Result<ReconcileReport, FlowError> {
		let mut settled: HashMap<NetworkId, Vec<TransactionHash>> = HashMap::new();
		let mut report = ReconcileReport::default();

		for tx in self.standby.all().await {
			let Some(hash) = tx.transaction_hash else {
				continue;
			};
			if !tx.is_pending() {
				settled.entry(tx.network_id).or_default().push(hash);
				continue;
			}
			match self.delivery.get_receipt(tx.network_id, &hash).await {
				Ok(Some(receipt)) => {
					if self.standby.confirm(&tx.context.id, &receipt).await?.is_some() {
						report.confirmed += 1;
					}
				},
				Ok(None) => {},
				Err(e) => {
					tracing::warn!(tx_hash = %hash, error = %e, "Failed to look up receipt");
				},
			}
		}

		for (network_id, hashes) in settled {
			report.removed += self.standby.remove_confirmed(network_id, &hashes).await?.len();
		}
		tracing::info!(
			confirmed = report.confirmed,
			removed = report.removed,
			"Reconciled standby transactions"
		);
		Ok(report)
	}
}

/// Outcome of [`WalletEngine::reconcile_standby`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
	pub confirmed: usize,
	pub removed: usize,
}
