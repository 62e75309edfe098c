//! Transaction flow handlers.
//!
//! Every flow follows the same lifecycle, driven by [`FlowRunner`]:
//! submit through the PIN gate, record standby transactions, send the user
//! home, wait for all receipts and decide the outcome from them. The
//! handlers in the submodules build the [`FlowPlan`] and translate the
//! outcome into actions and analytics.

pub mod earn;
pub mod jumpstart;

pub use earn::EarnHandler;
pub use jumpstart::JumpstartHandler;

use crate::engine::token_manager::TokenManager;
use crate::standby::StandbyRegistry;
use crate::state::{FlowState, FlowStateMachine};
use crate::submitter::{StandbyConstructor, SubmittedTransaction, TransactionSubmitter};
use crate::FlowError;
use alloy::sol;
use alloy::sol_types::SolCall;
use serde_json::{Map, Value};
use std::sync::Arc;
use wallet_delivery::DeliveryService;
use wallet_types::{
	format_token_amount, Address, Analytics, EventBus, Haptics, JumpstartRelay, Navigator, NetworkId,
	NetworksConfig, PreparedTransaction, ReceiptStatus, TokenInfo, TransactionHash,
	TransactionReceipt, WalletAction, U256,
};

sol! {
	interface IERC20 {
		function approve(address spender, uint256 amount) external returns (bool);
	}
}

/// Which receipts decide whether a flow succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptPolicy {
	/// Only the last transaction matters; earlier ones are approvals.
	LastMustSucceed,
	AllMustSucceed,
}

/// What a flow submits.
pub struct FlowPlan {
	pub network_id: NetworkId,
	pub transactions: Vec<PreparedTransaction>,
	/// One constructor per transaction.
	pub standby: Vec<StandbyConstructor>,
	pub gas_subsidized: bool,
	pub policy: ReceiptPolicy,
}

/// A prepared transaction with what became of it.
#[derive(Debug, Clone)]
pub struct TrackedTransaction {
	pub tx: PreparedTransaction,
	pub hash: Option<TransactionHash>,
	pub receipt: Option<TransactionReceipt>,
}

/// Progress of one flow execution.
#[derive(Debug, Default)]
pub struct FlowRun {
	machine: FlowStateMachine,
	tracked: Vec<TrackedTransaction>,
	submitted: bool,
}

impl FlowRun {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts preparing the flow.
	pub fn begin(&mut self) -> Result<(), FlowError> {
		self.machine.transition(FlowState::Preparing)
	}

	pub fn state(&self) -> FlowState {
		self.machine.state()
	}

	pub fn tracked(&self) -> &[TrackedTransaction] {
		&self.tracked
	}

	pub fn hashes(&self) -> Vec<TransactionHash> {
		self.tracked.iter().filter_map(|t| t.hash).collect()
	}

	/// Whether every transaction was broadcast and the user sent home.
	pub fn submitted(&self) -> bool {
		self.submitted
	}

	/// Moves to the terminal state matching `result`.
	pub fn conclude<T>(&mut self, result: &Result<T, FlowError>) -> FlowState {
		let terminal = match result {
			Ok(_) => FlowState::Succeeded,
			Err(FlowError::Cancelled) => FlowState::Cancelled,
			Err(_) => FlowState::Failed,
		};
		if let Err(e) = self.machine.transition(terminal) {
			tracing::warn!(error = %e, "Flow ended in an unexpected state");
			// Anything that cannot end as planned ends as failed
			self.machine.transition(FlowState::Failed).ok();
		}
		self.machine.state()
	}
}

/// Drives a [`FlowPlan`] through submission and receipt checks.
pub struct FlowRunner {
	submitter: Arc<TransactionSubmitter>,
	delivery: Arc<DeliveryService>,
	standby: Arc<StandbyRegistry>,
	navigator: Arc<dyn Navigator>,
}

impl FlowRunner {
	pub fn new(
		submitter: Arc<TransactionSubmitter>,
		delivery: Arc<DeliveryService>,
		standby: Arc<StandbyRegistry>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self {
			submitter,
			delivery,
			standby,
			navigator,
		}
	}

	/// Submits the plan and waits for its receipts, in submission order.
	///
	/// Every standby transaction recorded along the way is reconciled with
	/// its receipt, or marked failed, before this returns.
	pub async fn execute(
		&self,
		plan: FlowPlan,
		run: &mut FlowRun,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		run.machine.transition(FlowState::Submitting)?;
		run.tracked = plan
			.transactions
			.iter()
			.map(|tx| TrackedTransaction {
				tx: tx.clone(),
				hash: None,
				receipt: None,
			})
			.collect();

		let mut submitted = Vec::new();
		let sent = self
			.submitter
			.send_prepared_transactions(
				&plan.transactions,
				plan.network_id,
				&plan.standby,
				plan.gas_subsidized,
				&mut submitted,
			)
			.await;
		for (tracked, submitted) in run.tracked.iter_mut().zip(&submitted) {
			tracked.hash = Some(submitted.hash);
		}

		if let Err(e) = sent {
			if !submitted.is_empty() {
				tracing::warn!(
					broadcast = submitted.len(),
					"Submission stopped part way, settling what was broadcast"
				);
				self.settle(plan.network_id, &submitted, run).await.ok();
			}
			return Err(e);
		}

		self.navigator.navigate_home();
		run.submitted = true;
		run.machine.transition(FlowState::AwaitingReceipt)?;

		tracing::debug!(count = submitted.len(), "Waiting for transaction receipts");
		let receipts = self.settle(plan.network_id, &submitted, run).await?;
		check_receipts(&receipts, plan.policy)?;
		Ok(receipts)
	}

	/// Reconciles each broadcast transaction with its own receipt.
	///
	/// Mined transactions are confirmed even when others time out; only
	/// the ones without a receipt are marked failed. Standby write errors
	/// are logged and reported together once every entry was visited.
	async fn settle(
		&self,
		network_id: NetworkId,
		submitted: &[SubmittedTransaction],
		run: &mut FlowRun,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		let hashes: Vec<TransactionHash> = submitted.iter().map(|s| s.hash).collect();
		let results = self.delivery.wait_for_receipts(network_id, &hashes).await;

		let mut receipts = Vec::with_capacity(results.len());
		let mut delivery_error = None;
		let mut standby_errors = Vec::new();
		for (index, (sent, result)) in submitted.iter().zip(results).enumerate() {
			match result {
				Ok(receipt) => {
					tracing::debug!(
						tx_hash = %receipt.hash,
						status = ?receipt.status,
						"Received transaction receipt {} of {}",
						index + 1,
						hashes.len()
					);
					if let Some(tracked) = run.tracked.get_mut(index) {
						tracked.receipt = Some(receipt.clone());
					}
					if let Some(context_id) = &sent.standby_context_id {
						if let Err(e) = self.standby.confirm(context_id, &receipt).await {
							tracing::error!(context_id, error = %e, "Failed to confirm standby transaction");
							standby_errors.push(e);
						}
					}
					receipts.push(receipt);
				},
				Err(e) => {
					tracing::warn!(tx_hash = %sent.hash, error = %e, "No receipt for transaction");
					if let Some(context_id) = &sent.standby_context_id {
						if let Err(err) = self.standby.fail(context_id).await {
							tracing::error!(context_id, error = %err, "Failed to mark standby transaction");
							standby_errors.push(err);
						}
					}
					delivery_error.get_or_insert(e);
				},
			}
		}

		if let Some(e) = delivery_error {
			return Err(e.into());
		}
		let count = standby_errors.len();
		match standby_errors.into_iter().next() {
			Some(first) => Err(FlowError::StandbyUpdate { count, first }),
			None => Ok(receipts),
		}
	}
}

fn check_receipts(receipts: &[TransactionReceipt], policy: ReceiptPolicy) -> Result<(), FlowError> {
	match policy {
		ReceiptPolicy::LastMustSucceed => match receipts.last() {
			Some(last) if !last.is_success() => Err(FlowError::Reverted(last.hash.to_string())),
			_ => Ok(()),
		},
		ReceiptPolicy::AllMustSucceed => {
			match receipts
				.iter()
				.enumerate()
				.find(|(_, receipt)| receipt.status == ReceiptStatus::Reverted)
			{
				Some((index, receipt)) => Err(FlowError::Reverted(format!(
					"transaction {} ({})",
					index + 1,
					receipt.hash
				))),
				None => Ok(()),
			}
		},
	}
}

/// Shared collaborators of the flow handlers.
pub struct FlowContext {
	pub runner: FlowRunner,
	pub tokens: Arc<TokenManager>,
	pub networks: NetworksConfig,
	pub events: EventBus,
	pub analytics: Arc<dyn Analytics>,
	pub haptics: Arc<dyn Haptics>,
	pub jumpstart_relay: Option<Arc<dyn JumpstartRelay>>,
}

impl FlowContext {
	pub(crate) fn dispatch(&self, action: WalletAction) {
		self.events.publish(action).ok();
	}

	pub(crate) fn is_gas_subsidized(&self, network_id: NetworkId) -> bool {
		self.networks
			.get(&network_id)
			.is_some_and(|network| network.gas_subsidized)
	}

	pub(crate) fn jumpstart_contract(&self, network_id: NetworkId) -> Option<Address> {
		self.networks
			.get(&network_id)
			.and_then(|network| network.jumpstart_contract_address)
	}
}

/// Amount approved by `tx` when it is an ERC-20 `approve` on `token`.
pub(crate) fn decode_approval(tx: &PreparedTransaction, token: &TokenInfo) -> Option<U256> {
	if token.address != Some(tx.to) {
		return None;
	}
	IERC20::approveCall::abi_decode(&tx.data)
		.ok()
		.map(|call| call.amount)
}

fn display_amount(raw: U256, decimals: u8) -> Option<f64> {
	format_token_amount(&raw.to_string(), decimals).parse().ok()
}

/// Analytics properties of a tracked transaction and its receipt.
///
/// Fees are in units of the fee currency.
pub(crate) fn tx_receipt_properties(
	tracked: &TrackedTransaction,
	network_id: NetworkId,
	tokens: &TokenManager,
) -> Map<String, Value> {
	let fee_token = tracked
		.tx
		.fee_currency
		.as_ref()
		.and_then(|address| tokens.by_address(network_id, address))
		.or_else(|| tokens.native(network_id));
	let decimals = fee_token.map(|token| token.decimals).unwrap_or(18);

	let mut props = Map::new();
	props.insert("txGas".into(), tracked.tx.gas.into());
	if let Some(fee) = display_amount(tracked.tx.max_gas_fee(), decimals) {
		props.insert("txMaxGasFee".into(), fee.into());
	}
	if let Some(fee) = display_amount(tracked.tx.estimated_gas_fee(), decimals) {
		props.insert("txEstimatedGasFee".into(), fee.into());
	}
	if let Some(token) = fee_token {
		props.insert("txFeeCurrency".into(), token.token_id.clone().into());
		props.insert("txFeeCurrencySymbol".into(), token.symbol.clone().into());
	}
	if let Some(hash) = tracked.hash {
		props.insert("txHash".into(), hash.to_string().into());
	}
	if let Some(receipt) = &tracked.receipt {
		props.insert("txCumulativeGasUsed".into(), receipt.cumulative_gas_used.into());
		props.insert(
			"txEffectiveGasPrice".into(),
			receipt.effective_gas_price.to_string().into(),
		);
		props.insert("txGasUsed".into(), receipt.gas_used.into());
		if let Some(fee) = display_amount(receipt.gas_fee(), decimals) {
			props.insert("txGasFee".into(), fee.into());
		}
	}
	props
}

/// `txGasUsed` becomes `approveTxGasUsed` for prefix `approve`.
pub(crate) fn prefixed(props: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
	props
		.iter()
		.map(|(key, value)| {
			let mut chars = key.chars();
			let capitalized: String = match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect(),
				None => String::new(),
			};
			(format!("{}{}", prefix, capitalized), value.clone())
		})
		.collect()
}

/// Merges `extra` into a JSON object.
pub(crate) fn with_props(base: &Value, extra: Map<String, Value>) -> Value {
	let mut merged = base.as_object().cloned().unwrap_or_default();
	merged.extend(extra);
	Value::Object(merged)
}
