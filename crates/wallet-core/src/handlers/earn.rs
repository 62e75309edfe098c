//! Earn pool deposit and withdraw flows.

use super::{
	decode_approval, prefixed, tx_receipt_properties, with_props, FlowContext, FlowPlan, FlowRun,
	ReceiptPolicy, TrackedTransaction,
};
use crate::engine::token_manager::TokenManager;
use crate::state::FlowState;
use crate::submitter::{no_standby, StandbyConstructor};
use crate::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::instrument;
use wallet_types::{
	format_token_amount, parse_prepared_transactions, AnalyticsEvent, BaseStandbyTransaction,
	EarnAction, NetworkId, SerializablePreparedTransaction, StandbyDetails, SwapLeg, TokenAmount,
	TransactionContext, TransactionReceipt, WalletAction,
};

const TAG: &str = "earn";

/// An earn pool position as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnPosition {
	pub position_id: String,
	/// Id of the app providing the pool.
	pub app_id: String,
	pub app_name: String,
	pub network_id: NetworkId,
	/// Current balance of the position, in deposit token units.
	pub balance: String,
	pub deposit_token_id: String,
	pub withdraw_token_id: String,
	#[serde(default)]
	pub withdrawal_includes_claim: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepositMode {
	Deposit,
	SwapDeposit,
}

impl DepositMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			DepositMode::Deposit => "deposit",
			DepositMode::SwapDeposit => "swap-deposit",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInfo {
	pub pool: EarnPosition,
	pub prepared_transactions: Vec<SerializablePreparedTransaction>,
	/// Amount deposited, in deposit token units.
	pub amount: String,
	pub mode: DepositMode,
	pub from_token_amount: String,
	pub from_token_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawMode {
	Withdraw,
	Exit,
	ClaimRewards,
}

impl WithdrawMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			WithdrawMode::Withdraw => "withdraw",
			WithdrawMode::Exit => "exit",
			WithdrawMode::ClaimRewards => "claim-rewards",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardToken {
	pub token_id: String,
	pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawInfo {
	pub pool: EarnPosition,
	pub prepared_transactions: Vec<SerializablePreparedTransaction>,
	#[serde(default)]
	pub rewards_tokens: Vec<RewardToken>,
	/// Amount to withdraw; the whole balance when absent.
	pub amount: Option<String>,
	pub mode: WithdrawMode,
}

/// Runs earn deposits and withdrawals.
pub struct EarnHandler {
	ctx: Arc<FlowContext>,
}

impl EarnHandler {
	pub fn new(ctx: Arc<FlowContext>) -> Self {
		Self { ctx }
	}

	/// Deposits into an earn pool, optionally after an approval and a swap.
	///
	/// Decided by the receipt of the last transaction.
	#[instrument(skip_all, fields(pool = %info.pool.position_id, mode = info.mode.as_str()))]
	pub async fn deposit(&self, info: DepositInfo) -> FlowState {
		let mut run = FlowRun::new();
		let mut props = Value::Null;
		let result = self.submit_deposit(&info, &mut run, &mut props).await;
		let state = run.conclude(&result);
		let ctx = &self.ctx;

		match result {
			Ok(receipts) => {
				let receipt_props =
					deposit_receipt_properties(run.tracked(), info.pool.network_id, &ctx.tokens);
				ctx.analytics.track(
					AnalyticsEvent::EarnDepositSubmitSuccess,
					with_props(&props, receipt_props),
				);
				if self.from_network(&info) == info.pool.network_id {
					// Cross-chain deposits execute later, on the destination chain
					ctx.analytics
						.track(AnalyticsEvent::EarnDepositExecuteSuccess, props.clone());
				}
				if let Some(last) = receipts.last() {
					ctx.dispatch(WalletAction::Earn(EarnAction::DepositSuccess {
						token_id: info.pool.deposit_token_id.clone(),
						network_id: info.pool.network_id,
						transaction_hash: last.hash,
					}));
				}
			},
			Err(FlowError::MissingTokenInfo(ids)) => {
				tracing::error!("Token info not found for token ids {}", ids);
				ctx.dispatch(WalletAction::Earn(EarnAction::DepositError));
			},
			Err(FlowError::Cancelled) => {
				tracing::info!("Transaction cancelled by user");
				ctx.dispatch(WalletAction::Earn(EarnAction::DepositCancel));
				ctx.analytics
					.track(AnalyticsEvent::EarnDepositSubmitCancel, props);
			},
			Err(e) => {
				tracing::error!(error = %e, "Error sending deposit transaction");
				ctx.dispatch(WalletAction::Earn(EarnAction::DepositError));
				let mut extra =
					deposit_receipt_properties(run.tracked(), info.pool.network_id, &ctx.tokens);
				extra.insert("error".into(), e.to_string().into());
				ctx.analytics
					.track(AnalyticsEvent::EarnDepositSubmitError, with_props(&props, extra));
				// The user may be elsewhere in the app once transactions are out
				if !run.submitted() {
					ctx.haptics.vibrate_error();
				}
			},
		}
		state
	}

	fn from_network(&self, info: &DepositInfo) -> NetworkId {
		self.ctx
			.tokens
			.get(&info.from_token_id)
			.map(|token| token.network_id)
			.unwrap_or(info.pool.network_id)
	}

	async fn submit_deposit(
		&self,
		info: &DepositInfo,
		run: &mut FlowRun,
		props: &mut Value,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		run.begin()?;
		let ctx = &self.ctx;
		let pool = &info.pool;

		let (Some(_), Some(from_token)) = (
			ctx.tokens.get(&pool.deposit_token_id),
			ctx.tokens.get(&info.from_token_id),
		) else {
			return Err(FlowError::MissingTokenInfo(format!(
				"{} and/or {}",
				pool.deposit_token_id, info.from_token_id
			)));
		};
		let from_network = from_token.network_id;
		let cross_chain = from_network != pool.network_id;

		*props = json!({
			"depositTokenId": pool.deposit_token_id,
			"depositTokenAmount": info.amount,
			"networkId": pool.network_id,
			"providerId": pool.app_id,
			"poolId": pool.position_id,
			"fromTokenAmount": info.from_token_amount,
			"fromTokenId": info.from_token_id,
			"fromNetworkId": from_network,
			"mode": info.mode.as_str(),
		});
		if info.mode == DepositMode::SwapDeposit {
			let swap_type = if cross_chain { "cross-chain" } else { "same-chain" };
			*props = with_props(props, Map::from_iter([("swapType".to_string(), Value::from(swap_type))]));
		}

		let transactions = parse_prepared_transactions(&info.prepared_transactions)?;
		tracing::debug!(
			"Starting {} with token {}, total transactions: {}",
			info.mode.as_str(),
			info.from_token_id,
			transactions.len()
		);

		let mut standby: Vec<StandbyConstructor> = Vec::new();
		if transactions.len() <= 2 {
			if transactions.len() > 1 {
				match decode_approval(&transactions[0], from_token) {
					Some(amount) => {
						tracing::debug!("First transaction is an approval transaction");
						let approved = format_token_amount(&amount.to_string(), from_token.decimals);
						let token_id = from_token.token_id.clone();
						standby.push(Box::new(move |hash, fee_currency_id| {
							Some(BaseStandbyTransaction {
								context: TransactionContext::new(TAG, Some("Earn/Approve".into())),
								network_id: from_network,
								transaction_hash: Some(hash),
								fee_currency_id,
								details: StandbyDetails::Approval {
									token_id: token_id.clone(),
									approved_amount: Some(approved.clone()),
								},
							})
						}));
					},
					None => {
						tracing::info!(
							"First transaction is not an expected approval transaction, using empty standby handler"
						);
						standby.push(no_standby());
					},
				}
			}
			standby.push(deposit_standby(info, from_network, cross_chain));
		} else {
			tracing::info!("More than 2 deposit transactions, using empty standby handlers");
			standby.extend(transactions.iter().map(|_| no_standby()));
		}

		ctx.analytics
			.track(AnalyticsEvent::EarnDepositSubmitStart, props.clone());

		let plan = FlowPlan {
			network_id: from_network,
			transactions,
			standby,
			gas_subsidized: ctx.is_gas_subsidized(from_network),
			policy: ReceiptPolicy::LastMustSucceed,
		};
		ctx.runner.execute(plan, run).await
	}

	/// Withdraws from an earn pool and/or claims its rewards.
	///
	/// Every receipt must succeed.
	#[instrument(skip_all, fields(pool = %info.pool.position_id, mode = info.mode.as_str()))]
	pub async fn withdraw(&self, info: WithdrawInfo) -> FlowState {
		let mut run = FlowRun::new();
		let mut props = Value::Null;
		let result = self.submit_withdraw(&info, &mut run, &mut props).await;
		let state = run.conclude(&result);
		let ctx = &self.ctx;
		let mode = info.mode.as_str();

		match result {
			Ok(_) => {
				ctx.dispatch(WalletAction::Earn(EarnAction::WithdrawSuccess));
				ctx.analytics
					.track(AnalyticsEvent::EarnWithdrawSubmitSuccess, props);
			},
			Err(FlowError::MissingTokenInfo(token_id)) => {
				tracing::error!(mode, "Token info not found for token id {}", token_id);
				ctx.dispatch(WalletAction::Earn(EarnAction::WithdrawError));
			},
			Err(FlowError::Cancelled) => {
				tracing::info!(mode, "Transaction(s) cancelled by user");
				ctx.dispatch(WalletAction::Earn(EarnAction::WithdrawCancel));
				ctx.analytics
					.track(AnalyticsEvent::EarnWithdrawSubmitCancel, props);
			},
			Err(e) => {
				tracing::error!(mode, error = %e, "Error sending {} transaction(s)", mode);
				ctx.dispatch(WalletAction::Earn(EarnAction::WithdrawError));
				let extra = Map::from_iter([("error".to_string(), Value::from(e.to_string()))]);
				ctx.analytics
					.track(AnalyticsEvent::EarnWithdrawSubmitError, with_props(&props, extra));
				if !run.submitted() {
					ctx.haptics.vibrate_error();
				}
			},
		}
		state
	}

	async fn submit_withdraw(
		&self,
		info: &WithdrawInfo,
		run: &mut FlowRun,
		props: &mut Value,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		run.begin()?;
		let ctx = &self.ctx;
		let pool = &info.pool;
		let token_id = pool.deposit_token_id.clone();

		let token = ctx
			.tokens
			.get(&token_id)
			.ok_or_else(|| FlowError::MissingTokenInfo(token_id.clone()))?;
		let network_id = token.network_id;
		let amount = info.amount.clone().unwrap_or_else(|| pool.balance.clone());

		*props = json!({
			"depositTokenId": token_id,
			"networkId": network_id,
			"poolId": pool.position_id,
			"providerId": pool.app_id,
			"rewards": info
				.rewards_tokens
				.iter()
				.map(|reward| json!({ "tokenId": reward.token_id, "amount": reward.balance }))
				.collect::<Vec<_>>(),
			"mode": info.mode.as_str(),
		});
		if info.mode != WithdrawMode::ClaimRewards {
			*props = with_props(props, Map::from_iter([("tokenAmount".to_string(), Value::from(amount.clone()))]));
		}

		let transactions = parse_prepared_transactions(&info.prepared_transactions)?;
		tracing::debug!(
			"Starting {} for token {}, total transactions: {}",
			info.mode.as_str(),
			token_id,
			transactions.len()
		);

		let mut standby: Vec<StandbyConstructor> = Vec::new();
		if info.mode != WithdrawMode::ClaimRewards {
			let provider_id = pool.app_id.clone();
			let withdraw_token_id = pool.withdraw_token_id.clone();
			let token_id = token_id.clone();
			standby.push(Box::new(move |hash, fee_currency_id| {
				Some(BaseStandbyTransaction {
					context: TransactionContext::new(TAG, Some("Earn/Withdraw".into())),
					network_id,
					transaction_hash: Some(hash),
					fee_currency_id,
					details: StandbyDetails::EarnWithdraw {
						in_amount: TokenAmount::new(amount.clone(), token_id.clone()),
						out_amount: TokenAmount::new(amount.clone(), withdraw_token_id.clone()),
						provider_id: provider_id.clone(),
					},
				})
			}));
		}
		if info.mode == WithdrawMode::ClaimRewards || !pool.withdrawal_includes_claim {
			for (index, reward) in info.rewards_tokens.iter().enumerate() {
				let provider_id = pool.app_id.clone();
				let reward = reward.clone();
				standby.push(Box::new(move |hash, fee_currency_id| {
					Some(BaseStandbyTransaction {
						context: TransactionContext::new(
							TAG,
							Some(format!("Earn/ClaimReward-{}", index + 1)),
						),
						network_id,
						transaction_hash: Some(hash),
						fee_currency_id,
						details: StandbyDetails::EarnClaimReward {
							amount: TokenAmount::new(reward.balance.clone(), reward.token_id.clone()),
							provider_id: provider_id.clone(),
						},
					})
				}));
			}
		}

		ctx.analytics
			.track(AnalyticsEvent::EarnWithdrawSubmitStart, props.clone());

		let plan = FlowPlan {
			network_id,
			transactions,
			standby,
			gas_subsidized: ctx.is_gas_subsidized(network_id),
			policy: ReceiptPolicy::AllMustSucceed,
		};
		ctx.runner.execute(plan, run).await
	}
}

fn deposit_standby(info: &DepositInfo, from_network: NetworkId, cross_chain: bool) -> StandbyConstructor {
	let pool = &info.pool;
	let in_amount = TokenAmount::new(info.amount.clone(), pool.withdraw_token_id.clone());
	let out_amount = TokenAmount::new(info.amount.clone(), pool.deposit_token_id.clone());
	let swap = (info.mode == DepositMode::SwapDeposit).then(|| SwapLeg {
		in_amount: TokenAmount::new(info.amount.clone(), pool.deposit_token_id.clone()),
		out_amount: TokenAmount::new(info.from_token_amount.clone(), info.from_token_id.clone()),
	});
	let app_name = pool.app_name.clone();

	Box::new(move |hash, fee_currency_id| {
		let details = match (&swap, cross_chain) {
			(Some(swap), true) => StandbyDetails::CrossChainDeposit {
				in_amount: in_amount.clone(),
				out_amount: out_amount.clone(),
				app_name: app_name.clone(),
				swap: swap.clone(),
			},
			_ => StandbyDetails::EarnDeposit {
				in_amount: in_amount.clone(),
				out_amount: out_amount.clone(),
				app_name: app_name.clone(),
				swap: swap.clone(),
			},
		};
		Some(BaseStandbyTransaction {
			context: TransactionContext::new(TAG, Some("Earn/Deposit".into())),
			network_id: from_network,
			transaction_hash: Some(hash),
			fee_currency_id,
			details,
		})
	})
}

/// Receipt properties of a deposit: the first of two transactions is the
/// approval, the last one the deposit. Gas totals cover all transactions.
fn deposit_receipt_properties(
	tracked: &[TrackedTransaction],
	network_id: NetworkId,
	tokens: &TokenManager,
) -> Map<String, Value> {
	let txs: Vec<Map<String, Value>> = tracked
		.iter()
		.map(|t| tx_receipt_properties(t, network_id, tokens))
		.collect();

	let mut props = Map::new();
	if txs.len() > 1 {
		props.extend(prefixed(&txs[0], "approve"));
	}
	let Some(deposit) = txs.last() else {
		return props;
	};
	props.extend(prefixed(deposit, "deposit"));

	if deposit.contains_key("txGasUsed") {
		let gas_used: u64 = txs
			.iter()
			.filter_map(|tx| tx.get("txGasUsed").and_then(Value::as_u64))
			.sum();
		props.insert("gasUsed".into(), gas_used.into());
	}
	if deposit.contains_key("txGasFee") {
		let gas_fee: f64 = txs
			.iter()
			.filter_map(|tx| tx.get("txGasFee").and_then(Value::as_f64))
			.sum();
		props.insert("gasFee".into(), gas_fee.into());
	}
	props
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{approve_data, harness, serialized, CUSD, POOL_TOKEN};
	use wallet_pincode::testing::ScriptedPrompt;
	use wallet_types::{
		ReceiptStatus, TokenTransactionType, TransactionStatus, TransactionsAction,
	};

	fn pool() -> EarnPosition {
		EarnPosition {
			position_id: "aave-v3:celo-alfajores:pool".to_string(),
			app_id: "aave".to_string(),
			app_name: "Aave".to_string(),
			network_id: NetworkId::CeloAlfajores,
			balance: "12".to_string(),
			deposit_token_id: format!("celo-alfajores:{:#x}", CUSD),
			withdraw_token_id: format!("celo-alfajores:{:#x}", POOL_TOKEN),
			withdrawal_includes_claim: false,
		}
	}

	fn deposit_info(transactions: Vec<SerializablePreparedTransaction>) -> DepositInfo {
		DepositInfo {
			pool: pool(),
			prepared_transactions: transactions,
			amount: "100".to_string(),
			mode: DepositMode::Deposit,
			from_token_amount: "100".to_string(),
			from_token_id: format!("celo-alfajores:{:#x}", CUSD),
		}
	}

	#[tokio::test]
	async fn test_deposit_with_approval_succeeds() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery
			.queue_outcome(ReceiptStatus::Success)
			.queue_outcome(ReceiptStatus::Success);

		let info = deposit_info(vec![
			serialized(CUSD, &approve_data(100)),
			serialized(POOL_TOKEN, "0x1234"),
		]);
		let state = h.engine.earn().deposit(info).await;

		assert_eq!(state, FlowState::Succeeded);
		let standby = h.engine.standby().all().await;
		assert_eq!(standby.len(), 2);
		assert_eq!(standby[0].kind(), TokenTransactionType::Approval);
		assert_eq!(
			standby[0].details,
			StandbyDetails::Approval {
				token_id: format!("celo-alfajores:{:#x}", CUSD),
				approved_amount: Some("0.0000000000000001".to_string()),
			}
		);
		assert_eq!(standby[1].kind(), TokenTransactionType::EarnDeposit);
		assert!(standby
			.iter()
			.all(|tx| tx.status == TransactionStatus::Complete));

		let actions = h.drain_actions();
		assert!(actions.contains(&WalletAction::Earn(EarnAction::DepositSuccess {
			token_id: pool().deposit_token_id,
			network_id: NetworkId::CeloAlfajores,
			transaction_hash: h.hash(1),
		})));

		let success = h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitSuccess)
			.unwrap();
		assert_eq!(success["approveTxGasUsed"], 50_000);
		assert_eq!(success["depositTxHash"], h.hash(1).to_string());
		assert_eq!(success["gasUsed"], 100_000);
		assert!(h
			.analytics
			.find(AnalyticsEvent::EarnDepositExecuteSuccess)
			.is_some());
		assert_eq!(h.device.home_count(), 1);
	}

	#[tokio::test]
	async fn test_deposit_reverted_last_receipt() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery
			.queue_outcome(ReceiptStatus::Success)
			.queue_outcome(ReceiptStatus::Reverted);

		let info = deposit_info(vec![
			serialized(CUSD, &approve_data(100)),
			serialized(POOL_TOKEN, "0x1234"),
		]);
		let state = h.engine.earn().deposit(info).await;
		assert_eq!(state, FlowState::Failed);

		let actions = h.drain_actions();
		let added: Vec<_> = actions
			.iter()
			.filter_map(|action| match action {
				WalletAction::Transactions(TransactionsAction::StandbyAdded { transaction }) => {
					transaction.transaction_hash
				},
				_ => None,
			})
			.collect();
		assert_eq!(added, vec![h.hash(0), h.hash(1)]);
		assert!(actions.contains(&WalletAction::Earn(EarnAction::DepositError)));
		assert!(!actions
			.iter()
			.any(|a| matches!(a, WalletAction::Earn(EarnAction::DepositSuccess { .. }))));

		let error = h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitError)
			.unwrap();
		assert!(error["error"].as_str().unwrap().contains("reverted"));
		assert_eq!(error["depositTxHash"], h.hash(1).to_string());
		assert!(h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitSuccess)
			.is_none());

		// Already broadcast, so no haptic feedback
		assert_eq!(h.device.vibration_count(), 0);
		let standby = h.engine.standby().all().await;
		assert_eq!(standby[1].status, TransactionStatus::Failed);
	}

	#[tokio::test]
	async fn test_deposit_cancelled_pin() {
		let mut h = harness(ScriptedPrompt::cancelling()).await;

		let info = deposit_info(vec![serialized(POOL_TOKEN, "0x1234")]);
		let state = h.engine.earn().deposit(info).await;

		assert_eq!(state, FlowState::Cancelled);
		assert_eq!(
			h.drain_actions()
				.into_iter()
				.filter(|a| matches!(a, WalletAction::Earn(_)))
				.collect::<Vec<_>>(),
			vec![WalletAction::Earn(EarnAction::DepositCancel)]
		);
		assert_eq!(
			h.analytics.names().last(),
			Some(&AnalyticsEvent::EarnDepositSubmitCancel)
		);
		assert!(h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitError)
			.is_none());
		assert_eq!(h.device.vibration_count(), 0);
		assert!(h.delivery.sent().is_empty());
	}

	#[tokio::test]
	async fn test_deposit_missing_token_info() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;

		let mut info = deposit_info(vec![serialized(POOL_TOKEN, "0x1234")]);
		info.from_token_id = "celo-alfajores:0xunknown".to_string();
		let state = h.engine.earn().deposit(info).await;

		assert_eq!(state, FlowState::Failed);
		assert_eq!(
			h.drain_actions(),
			vec![WalletAction::Earn(EarnAction::DepositError)]
		);
		assert!(h.analytics.names().is_empty());
		assert_eq!(h.prompt.request_count(), 0);
	}

	#[tokio::test]
	async fn test_deposit_send_failure_vibrates() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery.fail_sends("nonce too low");

		let info = deposit_info(vec![serialized(POOL_TOKEN, "0x1234")]);
		assert_eq!(h.engine.earn().deposit(info).await, FlowState::Failed);

		assert_eq!(h.device.vibration_count(), 1);
		assert_eq!(h.device.home_count(), 0);
		assert!(h.drain_actions().contains(&WalletAction::Earn(EarnAction::DepositError)));
	}

	#[tokio::test]
	async fn test_cross_chain_swap_deposit() {
		let h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery.queue_outcome(ReceiptStatus::Success);

		let mut info = deposit_info(vec![serialized(POOL_TOKEN, "0x1234")]);
		info.mode = DepositMode::SwapDeposit;
		info.pool.network_id = NetworkId::ArbitrumSepolia;
		info.from_token_amount = "0.5".to_string();
		let state = h.engine.earn().deposit(info).await;

		assert_eq!(state, FlowState::Succeeded);
		let standby = h.engine.standby().all().await;
		assert_eq!(standby.len(), 1);
		assert_eq!(standby[0].network_id, NetworkId::CeloAlfajores);
		assert_eq!(
			standby[0].kind(),
			TokenTransactionType::CrossChainSwapTransaction
		);
		let start = h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitStart)
			.unwrap();
		assert_eq!(start["swapType"], "cross-chain");
		assert!(h
			.analytics
			.find(AnalyticsEvent::EarnDepositExecuteSuccess)
			.is_none());

		match &standby[0].details {
			StandbyDetails::CrossChainDeposit { app_name, .. } => assert_eq!(app_name, "Aave"),
			other => panic!("unexpected details {:?}", other),
		}
		// Fee tokens are looked up on the pool network, which has none here
		let success = h
			.analytics
			.find(AnalyticsEvent::EarnDepositSubmitSuccess)
			.unwrap();
		assert!(success.get("depositTxFeeCurrency").is_none());
		assert!(success.get("depositTxHash").is_some());
	}

	#[tokio::test]
	async fn test_many_deposit_transactions_have_no_standby() {
		let h = harness(ScriptedPrompt::answering("143826")).await;
		for _ in 0..3 {
			h.delivery.queue_outcome(ReceiptStatus::Success);
		}

		let info = deposit_info(vec![
			serialized(CUSD, &approve_data(1)),
			serialized(POOL_TOKEN, "0x01"),
			serialized(POOL_TOKEN, "0x02"),
		]);
		assert_eq!(h.engine.earn().deposit(info).await, FlowState::Succeeded);
		assert!(h.engine.standby().all().await.is_empty());
	}

	#[tokio::test]
	async fn test_withdraw_claims_rewards_separately() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery
			.queue_outcome(ReceiptStatus::Success)
			.queue_outcome(ReceiptStatus::Success);

		let info = WithdrawInfo {
			pool: pool(),
			prepared_transactions: vec![
				serialized(POOL_TOKEN, "0x01"),
				serialized(POOL_TOKEN, "0x02"),
			],
			rewards_tokens: vec![RewardToken {
				token_id: "celo-alfajores:native".to_string(),
				balance: "0.3".to_string(),
			}],
			amount: None,
			mode: WithdrawMode::Withdraw,
		};
		assert_eq!(h.engine.earn().withdraw(info).await, FlowState::Succeeded);

		let kinds: Vec<_> = h
			.engine
			.standby()
			.all()
			.await
			.iter()
			.map(|tx| tx.kind())
			.collect();
		assert_eq!(
			kinds,
			vec![
				TokenTransactionType::EarnWithdraw,
				TokenTransactionType::EarnClaimReward
			]
		);
		assert!(h.drain_actions().contains(&WalletAction::Earn(EarnAction::WithdrawSuccess)));
		let success = h
			.analytics
			.find(AnalyticsEvent::EarnWithdrawSubmitSuccess)
			.unwrap();
		assert_eq!(success["tokenAmount"], "12");
	}

	#[tokio::test]
	async fn test_withdraw_fails_on_any_revert() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;
		h.delivery
			.queue_outcome(ReceiptStatus::Reverted)
			.queue_outcome(ReceiptStatus::Success);

		let info = WithdrawInfo {
			pool: pool(),
			prepared_transactions: vec![
				serialized(POOL_TOKEN, "0x01"),
				serialized(POOL_TOKEN, "0x02"),
			],
			rewards_tokens: vec![RewardToken {
				token_id: "celo-alfajores:native".to_string(),
				balance: "0.3".to_string(),
			}],
			amount: Some("3".to_string()),
			mode: WithdrawMode::Exit,
		};
		assert_eq!(h.engine.earn().withdraw(info).await, FlowState::Failed);

		assert!(h.drain_actions().contains(&WalletAction::Earn(EarnAction::WithdrawError)));
		let error = h
			.analytics
			.find(AnalyticsEvent::EarnWithdrawSubmitError)
			.unwrap();
		assert!(error["error"].as_str().unwrap().contains("transaction 1"));
		assert_eq!(error["tokenAmount"], "3");
		assert_eq!(h.device.vibration_count(), 0);
		let statuses: Vec<_> = h
			.engine
			.standby()
			.all()
			.await
			.iter()
			.map(|tx| tx.status)
			.collect();
		assert_eq!(
			statuses,
			vec![TransactionStatus::Failed, TransactionStatus::Complete]
		);
	}

	#[tokio::test]
	async fn test_claim_rewards_without_reward_tokens_is_rejected() {
		let mut h = harness(ScriptedPrompt::answering("143826")).await;

		let info = WithdrawInfo {
			pool: pool(),
			prepared_transactions: vec![serialized(POOL_TOKEN, "0x01")],
			rewards_tokens: vec![],
			amount: None,
			mode: WithdrawMode::ClaimRewards,
		};
		assert_eq!(h.engine.earn().withdraw(info).await, FlowState::Failed);

		assert!(h.drain_actions().contains(&WalletAction::Earn(EarnAction::WithdrawError)));
		let error = h
			.analytics
			.find(AnalyticsEvent::EarnWithdrawSubmitError)
			.unwrap();
		assert!(error["error"].as_str().unwrap().contains("Mismatch"));
		assert!(error.get("tokenAmount").is_none());
		assert_eq!(h.device.vibration_count(), 1);
		assert!(h.delivery.sent().is_empty());
	}
}
