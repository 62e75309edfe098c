//! Jumpstart link flows: funding the escrow, reclaiming unclaimed funds
//! and claiming a received link.

use super::{decode_approval, FlowContext, FlowPlan, FlowRun, ReceiptPolicy};
use crate::state::FlowState;
use crate::submitter::{no_standby, StandbyConstructor};
use crate::FlowError;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;
use wallet_types::{
	format_token_amount, parse_prepared_transactions, Address, AnalyticsEvent,
	BaseStandbyTransaction, JumpstartAction, NetworkId, NftTransfer, SecretString,
	SerializablePreparedTransaction, StandbyDetails, TokenAmount, TokenInfo, TransactionContext,
	TransactionHash, TransactionReceipt, WalletAction, U256,
};

const TAG: &str = "jumpstart";

sol! {
	interface IWalletJumpstart {
		event ERC20Claimed(address indexed beneficiary, address sentTo, address indexed token, uint256 amount);
		event ERC721Claimed(address indexed beneficiary, address sentTo, address indexed token, uint256 tokenId);
	}

	interface IERC721Metadata {
		function tokenURI(uint256 tokenId) external view returns (string);
	}
}

/// Funds a jumpstart link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpstartSendInfo {
	pub send_token_id: String,
	/// Raw on-chain amount.
	pub send_amount: String,
	pub prepared_transactions: Vec<SerializablePreparedTransaction>,
}

/// Reclaims the funds of an unclaimed jumpstart link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpstartReclaimInfo {
	pub token_amount: TokenAmount,
	pub network_id: NetworkId,
	pub reclaim_tx: SerializablePreparedTransaction,
	pub deposit_tx_hash: String,
}

/// Claims a received jumpstart link into the wallet.
#[derive(Debug, Clone)]
pub struct JumpstartClaimInfo {
	/// Private key carried by the link.
	pub private_key: SecretString,
	pub network_id: NetworkId,
	pub wallet_address: Address,
}

pub struct JumpstartHandler {
	ctx: Arc<FlowContext>,
}

impl JumpstartHandler {
	pub fn new(ctx: Arc<FlowContext>) -> Self {
		Self { ctx }
	}

	/// Deposits into the jumpstart escrow, after an approval when needed.
	#[instrument(skip_all, fields(token = %info.send_token_id))]
	pub async fn send(&self, info: JumpstartSendInfo) -> FlowState {
		let mut run = FlowRun::new();
		let mut props = Value::Null;
		let result = self.submit_send(&info, &mut run, &mut props).await;
		let state = run.conclude(&result);
		let ctx = &self.ctx;

		match result {
			Ok(_) => {
				ctx.analytics
					.track(AnalyticsEvent::JumpstartSendSucceeded, props);
				ctx.dispatch(WalletAction::Jumpstart(
					JumpstartAction::DepositTransactionSucceeded,
				));
			},
			Err(FlowError::MissingTokenInfo(token_id)) => {
				tracing::error!("Token info not found for token id {}", token_id);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::DepositTransactionFailed));
			},
			Err(FlowError::Cancelled) => {
				tracing::info!("Jumpstart transaction cancelled by user");
				ctx.analytics
					.track(AnalyticsEvent::JumpstartSendCancelled, props);
				ctx.dispatch(WalletAction::Jumpstart(
					JumpstartAction::DepositTransactionCancelled,
				));
			},
			Err(e) => {
				tracing::error!(error = %e, "Error sending jumpstart transactions");
				ctx.analytics
					.track(AnalyticsEvent::JumpstartSendFailed, props);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::DepositTransactionFailed));
				if !run.submitted() {
					ctx.haptics.vibrate_error();
				}
			},
		}
		state
	}

	async fn submit_send(
		&self,
		info: &JumpstartSendInfo,
		run: &mut FlowRun,
		props: &mut Value,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		run.begin()?;
		let ctx = &self.ctx;
		let token = ctx
			.tokens
			.get(&info.send_token_id)
			.ok_or_else(|| FlowError::MissingTokenInfo(info.send_token_id.clone()))?;
		let network_id = token.network_id;

		*props = json!({
			"networkId": network_id,
			"tokenAmount": info.send_amount,
			"tokenId": token.token_id,
			"tokenSymbol": token.symbol,
		});

		let transactions = parse_prepared_transactions(&info.prepared_transactions)?;
		if transactions.is_empty() || transactions.len() > 2 {
			return Err(FlowError::Validation(format!(
				"Expected 1 or 2 jumpstart transactions, got {}",
				transactions.len()
			)));
		}
		let escrow = ctx.jumpstart_contract(network_id).ok_or_else(|| {
			FlowError::Validation(format!("No jumpstart contract on {}", network_id))
		})?;

		let mut standby: Vec<StandbyConstructor> = Vec::new();
		if transactions.len() == 2 {
			let approval: StandbyConstructor = match decode_approval(&transactions[0], token) {
				Some(amount) => {
					let approved = format_token_amount(&amount.to_string(), token.decimals);
					let token_id = token.token_id.clone();
					Box::new(move |hash, fee_currency_id| {
						Some(BaseStandbyTransaction {
							context: TransactionContext::new(
								TAG,
								Some("Jumpstart/Approve".into()),
							),
							network_id,
							transaction_hash: Some(hash),
							fee_currency_id,
							details: StandbyDetails::Approval {
								token_id: token_id.clone(),
								approved_amount: Some(approved.clone()),
							},
						})
					})
				},
				None => no_standby(),
			};
			standby.push(approval);
		}

		let amount = TokenAmount::new(
			format_token_amount(&info.send_amount, token.decimals),
			token.token_id.clone(),
		)
		.negated();
		standby.push(Box::new(move |hash, fee_currency_id| {
			Some(BaseStandbyTransaction {
				context: TransactionContext::new(TAG, Some("Jumpstart/Deposit".into())),
				network_id,
				transaction_hash: Some(hash),
				fee_currency_id,
				details: StandbyDetails::Sent {
					amount: amount.clone(),
					address: Some(escrow),
				},
			})
		}));

		ctx.analytics
			.track(AnalyticsEvent::JumpstartSendStart, props.clone());

		let plan = FlowPlan {
			network_id,
			transactions,
			standby,
			gas_subsidized: ctx.is_gas_subsidized(network_id),
			policy: ReceiptPolicy::AllMustSucceed,
		};
		ctx.runner.execute(plan, run).await
	}

	/// Sends the reclaim transaction of an unclaimed link.
	#[instrument(skip_all, fields(network = %info.network_id, deposit_tx = %info.deposit_tx_hash))]
	pub async fn reclaim(&self, info: JumpstartReclaimInfo) -> FlowState {
		let mut run = FlowRun::new();
		let result = self.submit_reclaim(&info, &mut run).await;
		let state = run.conclude(&result);
		let ctx = &self.ctx;

		match result {
			Ok(receipts) => {
				let reclaim_tx_hash = receipts
					.last()
					.map(|receipt| receipt.hash.to_string())
					.unwrap_or_default();
				ctx.analytics.track(
					AnalyticsEvent::JumpstartReclaimSucceeded,
					json!({
						"networkId": info.network_id,
						"depositTxHash": info.deposit_tx_hash,
						"reclaimTxHash": reclaim_tx_hash,
					}),
				);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::ReclaimSucceeded));
			},
			Err(FlowError::Cancelled) => {
				tracing::info!("Jumpstart reclaim cancelled by user");
				ctx.analytics.track(
					AnalyticsEvent::JumpstartReclaimCancelled,
					json!({ "networkId": info.network_id, "depositTxHash": info.deposit_tx_hash }),
				);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::ReclaimCancelled));
			},
			Err(e) => {
				tracing::error!(error = %e, "Error reclaiming jumpstart transaction");
				ctx.analytics.track(
					AnalyticsEvent::JumpstartReclaimFailed,
					json!({ "networkId": info.network_id, "depositTxHash": info.deposit_tx_hash }),
				);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::ReclaimFailed));
				if !run.submitted() {
					ctx.haptics.vibrate_error();
				}
			},
		}
		state
	}

	async fn submit_reclaim(
		&self,
		info: &JumpstartReclaimInfo,
		run: &mut FlowRun,
	) -> Result<Vec<TransactionReceipt>, FlowError> {
		run.begin()?;
		let ctx = &self.ctx;
		let network_id = info.network_id;
		let transactions = parse_prepared_transactions(std::slice::from_ref(&info.reclaim_tx))?;

		ctx.analytics.track(
			AnalyticsEvent::JumpstartReclaimStart,
			json!({ "networkId": network_id, "depositTxHash": info.deposit_tx_hash }),
		);

		let amount = info.token_amount.clone();
		let escrow = ctx.jumpstart_contract(network_id);
		let standby: Vec<StandbyConstructor> = vec![Box::new(move |hash, fee_currency_id| {
			Some(BaseStandbyTransaction {
				context: TransactionContext::new(TAG, Some("Jumpstart/Reclaim".into())),
				network_id,
				transaction_hash: Some(hash),
				fee_currency_id,
				details: StandbyDetails::Received {
					amount: amount.clone(),
					address: escrow,
				},
			})
		})];

		let plan = FlowPlan {
			network_id,
			transactions,
			standby,
			gas_subsidized: ctx.is_gas_subsidized(network_id),
			policy: ReceiptPolicy::LastMustSucceed,
		};
		ctx.runner.execute(plan, run).await
	}
}

impl JumpstartHandler {
	/// Claims a link through the relay, then records what it paid out.
	///
	/// The relay pays for the claim, so there is no PIN prompt. Failing to
	/// record the received funds does not fail the claim.
	#[instrument(skip_all, fields(network = %info.network_id))]
	pub async fn claim(&self, info: JumpstartClaimInfo) -> FlowState {
		let mut run = FlowRun::new();
		let result = self.submit_claim(&info, &mut run).await;
		if let Ok(hashes) = &result {
			if let Err(e) = self.dispatch_pending_transactions(info.network_id, hashes).await {
				tracing::warn!(error = %e, "Error dispatching pending transactions");
			}
		}
		let state = run.conclude(&result);
		let ctx = &self.ctx;

		match result {
			Ok(_) => {
				ctx.analytics
					.track(AnalyticsEvent::JumpstartClaimSucceeded, Value::Null);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::ClaimSucceeded));
			},
			Err(e) => {
				tracing::error!(error = %e, "Error handling jumpstart link");
				ctx.analytics
					.track(AnalyticsEvent::JumpstartClaimFailed, Value::Null);
				ctx.dispatch(WalletAction::Jumpstart(JumpstartAction::ClaimFailed));
			},
		}
		state
	}

	async fn submit_claim(
		&self,
		info: &JumpstartClaimInfo,
		run: &mut FlowRun,
	) -> Result<Vec<TransactionHash>, FlowError> {
		run.begin()?;
		let ctx = &self.ctx;
		let contract = ctx.jumpstart_contract(info.network_id).ok_or_else(|| {
			FlowError::Claim(format!("No jumpstart contract on {}", info.network_id))
		})?;
		let relay = ctx
			.jumpstart_relay
			.as_ref()
			.ok_or_else(|| FlowError::Claim("No jumpstart relay configured".to_string()))?;

		run.machine.transition(FlowState::Submitting)?;
		let hashes = relay
			.claim(&info.private_key, info.network_id, contract, info.wallet_address)
			.await
			.map_err(|e| FlowError::Claim(e.to_string()))?;
		tracing::info!(count = hashes.len(), "Jumpstart claim relayed");

		run.submitted = true;
		run.machine.transition(FlowState::AwaitingReceipt)?;
		Ok(hashes)
	}

	/// Records the tokens and NFTs paid out by the claim transactions.
	///
	/// The relay has already broadcast them, so each entry is settled with
	/// its receipt as soon as it is added.
	async fn dispatch_pending_transactions(
		&self,
		network_id: NetworkId,
		hashes: &[TransactionHash],
	) -> Result<(), FlowError> {
		let results = self
			.ctx
			.runner
			.delivery
			.wait_for_receipts(network_id, hashes)
			.await;

		let mut first_error = None;
		for (hash, result) in hashes.iter().zip(results) {
			match result {
				Ok(receipt) => {
					self.record_claimed_tokens(network_id, &receipt).await?;
					self.record_claimed_nfts(network_id, &receipt).await?;
				},
				Err(e) => {
					tracing::warn!(tx_hash = %hash, error = %e, "No receipt for claim transaction");
					first_error.get_or_insert(e);
				},
			}
		}
		match first_error {
			Some(e) => Err(e.into()),
			None => Ok(()),
		}
	}

	async fn record_claimed_tokens(
		&self,
		network_id: NetworkId,
		receipt: &TransactionReceipt,
	) -> Result<(), FlowError> {
		let ctx = &self.ctx;
		for log in &receipt.logs {
			let Ok(event) =
				IWalletJumpstart::ERC20Claimed::decode_raw_log(log.topics.iter().copied(), &log.data)
			else {
				continue;
			};
			let token_id = TokenInfo::token_id_for(network_id, Some(&event.token));
			let Some(token) = ctx.tokens.get(&token_id) else {
				tracing::warn!(token_id, "Claimed unknown token");
				continue;
			};

			let value = format_token_amount(&event.amount.to_string(), token.decimals);
			self.record_claimed(
				network_id,
				receipt,
				StandbyDetails::Received {
					amount: TokenAmount::new(value.clone(), token_id),
					address: Some(log.address),
				},
			)
			.await?;
			ctx.analytics.track(
				AnalyticsEvent::JumpstartClaimedToken,
				json!({
					"networkId": network_id,
					"tokenAddress": event.token,
					"value": value.parse::<f64>().ok(),
				}),
			);
		}
		Ok(())
	}

	async fn record_claimed_nfts(
		&self,
		network_id: NetworkId,
		receipt: &TransactionReceipt,
	) -> Result<(), FlowError> {
		let ctx = &self.ctx;
		for log in &receipt.logs {
			let Ok(event) =
				IWalletJumpstart::ERC721Claimed::decode_raw_log(log.topics.iter().copied(), &log.data)
			else {
				continue;
			};
			let token_uri = match self.token_uri(network_id, event.token, event.tokenId).await {
				Ok(uri) => uri,
				Err(e) => {
					tracing::warn!(contract = %event.token, error = %e, "Error adding pending NFT transaction");
					continue;
				},
			};

			self.record_claimed(
				network_id,
				receipt,
				StandbyDetails::NftReceived {
					nfts: vec![NftTransfer {
						contract_address: format!("{:#x}", event.token),
						token_id: event.tokenId.to_string(),
						token_uri: Some(token_uri),
					}],
				},
			)
			.await?;
			ctx.analytics.track(
				AnalyticsEvent::JumpstartClaimedNft,
				json!({
					"networkId": network_id,
					"contractAddress": event.token,
					"tokenId": event.tokenId.to_string(),
				}),
			);
		}
		Ok(())
	}

	async fn token_uri(
		&self,
		network_id: NetworkId,
		contract: Address,
		token_id: U256,
	) -> Result<String, FlowError> {
		let data = IERC721Metadata::tokenURICall { tokenId: token_id }.abi_encode();
		let output = self
			.ctx
			.runner
			.delivery
			.call(network_id, contract, data.into())
			.await?;
		IERC721Metadata::tokenURICall::abi_decode_returns(&output)
			.map_err(|e| FlowError::Validation(format!("Invalid tokenURI response: {}", e)))
	}

	async fn record_claimed(
		&self,
		network_id: NetworkId,
		receipt: &TransactionReceipt,
		details: StandbyDetails,
	) -> Result<(), FlowError> {
		let standby = &self.ctx.runner.standby;
		let recorded = standby
			.add(BaseStandbyTransaction {
				context: TransactionContext {
					id: receipt.hash.to_string(),
					tag: TAG.to_string(),
					description: Some("Jumpstart/Claim".into()),
				},
				network_id,
				transaction_hash: Some(receipt.hash),
				fee_currency_id: None,
				details,
			})
			.await?;
		standby.confirm(&recorded.context.id, receipt).await?;
		Ok(())
	}
}
