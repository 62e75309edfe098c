//! Broadcasting of prepared transactions.
//!
//! The submitter is the PIN gate of every flow: it obtains the account
//! password (which may prompt the user and may be cancelled), unlocks the
//! account, and only then broadcasts. Each broadcast hash is handed to the
//! flow's standby constructor and recorded in the standby registry.

use crate::engine::token_manager::TokenManager;
use crate::standby::StandbyRegistry;
use crate::FlowError;
use std::sync::Arc;
use tracing::instrument;
use wallet_delivery::DeliveryService;
use wallet_pincode::PasswordService;
use wallet_types::{
	Address, BaseStandbyTransaction, NetworkId, PreparedTransaction, TransactionHash,
};

/// Builds the standby record of a broadcast transaction from its hash and
/// fee currency id. Returns `None` when the transaction gets no record.
pub type StandbyConstructor =
	Box<dyn Fn(TransactionHash, Option<String>) -> Option<BaseStandbyTransaction> + Send + Sync>;

/// Constructor for transactions that are not shown as standby.
pub fn no_standby() -> StandbyConstructor {
	Box::new(|_, _| None)
}

/// A broadcast transaction and the context id of its standby record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
	pub hash: TransactionHash,
	pub standby_context_id: Option<String>,
}

pub struct TransactionSubmitter {
	account: Address,
	passwords: Arc<PasswordService>,
	delivery: Arc<DeliveryService>,
	standby: Arc<StandbyRegistry>,
	tokens: Arc<TokenManager>,
}

impl TransactionSubmitter {
	pub fn new(
		account: Address,
		passwords: Arc<PasswordService>,
		delivery: Arc<DeliveryService>,
		standby: Arc<StandbyRegistry>,
		tokens: Arc<TokenManager>,
	) -> Self {
		Self {
			account,
			passwords,
			delivery,
			standby,
			tokens,
		}
	}

	pub fn account(&self) -> Address {
		self.account
	}

	/// Unlocks the account and broadcasts `transactions` in order.
	///
	/// Every broadcast is appended to `submitted` as soon as its hash is
	/// known, so callers still see what went out when a later step fails.
	/// On gas-subsidized networks no fee currency id is recorded.
	#[instrument(skip_all, fields(network = %network_id, count = transactions.len()))]
	pub async fn send_prepared_transactions(
		&self,
		transactions: &[PreparedTransaction],
		network_id: NetworkId,
		standby: &[StandbyConstructor],
		gas_subsidized: bool,
		submitted: &mut Vec<SubmittedTransaction>,
	) -> Result<(), FlowError> {
		if transactions.len() != standby.len() {
			return Err(FlowError::Validation(format!(
				"Mismatch in number of prepared transactions ({}) and standby transaction creators ({})",
				transactions.len(),
				standby.len()
			)));
		}

		let password = self
			.passwords
			.get_password_for_flow(self.account, true, false)
			.await?;
		if !self
			.passwords
			.ensure_correct_password(&password, &self.account)
			.await
		{
			return Err(FlowError::AccountLocked(self.account));
		}

		for (index, (tx, create_standby)) in transactions.iter().zip(standby).enumerate() {
			let fee_currency_id = if gas_subsidized {
				None
			} else {
				self.tokens
					.fee_currency_id(network_id, tx.fee_currency.as_ref())
			};

			let hash = self.delivery.send_transaction(network_id, tx).await?;
			tracing::info!(tx_hash = %hash, index, "Broadcast transaction");
			submitted.push(SubmittedTransaction {
				hash,
				standby_context_id: None,
			});

			if let Some(base) = create_standby(hash, fee_currency_id) {
				let recorded = self.standby.add(base).await?;
				if let Some(last) = submitted.last_mut() {
					last.standby_context_id = Some(recorded.context.id);
				}
			}
		}

		Ok(())
	}
}
