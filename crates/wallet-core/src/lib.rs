//! Transaction flow orchestration for the wallet.
//!
//! Coordinates the PIN gate, transaction delivery and the standby registry
//! to run the wallet's multi-transaction flows: earn deposits and
//! withdrawals, and jumpstart link funding, reclaiming and claiming. Each flow is
//! submitted behind a single PIN prompt, recorded optimistically, and
//! settled once every receipt is in.

pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod standby;
pub mod state;
pub mod submitter;
#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BuilderError, HostServices, WalletBuilder, WalletFactories};
pub use engine::token_manager::TokenManager;
pub use engine::{FlowKind, ReconcileReport, WalletEngine};
pub use error::FlowError;
pub use handlers::earn::{
	DepositInfo, DepositMode, EarnPosition, RewardToken, WithdrawInfo, WithdrawMode,
};
pub use handlers::jumpstart::{JumpstartClaimInfo, JumpstartReclaimInfo, JumpstartSendInfo};
pub use standby::StandbyRegistry;
pub use state::{FlowState, FlowStateMachine};
pub use submitter::{no_standby, StandbyConstructor, SubmittedTransaction, TransactionSubmitter};
