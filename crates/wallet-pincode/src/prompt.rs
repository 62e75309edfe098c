//! PIN entry.
//!
//! The PIN entry screen belongs to the host application. It is reached
//! through [`PinPrompt`], and dismissing it is reported as
//! [`PromptError::Cancelled`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use wallet_types::{Address, SecretString};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
	#[error("PIN input cancelled")]
	Cancelled,
	#[error("PIN input failed: {0}")]
	Failed(String),
}

/// What the PIN screen is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRequest {
	/// Check the entered PIN before resolving.
	pub with_verification: bool,
	/// Account the PIN is checked against, when not the current one.
	pub account: Option<Address>,
}

#[async_trait]
pub trait PinPrompt: Send + Sync {
	async fn request_pin(&self, request: PinRequest) -> Result<SecretString, PromptError>;
}

/// Prompt answering every request with a fixed PIN, or cancelling when none
/// is configured.
///
/// Used by the CLI, where the PIN comes from an argument or the environment.
pub struct StaticPinPrompt {
	pin: Option<SecretString>,
	requests: AtomicUsize,
}

impl StaticPinPrompt {
	pub fn new(pin: Option<SecretString>) -> Self {
		Self {
			pin,
			requests: AtomicUsize::new(0),
		}
	}

	/// Number of times the PIN was asked for.
	pub fn request_count(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PinPrompt for StaticPinPrompt {
	async fn request_pin(&self, request: PinRequest) -> Result<SecretString, PromptError> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(
			with_verification = request.with_verification,
			"PIN requested"
		);
		self.pin.clone().ok_or(PromptError::Cancelled)
	}
}
