//! Analytics events tracked by the wallet flows.
//!
//! The analytics backend lives outside this workspace; flows only see the
//! [`Analytics`] trait. [`TracingAnalytics`] forwards every event to the
//! `analytics` tracing target so headless runs keep a record.

use serde_json::Value;
use std::sync::Mutex;

/// Names of the analytics events emitted by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsEvent {
	EarnDepositSubmitStart,
	EarnDepositSubmitSuccess,
	EarnDepositSubmitError,
	EarnDepositSubmitCancel,
	EarnDepositExecuteSuccess,
	EarnWithdrawSubmitStart,
	EarnWithdrawSubmitSuccess,
	EarnWithdrawSubmitError,
	EarnWithdrawSubmitCancel,
	JumpstartSendStart,
	JumpstartSendSucceeded,
	JumpstartSendFailed,
	JumpstartSendCancelled,
	JumpstartReclaimStart,
	JumpstartReclaimSucceeded,
	JumpstartReclaimFailed,
	JumpstartReclaimCancelled,
	JumpstartClaimSucceeded,
	JumpstartClaimFailed,
	JumpstartClaimedToken,
	JumpstartClaimedNft,
	GetPincodeStart,
	GetPincodeComplete,
	GetPincodeWithBiometryStart,
	GetPincodeWithBiometryComplete,
	GetPincodeWithBiometryError,
	PinNeverSet,
}

impl AnalyticsEvent {
	/// Wire name of the event.
	pub fn as_str(&self) -> &'static str {
		match self {
			AnalyticsEvent::EarnDepositSubmitStart => "earn_deposit_submit_start",
			AnalyticsEvent::EarnDepositSubmitSuccess => "earn_deposit_submit_success",
			AnalyticsEvent::EarnDepositSubmitError => "earn_deposit_submit_error",
			AnalyticsEvent::EarnDepositSubmitCancel => "earn_deposit_submit_cancel",
			AnalyticsEvent::EarnDepositExecuteSuccess => "earn_deposit_execute_success",
			AnalyticsEvent::EarnWithdrawSubmitStart => "earn_withdraw_submit_start",
			AnalyticsEvent::EarnWithdrawSubmitSuccess => "earn_withdraw_submit_success",
			AnalyticsEvent::EarnWithdrawSubmitError => "earn_withdraw_submit_error",
			AnalyticsEvent::EarnWithdrawSubmitCancel => "earn_withdraw_submit_cancel",
			AnalyticsEvent::JumpstartSendStart => "jumpstart_send_start",
			AnalyticsEvent::JumpstartSendSucceeded => "jumpstart_send_succeeded",
			AnalyticsEvent::JumpstartSendFailed => "jumpstart_send_failed",
			AnalyticsEvent::JumpstartSendCancelled => "jumpstart_send_cancelled",
			AnalyticsEvent::JumpstartReclaimStart => "jumpstart_reclaim_start",
			AnalyticsEvent::JumpstartReclaimSucceeded => "jumpstart_reclaim_succeeded",
			AnalyticsEvent::JumpstartReclaimFailed => "jumpstart_reclaim_failed",
			AnalyticsEvent::JumpstartReclaimCancelled => "jumpstart_reclaim_cancelled",
			AnalyticsEvent::JumpstartClaimSucceeded => "jumpstart_claim_succeeded",
			AnalyticsEvent::JumpstartClaimFailed => "jumpstart_claim_failed",
			AnalyticsEvent::JumpstartClaimedToken => "jumpstart_claimed_token",
			AnalyticsEvent::JumpstartClaimedNft => "jumpstart_claimed_nft",
			AnalyticsEvent::GetPincodeStart => "get_pincode_start",
			AnalyticsEvent::GetPincodeComplete => "get_pincode_complete",
			AnalyticsEvent::GetPincodeWithBiometryStart => "get_pincode_with_biometry_start",
			AnalyticsEvent::GetPincodeWithBiometryComplete => "get_pincode_with_biometry_complete",
			AnalyticsEvent::GetPincodeWithBiometryError => "get_pincode_with_biometry_error",
			AnalyticsEvent::PinNeverSet => "pin_never_set",
		}
	}
}

/// Sink for analytics events.
pub trait Analytics: Send + Sync {
	/// Records an event with its properties (a JSON object or `Null`).
	fn track(&self, event: AnalyticsEvent, properties: Value);
}

/// Analytics sink that logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
	fn track(&self, event: AnalyticsEvent, properties: Value) {
		tracing::info!(
			target: "analytics",
			event = event.as_str(),
			properties = %properties,
			"Tracked analytics event"
		);
	}
}

/// Analytics sink that keeps every event in memory.
///
/// Used by tests and by the CLI to print what a run would have reported.
#[derive(Debug, Default)]
pub struct RecordingAnalytics {
	events: Mutex<Vec<(AnalyticsEvent, Value)>>,
}

impl RecordingAnalytics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of everything tracked so far.
	pub fn events(&self) -> Vec<(AnalyticsEvent, Value)> {
		self.events
			.lock()
			.map(|events| events.clone())
			.unwrap_or_default()
	}

	/// Properties of the first occurrence of `event`.
	pub fn find(&self, event: AnalyticsEvent) -> Option<Value> {
		self.events()
			.into_iter()
			.find(|(tracked, _)| *tracked == event)
			.map(|(_, properties)| properties)
	}

	/// Names of the tracked events in order.
	pub fn names(&self) -> Vec<AnalyticsEvent> {
		self.events().into_iter().map(|(event, _)| event).collect()
	}
}

impl Analytics for RecordingAnalytics {
	fn track(&self, event: AnalyticsEvent, properties: Value) {
		if let Ok(mut events) = self.events.lock() {
			events.push((event, properties));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_recording_analytics_keeps_order() {
		let analytics = RecordingAnalytics::new();
		analytics.track(AnalyticsEvent::JumpstartSendStart, Value::Null);
		analytics.track(
			AnalyticsEvent::JumpstartSendFailed,
			json!({ "networkId": "celo-alfajores" }),
		);

		assert_eq!(
			analytics.names(),
			vec![
				AnalyticsEvent::JumpstartSendStart,
				AnalyticsEvent::JumpstartSendFailed
			]
		);
		assert_eq!(
			analytics.find(AnalyticsEvent::JumpstartSendFailed).unwrap()["networkId"],
			"celo-alfajores"
		);
	}

	#[test]
	fn test_event_names() {
		assert_eq!(
			AnalyticsEvent::EarnDepositSubmitSuccess.as_str(),
			"earn_deposit_submit_success"
		);
		assert_eq!(
			AnalyticsEvent::GetPincodeWithBiometryError.as_str(),
			"get_pincode_with_biometry_error"
		);
	}
}
