//! Utility functions for common formatting and conversions.

pub mod formatting;

pub use formatting::format_token_amount;

/// Current Unix time in milliseconds, the unit standby timestamps use.
pub fn current_timestamp_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}
