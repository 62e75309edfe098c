//! Rules for choosing a new PIN.

use crate::{PinBlocklist, PinError};
use std::sync::Arc;

pub const PIN_LENGTH: usize = 6;

/// PINs rejected even when the expanded blocklist is disabled.
const DEPRECATED_PIN_BLOCKLIST: [&str; 12] = [
	"000000", "111111", "222222", "333333", "444444", "555555", "666666", "777777", "888888",
	"999999", "123456", "654321",
];

/// Whether `pin` is six digits and not one of the short-list PINs.
pub fn is_pin_valid(pin: &str) -> bool {
	pin.len() == PIN_LENGTH
		&& pin.bytes().all(|b| b.is_ascii_digit())
		&& !DEPRECATED_PIN_BLOCKLIST.contains(&pin)
}

/// Validates PINs chosen by the user.
#[derive(Debug, Clone, Default)]
pub struct PinPolicy {
	blocklist: Option<Arc<PinBlocklist>>,
}

impl PinPolicy {
	/// Policy using only the short list.
	pub fn basic() -> Self {
		Self { blocklist: None }
	}

	/// Policy that also consults `blocklist`.
	pub fn with_blocklist(blocklist: Arc<PinBlocklist>) -> Self {
		Self {
			blocklist: Some(blocklist),
		}
	}

	/// Builds the policy from the `use_expanded_blocklist` switch, loading
	/// the bundled list when enabled.
	pub fn from_settings(use_expanded_blocklist: bool) -> Result<Self, PinError> {
		if use_expanded_blocklist {
			Ok(Self::with_blocklist(Arc::new(PinBlocklist::bundled()?)))
		} else {
			Ok(Self::basic())
		}
	}

	pub fn validate_new_pin(&self, pin: &str) -> Result<(), PinError> {
		if !is_pin_valid(pin) {
			return Err(PinError::InvalidFormat(
				"PIN must be 6 digits and not a trivial sequence".to_string(),
			));
		}
		if let Some(blocklist) = &self.blocklist {
			if blocklist.contains(pin)? {
				return Err(PinError::Blocklisted);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_pin_valid() {
		assert!(is_pin_valid("143826"));
		assert!(is_pin_valid("111555"));
		assert!(!is_pin_valid("123456"));
		assert!(!is_pin_valid("654321"));
		assert!(!is_pin_valid("12345"));
		assert!(!is_pin_valid("12345a"));
	}

	#[test]
	fn test_expanded_policy_uses_blocklist() {
		let basic = PinPolicy::basic();
		let expanded = PinPolicy::from_settings(true).unwrap();

		// Common but not in the short list
		assert!(basic.validate_new_pin("111555").is_ok());
		assert!(matches!(
			expanded.validate_new_pin("111555"),
			Err(PinError::Blocklisted)
		));

		assert!(expanded.validate_new_pin("143826").is_ok());
		assert!(matches!(
			expanded.validate_new_pin("000000"),
			Err(PinError::InvalidFormat(_))
		));
	}
}
