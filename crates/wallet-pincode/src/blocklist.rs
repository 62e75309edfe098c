//! Blocklist of weak 6-digit PINs.
//!
//! The bundled list holds the PINs most often chosen by people, packed as
//! sorted 3-byte big-endian integers and base64-encoded. Membership is a
//! binary search over the packed bytes, so the list is never expanded in
//! memory.

use crate::PinError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::cmp::Ordering;

const BUNDLED_BLOCKLIST: &str = include_str!("../data/pin_blocklist.b64");

/// Width of one packed PIN.
const RECORD_LEN: usize = 3;

/// Number of distinct 6-digit PINs.
pub const PIN_SPACE: u32 = 1_000_000;

#[derive(Debug, Clone)]
pub struct PinBlocklist {
	buffer: Vec<u8>,
}

impl PinBlocklist {
	/// Loads the blocklist bundled with this crate.
	pub fn bundled() -> Result<Self, PinError> {
		Self::from_base64(BUNDLED_BLOCKLIST)
	}

	/// Decodes a base64 blocklist. Surrounding whitespace is ignored.
	pub fn from_base64(encoded: &str) -> Result<Self, PinError> {
		let buffer = STANDARD
			.decode(encoded.trim())
			.map_err(|e| PinError::MalformedBlocklist(format!("invalid base64: {}", e)))?;
		Self::from_bytes(buffer)
	}

	/// Wraps packed records. The records must already be sorted.
	pub fn from_bytes(buffer: Vec<u8>) -> Result<Self, PinError> {
		if buffer.len() % RECORD_LEN != 0 {
			return Err(PinError::MalformedBlocklist(format!(
				"length {} is not a multiple of {}",
				buffer.len(),
				RECORD_LEN
			)));
		}
		Ok(Self { buffer })
	}

	/// Number of PINs in the list.
	pub fn size(&self) -> usize {
		self.buffer.len() / RECORD_LEN
	}

	/// Whether `pin` is in the list.
	///
	/// Fails with [`PinError::InvalidFormat`] unless `pin` is exactly six
	/// ASCII digits.
	pub fn contains(&self, pin: &str) -> Result<bool, PinError> {
		let target = parse_pin(pin)?;
		Ok(search(&self.buffer, target))
	}
}

fn parse_pin(pin: &str) -> Result<u32, PinError> {
	if pin.len() != 6 || !pin.bytes().all(|b| b.is_ascii_digit()) {
		return Err(PinError::InvalidFormat(
			"PIN must be exactly 6 digits".to_string(),
		));
	}
	let value: u32 = pin
		.parse()
		.map_err(|_| PinError::InvalidFormat("PIN is not a number".to_string()))?;
	if value >= PIN_SPACE {
		return Err(PinError::InvalidFormat(format!(
			"PIN must be below {}",
			PIN_SPACE
		)));
	}
	Ok(value)
}

/// Binary search over packed records, halving at the middle record.
fn search(records: &[u8], target: u32) -> bool {
	if records.is_empty() {
		return false;
	}

	let mid = (records.len() / RECORD_LEN / 2) * RECORD_LEN;
	let pivot = u32::from_be_bytes([0, records[mid], records[mid + 1], records[mid + 2]]);

	match target.cmp(&pivot) {
		Ordering::Equal => true,
		Ordering::Less => search(&records[..mid], target),
		Ordering::Greater => search(&records[mid + RECORD_LEN..], target),
	}
}
