//! Conversion utilities for addresses, amounts and ABI words.

use super::formatting::without_0x_prefix;
use alloy_primitives::{hex, Address, U256};

/// Parses a 20-byte hex address, with or without "0x" prefix.
pub fn parse_address(value: &str) -> Result<Address, String> {
	let raw = without_0x_prefix(value.trim());
	let bytes = hex::decode(raw).map_err(|e| format!("Invalid hex address '{}': {}", value, e))?;
	if bytes.len() != 20 {
		return Err(format!(
			"Address '{}' must be 20 bytes, got {}",
			value,
			bytes.len()
		));
	}
	Ok(Address::from_slice(&bytes))
}

/// Parses an amount given either in decimal or as 0x-prefixed hex.
pub fn parse_amount(value: &str) -> Result<U256, String> {
	let value = value.trim();
	let parsed = match value.strip_prefix("0x") {
		Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
		None => U256::from_str_radix(value, 10),
	};
	parsed.map_err(|e| format!("Invalid amount '{}': {}", value, e))
}

/// Reads an address from the first 32-byte ABI word of `data`.
pub fn address_from_word(data: &[u8]) -> Option<Address> {
	if data.len() < 32 || data[..12].iter().any(|b| *b != 0) {
		return None;
	}
	Some(Address::from_slice(&data[12..32]))
}
