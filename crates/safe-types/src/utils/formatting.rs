//! String formatting utilities for log output.

/// Truncates a hex string for display purposes.
///
/// Shows only the first 10 characters (including any `0x` prefix) followed by
/// ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Removes "0x" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x1234"), "0x1234");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
	}

	#[test]
	fn test_without_prefix() {
		assert_eq!(without_0x_prefix("0xabc"), "abc");
		assert_eq!(without_0x_prefix("0Xabc"), "abc");
		assert_eq!(without_0x_prefix("abc"), "abc");
	}
}
