//! Utility functions for hashing, encoding and formatting.

pub mod conversion;
pub mod eip712;
pub mod formatting;

pub use conversion::{address_from_word, parse_address, parse_amount};
pub use eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DOMAIN_TYPE,
	ENCODING_VERSION, NAME_RECOVERY_EXTENSION, NAME_SAFE, RECOVERY_REQUEST_TYPE, SAFE_TX_TYPE,
};
pub use formatting::{truncate_id, without_0x_prefix};
