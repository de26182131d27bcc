//! Detached `(v, r, s)` signatures.

use alloy_primitives::{Address, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while turning a tuple into a signer address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	/// The recovery id is neither 0/1 nor 27/28.
	#[error("Invalid recovery id: {0}")]
	InvalidRecoveryId(u8),
	/// The curve point could not be recovered.
	#[error("Signature recovery failed: {0}")]
	Recovery(String),
}

/// A secp256k1 signature split into its `v`, `r` and `s` components.
///
/// `v` accepts both the raw parity (`0`/`1`) and the legacy offset form (`27`/`28`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureTuple {
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

impl SignatureTuple {
	pub fn new(v: u8, r: B256, s: B256) -> Self {
		Self { v, r, s }
	}

	/// Converts the tuple into an alloy signature.
	pub fn to_signature(&self) -> Result<Signature, SignatureError> {
		let y_parity = match self.v {
			0 | 27 => false,
			1 | 28 => true,
			other => return Err(SignatureError::InvalidRecoveryId(other)),
		};
		Ok(Signature::new(
			U256::from_be_bytes(self.r.0),
			U256::from_be_bytes(self.s.0),
			y_parity,
		))
	}

	/// Recovers the address that signed `prehash`.
	pub fn recover(&self, prehash: &B256) -> Result<Address, SignatureError> {
		self.to_signature()?
			.recover_address_from_prehash(prehash)
			.map_err(|e| SignatureError::Recovery(e.to_string()))
	}
}

impl From<Signature> for SignatureTuple {
	fn from(signature: Signature) -> Self {
		Self {
			v: 27 + u8::from(signature.v()),
			r: B256::from(signature.r().to_be_bytes::<32>()),
			s: B256::from(signature.s().to_be_bytes::<32>()),
		}
	}
}
