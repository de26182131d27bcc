//! Owner-quorum signature verification.

use crate::{OwnerSet, SafeError};
use alloy_primitives::{Address, B256};
use safe_types::SignatureTuple;
use tracing::debug;

/// Checks that a message hash is endorsed by at least `threshold` distinct
/// owners of an [`OwnerSet`].
///
/// Signatures must be supplied in strictly ascending order of their recovered
/// signer address. This canonical order makes a duplicated signer detectable by
/// comparing neighbours, so one pass over the list is enough.
pub struct SignatureQuorum<'a> {
	owners: &'a OwnerSet,
}

impl<'a> SignatureQuorum<'a> {
	pub fn new(owners: &'a OwnerSet) -> Self {
		Self { owners }
	}

	/// Returns the recovered signers in the order supplied.
	pub fn verify(
		&self,
		hash: &B256,
		signatures: &[SignatureTuple],
	) -> Result<Vec<Address>, SafeError> {
		let mut signers = Vec::with_capacity(signatures.len());
		let mut previous = Address::ZERO;

		for signature in signatures {
			let signer = signature
				.recover(hash)
				.map_err(|e| SafeError::SignatureInvalid(e.to_string()))?;
			if !self.owners.contains(&signer) {
				return Err(SafeError::UnknownSigner(signer));
			}
			if signer <= previous {
				return Err(SafeError::DuplicateOrUnsortedSigner(signer));
			}
			previous = signer;
			signers.push(signer);
		}

		let threshold = self.owners.threshold();
		if signers.len() < usize::from(threshold) {
			return Err(SafeError::QuorumNotMet {
				provided: signers.len(),
				threshold,
			});
		}

		debug!(signers = signers.len(), threshold, "quorum verified");
		Ok(signers)
	}
}
