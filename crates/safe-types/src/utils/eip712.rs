//! EIP-712 utilities shared by every hash-then-sign flow.
//!
//! These helpers provide:
//! - Domain hash computation (name, version, chain id, verifying contract)
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static field types the signed structs use

use alloy_primitives::{keccak256, Address, B256, U256};

pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const NAME_SAFE: &str = "Safe";
pub const NAME_RECOVERY_EXTENSION: &str = "RecoveryExtension";
/// Version of every signed encoding in this workspace. Bumping it invalidates all
/// outstanding signatures.
pub const ENCODING_VERSION: &str = "1";
pub const SAFE_TX_TYPE: &str =
	"SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 nonce)";
pub const RECOVERY_REQUEST_TYPE: &str =
	"RecoveryRequest(uint8 action,uint256 nonce,uint64 ownerIndex,address oldOwner,address newOwner)";

/// Compute the EIP-712 domain hash
/// (keccak256(abi.encode(typeHash, nameHash, versionHash, chainId, verifyingContract))).
pub fn compute_domain_hash(name: &str, chain_id: u64, verifying_contract: &Address) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_b256(&keccak256(name.as_bytes()));
	enc.push_b256(&keccak256(ENCODING_VERSION.as_bytes()));
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for static types used in EIP-712 struct hashing.
#[derive(Debug, Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	/// Starts a struct encoding with the type hash of `type_string`.
	pub fn for_type(type_string: &str) -> Self {
		let mut enc = Self::new();
		enc.push_b256(&keccak256(type_string.as_bytes()));
		enc
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u64(&mut self, v: u64) {
		let mut word = [0u8; 32];
		word[24..].copy_from_slice(&v.to_be_bytes());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u8(&mut self, v: u8) {
		let mut word = [0u8; 32];
		word[31] = v;
		self.buf.extend_from_slice(&word);
	}

	/// Dynamic `bytes` members are encoded as the keccak256 of their contents.
	pub fn push_bytes(&mut self, data: &[u8]) {
		self.push_b256(&keccak256(data));
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}

	/// Hashes the encoded struct.
	pub fn struct_hash(self) -> B256 {
		keccak256(self.finish())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_words_are_left_padded() {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_u8(7);
		enc.push_u64(0x0102);
		enc.push_address(&Address::repeat_byte(0xaa));
		let out = enc.finish();

		assert_eq!(out.len(), 96);
		assert!(out[..31].iter().all(|b| *b == 0));
		assert_eq!(out[31], 7);
		assert_eq!(&out[62..64], &[0x01, 0x02]);
		assert!(out[64..76].iter().all(|b| *b == 0));
		assert!(out[76..96].iter().all(|b| *b == 0xaa));
	}

	#[test]
	fn test_domain_binds_chain_and_contract() {
		let contract = Address::repeat_byte(0x01);
		let base = compute_domain_hash(NAME_SAFE, 1, &contract);

		assert_ne!(base, compute_domain_hash(NAME_SAFE, 2, &contract));
		assert_ne!(
			base,
			compute_domain_hash(NAME_SAFE, 1, &Address::repeat_byte(0x02))
		);
		assert_ne!(base, compute_domain_hash(NAME_RECOVERY_EXTENSION, 1, &contract));
	}

	#[test]
	fn test_final_digest_prefix() {
		let domain = B256::repeat_byte(1);
		let strukt = B256::repeat_byte(2);
		let mut preimage = vec![0x19, 0x01];
		preimage.extend_from_slice(domain.as_slice());
		preimage.extend_from_slice(strukt.as_slice());
		assert_eq!(compute_final_digest(&domain, &strukt), keccak256(preimage));
	}
}
