//! Error taxonomy of the authorization core and its execution environment.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Errors raised while executing a transaction against the ledger.
///
/// Every variant except [`SafeError::OperationExecutionFailed`] with a consumed
/// nonce aborts the transaction with no state change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SafeError {
	#[error("Invalid signature: {0}")]
	SignatureInvalid(String),
	#[error("Quorum not met: {provided} valid signatures, threshold is {threshold}")]
	QuorumNotMet { provided: usize, threshold: u8 },
	#[error("Signer {0} is not an owner")]
	UnknownSigner(Address),
	#[error("Signer {0} is duplicated or not in ascending order")]
	DuplicateOrUnsortedSigner(Address),
	#[error("Nonce mismatch: expected {expected}, got {provided}")]
	NonceMismatch { expected: U256, provided: U256 },
	#[error("Caller {0} is not authorized")]
	NotAuthorizedCaller(Address),
	#[error("Extension {0} is not enabled")]
	ExtensionNotEnabled(Address),
	#[error("Extension {0} cannot target itself")]
	SelfTargetForbidden(Address),
	#[error("Modules cannot execute delegate calls")]
	DelegateCallForbidden,
	/// The authorized operation itself failed.
	///
	/// `consumed_nonce` is set when the quorum path had already burned that nonce;
	/// the ledger keeps the nonce increment in that case.
	#[error("Operation execution failed: {reason}")]
	OperationExecutionFailed {
		consumed_nonce: Option<U256>,
		reason: String,
	},
	#[error("Daily limit exceeded for asset {asset}: spent {spent}, requested {requested}, limit {limit}")]
	DailyLimitExceeded {
		asset: Address,
		spent: U256,
		requested: U256,
		limit: U256,
	},
	#[error("Unknown asset index {0}")]
	UnknownAsset(u64),
	#[error("Challenge period not elapsed: ready at {ready_at}, now {now}")]
	ChallengePeriodNotElapsed { ready_at: u64, now: u64 },
	#[error("Operation does not match the pending recovery")]
	OperationMismatch,
	#[error("A recovery is already pending")]
	RecoveryAlreadyPending,
	#[error("No recovery is pending")]
	NoRecoveryPending,
	#[error("Signature recovered {0}, which is not the recoverer")]
	NotRecoverer(Address),
	#[error("Contract {0} is already initialized")]
	AlreadyInitialized(Address),
	#[error("Contract {0} is not initialized")]
	NotInitialized(Address),
	#[error("Invalid owner address {0}")]
	InvalidOwner(Address),
	#[error("Address {0} is already an owner")]
	DuplicateOwner(Address),
	#[error("Invalid threshold {threshold} for {owners} owners")]
	InvalidThreshold { threshold: u8, owners: usize },
	#[error("Entry at index {index} is not {expected}")]
	IndexMismatch { index: u64, expected: Address },
	#[error("Invalid or already enabled module {0}")]
	InvalidModule(Address),
	#[error("Invalid or already added extension {0}")]
	InvalidExtension(Address),
	#[error("Invalid setup: {0}")]
	InvalidSetup(String),
	#[error("Insufficient balance in {account}: available {available}, required {required}")]
	InsufficientBalance {
		account: Address,
		available: U256,
		required: U256,
	},
	#[error("No contract of the expected kind at {0}")]
	UnknownContract(Address),
	#[error("Address {0} is not a master copy")]
	UnknownMasterCopy(Address),
	#[error("Unsupported call: {0}")]
	UnsupportedCall(String),
	#[error("Call depth exceeded")]
	CallDepthExceeded,
	/// Contract accounts only act from inside a call their own code makes.
	#[error("Account {0} holds contract code and cannot originate a transaction")]
	ContractSender(Address),
}

impl SafeError {
	/// Whether the ledger must commit the transaction's state despite this error.
	pub fn keeps_state(&self) -> bool {
		matches!(
			self,
			SafeError::OperationExecutionFailed {
				consumed_nonce: Some(_),
				..
			}
		)
	}

	/// Stable machine-readable code.
	pub fn code(&self) -> &'static str {
		match self {
			SafeError::SignatureInvalid(_) => "SIGNATURE_INVALID",
			SafeError::QuorumNotMet { .. } => "QUORUM_NOT_MET",
			SafeError::UnknownSigner(_) => "UNKNOWN_SIGNER",
			SafeError::DuplicateOrUnsortedSigner(_) => "DUPLICATE_OR_UNSORTED_SIGNER",
			SafeError::NonceMismatch { .. } => "NONCE_MISMATCH",
			SafeError::NotAuthorizedCaller(_) => "NOT_AUTHORIZED_CALLER",
			SafeError::ExtensionNotEnabled(_) => "EXTENSION_NOT_ENABLED",
			SafeError::SelfTargetForbidden(_) => "SELF_TARGET_FORBIDDEN",
			SafeError::DelegateCallForbidden => "DELEGATE_CALL_FORBIDDEN",
			SafeError::OperationExecutionFailed { .. } => "OPERATION_EXECUTION_FAILED",
			SafeError::DailyLimitExceeded { .. } => "DAILY_LIMIT_EXCEEDED",
			SafeError::UnknownAsset(_) => "UNKNOWN_ASSET",
			SafeError::ChallengePeriodNotElapsed { .. } => "CHALLENGE_PERIOD_NOT_ELAPSED",
			SafeError::OperationMismatch => "OPERATION_MISMATCH",
			SafeError::RecoveryAlreadyPending => "RECOVERY_ALREADY_PENDING",
			SafeError::NoRecoveryPending => "NO_RECOVERY_PENDING",
			SafeError::NotRecoverer(_) => "NOT_RECOVERER",
			SafeError::AlreadyInitialized(_) => "ALREADY_INITIALIZED",
			SafeError::NotInitialized(_) => "NOT_INITIALIZED",
			SafeError::InvalidOwner(_) => "INVALID_OWNER",
			SafeError::DuplicateOwner(_) => "DUPLICATE_OWNER",
			SafeError::InvalidThreshold { .. } => "INVALID_THRESHOLD",
			SafeError::IndexMismatch { .. } => "INDEX_MISMATCH",
			SafeError::InvalidModule(_) => "INVALID_MODULE",
			SafeError::InvalidExtension(_) => "INVALID_EXTENSION",
			SafeError::InvalidSetup(_) => "INVALID_SETUP",
			SafeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
			SafeError::UnknownContract(_) => "UNKNOWN_CONTRACT",
			SafeError::UnknownMasterCopy(_) => "UNKNOWN_MASTER_COPY",
			SafeError::UnsupportedCall(_) => "UNSUPPORTED_CALL",
			SafeError::CallDepthExceeded => "CALL_DEPTH_EXCEEDED",
			SafeError::ContractSender(_) => "CONTRACT_SENDER",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_burned_nonce_keeps_state() {
		let burned = SafeError::OperationExecutionFailed {
			consumed_nonce: Some(U256::from(3)),
			reason: "revert".into(),
		};
		let nested = SafeError::OperationExecutionFailed {
			consumed_nonce: None,
			reason: "revert".into(),
		};
		assert!(burned.keeps_state());
		assert!(!nested.keeps_state());
		assert!(!SafeError::OperationMismatch.keeps_state());
	}
}
