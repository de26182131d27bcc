//! Operation types executed by a Safe.
//!
//! An operation is a tagged union of call kind and call payload. It is the only
//! unit of work the authorization core ever executes, whether it arrives through
//! the owner quorum or through an enabled module or extension.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the target of an operation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
	/// Regular message call; the target runs in its own context.
	Call,
	/// The target's code runs in the Safe's own storage context.
	///
	/// Reserved for privileged installation flows.
	DelegateCall,
}

impl CallKind {
	/// Returns the ABI encoding of this call kind (`uint8`).
	pub fn as_u8(self) -> u8 {
		match self {
			CallKind::Call => 0,
			CallKind::DelegateCall => 1,
		}
	}
}

impl TryFrom<u8> for CallKind {
	type Error = u8;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(CallKind::Call),
			1 => Ok(CallKind::DelegateCall),
			other => Err(other),
		}
	}
}

impl fmt::Display for CallKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CallKind::Call => write!(f, "call"),
			CallKind::DelegateCall => write!(f, "delegatecall"),
		}
	}
}

/// A single operation a Safe can execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
	/// Target account.
	pub to: Address,
	/// Amount of ether forwarded with the call, in wei.
	pub value: U256,
	/// ABI-encoded call data.
	pub data: Bytes,
	/// Call kind used to execute the target.
	pub kind: CallKind,
}

impl Operation {
	/// Creates a regular call operation.
	pub fn call(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
		Self {
			to,
			value,
			data: data.into(),
			kind: CallKind::Call,
		}
	}

	/// Creates a delegate call operation.
	///
	/// Delegate calls never forward value.
	pub fn delegate_call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to,
			value: U256::ZERO,
			data: data.into(),
			kind: CallKind::DelegateCall,
		}
	}

	/// Plain ether transfer to `to`.
	pub fn transfer(to: Address, value: U256) -> Self {
		Self::call(to, value, Bytes::new())
	}
}
