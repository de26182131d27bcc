//! Handlers for the `/api` routes.
//!
//! Each submodule owns one resource. Handlers parse and validate the request,
//! run it against the node, and map ledger results into API types.

pub mod calls;
pub mod extensions;
pub mod modules;
pub mod safes;

use crate::node::NodeError;
use alloy_primitives::Address;
use safe_core::{Receipt, SafeError};
use safe_types::{utils::parse_address, APIError, CallKind, Operation, OperationRequest, ReceiptResponse};
use serde_json::json;

/// Parses an address taken from the URL path.
pub(crate) fn path_address(raw: &str) -> Result<Address, APIError> {
	parse_address(raw).map_err(|e| APIError::bad_request("INVALID_ADDRESS", e))
}

pub(crate) fn to_operation(request: OperationRequest) -> Result<Operation, APIError> {
	let kind = CallKind::try_from(request.operation).map_err(|kind| {
		APIError::bad_request(
			"INVALID_OPERATION",
			format!("operation must be 0 (call) or 1 (delegatecall), got {}", kind),
		)
	})?;
	Ok(Operation {
		to: request.to,
		value: request.value,
		data: request.data,
		kind,
	})
}

pub(crate) fn receipt_response(receipt: Receipt) -> ReceiptResponse {
	ReceiptResponse {
		events: receipt.events,
		return_data: receipt.return_data,
	}
}

pub(crate) fn ledger_error(err: SafeError) -> APIError {
	let code = err.code();
	match err {
		SafeError::UnknownContract(_) => APIError::not_found(code, err.to_string()),
		SafeError::OperationExecutionFailed {
			consumed_nonce: Some(nonce),
			..
		} => APIError::UnprocessableEntity {
			error_type: code.to_string(),
			message: err.to_string(),
			details: Some(json!({ "consumedNonce": nonce.to_string() })),
		},
		_ => APIError::UnprocessableEntity {
			error_type: code.to_string(),
			message: err.to_string(),
			details: None,
		},
	}
}

impl From<NodeError> for APIError {
	fn from(err: NodeError) -> Self {
		match err {
			NodeError::Ledger(e) => ledger_error(e),
			other => APIError::internal(other.to_string()),
		}
	}
}
