//! API types for the Safe node HTTP API.
//!
//! Request and response bodies for the `/api` routes, plus the structured
//! error type every handler returns.

use crate::{SafeEvent, SignatureTuple};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation fields as sent by API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
	pub to: Address,
	/// Value in wei
	#[serde(with = "u256_serde", default)]
	pub value: U256,
	#[serde(default)]
	pub data: Bytes,
	/// 0 = call, 1 = delegatecall
	#[serde(default)]
	pub operation: u8,
}

/// Request for the hash owners must sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHashRequest {
	#[serde(flatten)]
	pub operation: OperationRequest,
	/// Nonce to hash against; defaults to the Safe's current nonce
	#[serde(default, with = "option_u256_serde")]
	pub nonce: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHashResponse {
	pub safe_tx_hash: B256,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

/// Quorum-signed transaction submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
	/// Account relaying the transaction
	pub sender: Address,
	#[serde(flatten)]
	pub operation: OperationRequest,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	/// Signatures ordered by ascending signer address
	pub signatures: Vec<SignatureTuple>,
}

/// Daily-limit spend request. Any sender may submit one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteDailyLimitRequest {
	pub sender: Address,
	pub asset_index: u64,
	pub to: Address,
	#[serde(with = "u256_serde")]
	pub amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRecoveryRequest {
	pub sender: Address,
	pub owner_index: u64,
	pub old_owner: Address,
	pub new_owner: Address,
	pub signature: SignatureTuple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRecoveryRequest {
	pub sender: Address,
	pub signature: SignatureTuple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRecoveryRequest {
	pub sender: Address,
	/// Encoded `replaceOwner` call stored at trigger time
	pub data: Bytes,
}

/// Raw transaction against any account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallRequest {
	pub from: Address,
	pub to: Address,
	#[serde(with = "u256_serde", default)]
	pub value: U256,
	#[serde(default)]
	pub data: Bytes,
}

/// Result of a committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
	pub events: Vec<SafeEvent>,
	pub return_data: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeInfoResponse {
	pub address: Address,
	pub owners: Vec<Address>,
	pub threshold: u8,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	pub modules: Vec<Address>,
	pub extensions: Vec<Address>,
	#[serde(with = "u256_serde")]
	pub balance: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLimitInfo {
	pub asset: Address,
	#[serde(with = "u256_serde")]
	pub daily_limit: U256,
	#[serde(with = "u256_serde")]
	pub spent_today: U256,
	pub last_reset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLimitInfoResponse {
	pub address: Address,
	pub manager: Address,
	pub assets: Vec<AssetLimitInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecoveryInfo {
	pub owner_index: u64,
	pub old_owner: Address,
	pub new_owner: Address,
	pub trigger_time: u64,
	/// Earliest time at which completion is accepted
	pub ready_at: u64,
	pub call_data: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfoResponse {
	pub address: Address,
	pub safe: Address,
	pub recoverer: Address,
	pub challenge_period: u64,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	pub pending: Option<PendingRecoveryInfo>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed request (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Unknown account or wrong contract kind at an address (404)
	NotFound { error_type: String, message: String },
	/// Request was well formed but the ledger rejected it (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
			details: None,
		}
	}

	pub fn not_found(error_type: &str, message: impl Into<String>) -> Self {
		APIError::NotFound {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = match self.status_code() {
			400 => StatusCode::BAD_REQUEST,
			404 => StatusCode::NOT_FOUND,
			422 => StatusCode::UNPROCESSABLE_ENTITY,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

/// Serde module for U256 as a decimal string. Deserialization also accepts
/// 0x-prefixed hex.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		crate::utils::parse_amount(&s).map_err(D::Error::custom)
	}
}

/// Optional variant of [`u256_serde`].
pub mod option_u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(v) => serializer.serialize_some(&v.to_string()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = Option::<String>::deserialize(deserializer)?;
		s.map(|s| crate::utils::parse_amount(&s).map_err(D::Error::custom))
			.transpose()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_submit_request_accepts_flattened_operation() {
		let body = json!({
			"sender": "0x0000000000000000000000000000000000000001",
			"to": "0x0000000000000000000000000000000000000002",
			"value": "1000",
			"data": "0x",
			"operation": 0,
			"nonce": "0",
			"signatures": []
		});
		let req: SubmitTransactionRequest = serde_json::from_value(body).unwrap();
		assert_eq!(req.operation.value, U256::from(1000));
		assert_eq!(req.operation.operation, 0);
		assert!(req.signatures.is_empty());
	}

	#[test]
	fn test_transaction_hash_request_nonce_is_optional() {
		let body = json!({ "to": "0x0000000000000000000000000000000000000002" });
		let req: TransactionHashRequest = serde_json::from_value(body).unwrap();
		assert_eq!(req.nonce, None);
		assert_eq!(req.operation.value, U256::ZERO);

		let body = json!({ "to": "0x0000000000000000000000000000000000000002", "nonce": "0x2" });
		let req: TransactionHashRequest = serde_json::from_value(body).unwrap();
		assert_eq!(req.nonce, Some(U256::from(2)));
	}

	#[test]
	fn test_api_error_status_and_body() {
		let err = APIError::not_found("SAFE_NOT_FOUND", "no safe at 0x01");
		assert_eq!(err.status_code(), 404);
		let body = err.to_error_response();
		assert_eq!(body.error, "SAFE_NOT_FOUND");
		assert!(body.details.is_none());
		assert_eq!(err.to_string(), "Not Found: no safe at 0x01");
	}
}
