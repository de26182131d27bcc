//! `/calls`: raw transactions from accounts without code.

use super::receipt_response;
use crate::server::AppState;
use axum::{extract::State, Json};
use safe_types::{APIError, RawCallRequest, ReceiptResponse};

pub async fn raw_call(
	State(state): State<AppState>,
	Json(request): Json<RawCallRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let receipt = state
		.node
		.transact(|ledger| {
			ledger.external_call(request.from, request.to, request.value, request.data)
		})
		.await?;
	Ok(Json(receipt_response(receipt)))
}
