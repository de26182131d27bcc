//! `/safes/{address}`: inspect a Safe, compute the hash owners sign, and
//! submit quorum-signed transactions.

use super::{ledger_error, path_address, receipt_response, to_operation};
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	Json,
};
use safe_types::{
	APIError, ReceiptResponse, SafeInfoResponse, SubmitTransactionRequest, TransactionHashRequest,
	TransactionHashResponse,
};
use tracing::{info, warn};

pub async fn get_safe(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<SafeInfoResponse>, APIError> {
	let address = path_address(&address)?;
	state
		.node
		.read(|ledger| -> Result<_, APIError> {
			let safe = ledger.safe(address).map_err(ledger_error)?;
			Ok(Json(SafeInfoResponse {
				address,
				owners: safe.owners().to_vec(),
				threshold: safe.threshold(),
				nonce: safe.nonce(),
				modules: safe.modules().to_vec(),
				extensions: safe.extensions().to_vec(),
				balance: ledger.balance(address),
			}))
		})
		.await
}

pub async fn transaction_hash(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<TransactionHashRequest>,
) -> Result<Json<TransactionHashResponse>, APIError> {
	let address = path_address(&address)?;
	let operation = to_operation(request.operation)?;
	state
		.node
		.read(|ledger| -> Result<_, APIError> {
			let nonce = match request.nonce {
				Some(nonce) => nonce,
				None => ledger.safe(address).map_err(ledger_error)?.nonce(),
			};
			Ok(Json(TransactionHashResponse {
				safe_tx_hash: ledger.transaction_hash(address, &operation, nonce),
				nonce,
			}))
		})
		.await
}

pub async fn submit(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<SubmitTransactionRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let address = path_address(&address)?;
	let operation = to_operation(request.operation)?;
	let result = state
		.node
		.transact(|ledger| {
			ledger.submit(
				request.sender,
				address,
				&operation,
				request.nonce,
				&request.signatures,
			)
		})
		.await;

	match result {
		Ok(receipt) => {
			info!(safe = %address, nonce = %request.nonce, "transaction executed");
			Ok(Json(receipt_response(receipt)))
		},
		Err(e) => {
			warn!(safe = %address, error = %e, "transaction rejected");
			Err(e.into())
		},
	}
}
