//! `/extensions/{address}`: recovery extension state and lifecycle.

use super::{ledger_error, path_address, receipt_response};
use crate::{node::NodeError, server::AppState};
use alloy_primitives::Address;
use axum::{
	extract::{Path, State},
	Json,
};
use safe_core::Receipt;
use safe_types::{
	APIError, CancelRecoveryRequest, CompleteRecoveryRequest, PendingRecoveryInfo,
	ReceiptResponse, RecoveryInfoResponse, TriggerRecoveryRequest,
};
use tracing::{info, warn};

pub async fn get_recovery(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<RecoveryInfoResponse>, APIError> {
	let address = path_address(&address)?;
	state
		.node
		.read(|ledger| -> Result<_, APIError> {
			let extension = ledger.recovery(address).map_err(ledger_error)?;
			let pending = extension.pending().map(|p| PendingRecoveryInfo {
				owner_index: p.owner_index,
				old_owner: p.old_owner,
				new_owner: p.new_owner,
				trigger_time: p.trigger_time,
				ready_at: p.trigger_time.saturating_add(extension.challenge_period()),
				call_data: p.call_data.clone(),
			});
			Ok(Json(RecoveryInfoResponse {
				address,
				safe: extension.safe(),
				recoverer: extension.recoverer(),
				challenge_period: extension.challenge_period(),
				nonce: extension.nonce(),
				pending,
			}))
		})
		.await
}

fn respond(
	action: &str,
	extension: Address,
	result: Result<Receipt, NodeError>,
) -> Result<Json<ReceiptResponse>, APIError> {
	match result {
		Ok(receipt) => {
			info!(extension = %extension, action, "recovery request accepted");
			Ok(Json(receipt_response(receipt)))
		},
		Err(e) => {
			warn!(extension = %extension, action, error = %e, "recovery request rejected");
			Err(e.into())
		},
	}
}

pub async fn trigger(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<TriggerRecoveryRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let address = path_address(&address)?;
	let result = state
		.node
		.transact(|ledger| {
			ledger.trigger_recovery(
				request.sender,
				address,
				request.owner_index,
				request.old_owner,
				request.new_owner,
				request.signature,
			)
		})
		.await;
	respond("trigger", address, result)
}

pub async fn cancel(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<CancelRecoveryRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let address = path_address(&address)?;
	let result = state
		.node
		.transact(|ledger| ledger.cancel_recovery(request.sender, address, request.signature))
		.await;
	respond("cancel", address, result)
}

pub async fn complete(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<CompleteRecoveryRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let address = path_address(&address)?;
	let result = state
		.node
		.transact(|ledger| ledger.complete_recovery(request.sender, address, request.data))
		.await;
	respond("complete", address, result)
}
