//! `/modules/{address}`: daily-limit module state and spends.

use super::{ledger_error, path_address, receipt_response};
use crate::server::AppState;
use axum::{
	extract::{Path, State},
	Json,
};
use safe_types::{
	APIError, AssetLimitInfo, DailyLimitInfoResponse, ExecuteDailyLimitRequest, ReceiptResponse,
};
use tracing::warn;

pub async fn get_daily_limit(
	State(state): State<AppState>,
	Path(address): Path<String>,
) -> Result<Json<DailyLimitInfoResponse>, APIError> {
	let address = path_address(&address)?;
	state
		.node
		.read(|ledger| -> Result<_, APIError> {
			let module = ledger.daily_limit(address).map_err(ledger_error)?;
			Ok(Json(DailyLimitInfoResponse {
				address,
				manager: module.manager(),
				assets: module
					.assets()
					.iter()
					.map(|limit| AssetLimitInfo {
						asset: limit.asset,
						daily_limit: limit.daily_limit,
						spent_today: limit.spent_today,
						last_reset: limit.last_reset,
					})
					.collect(),
			}))
		})
		.await
}

pub async fn execute_daily_limit(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Json(request): Json<ExecuteDailyLimitRequest>,
) -> Result<Json<ReceiptResponse>, APIError> {
	let address = path_address(&address)?;
	state
		.node
		.transact(|ledger| {
			ledger.execute_daily_limit(
				request.sender,
				address,
				request.asset_index,
				request.to,
				request.amount,
			)
		})
		.await
		.map(|receipt| Json(receipt_response(receipt)))
		.map_err(|e| {
			warn!(module = %address, error = %e, "daily limit spend rejected");
			e.into()
		})
}
