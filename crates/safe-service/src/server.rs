//! HTTP server for the Safe node API.

use crate::{apis, node::SafeNode};
use axum::{
	routing::{get, post},
	Router,
};
use safe_config::ApiConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub node: Arc<SafeNode>,
}

/// Builds the `/api` router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/safes/{address}", get(apis::safes::get_safe))
				.route(
					"/safes/{address}/transaction-hash",
					post(apis::safes::transaction_hash),
				)
				.route("/safes/{address}/transactions", post(apis::safes::submit))
				.route("/modules/{address}", get(apis::modules::get_daily_limit))
				.route(
					"/modules/{address}/daily-limit",
					post(apis::modules::execute_daily_limit),
				)
				.route("/extensions/{address}", get(apis::extensions::get_recovery))
				.route("/extensions/{address}/trigger", post(apis::extensions::trigger))
				.route("/extensions/{address}/cancel", post(apis::extensions::cancel))
				.route(
					"/extensions/{address}/complete",
					post(apis::extensions::complete),
				)
				.route("/calls", post(apis::calls::raw_call)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Binds the configured address and serves the API until the process exits.
pub async fn start_server(
	api_config: ApiConfig,
	node: Arc<SafeNode>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { node });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Safe node API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
