//! Main entry point for the Safe node.
//!
//! Loads the configuration, restores or deploys the ledger, and serves the
//! HTTP API when it is enabled.

use clap::Parser;
use safe_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod genesis;
mod node;
mod server;

use node::SafeNode;

/// Command-line arguments for the Safe node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		"Loaded configuration [{}] for chain {}",
		config.node.id,
		config.node.chain_id
	);

	let node = Arc::new(SafeNode::start(&config).await?);
	let system = node.system();
	tracing::info!(
		proxy_factory = %system.proxy_factory,
		safe_master_copy = %system.safe_master_copy,
		"system contracts ready"
	);
	for (name, safe) in &node.deployment().safes {
		tracing::info!(name = %name, address = %safe.address, "safe available");
	}

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				result = server::start_server(api_config, Arc::clone(&node)) => {
					tracing::info!("API server finished");
					result?;
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Received shutdown signal");
				}
			}
		},
		None => {
			tracing::info!("API disabled, ledger loaded; waiting for shutdown signal");
			tokio::signal::ctrl_c().await?;
		},
	}

	tracing::info!("Stopped safe node");
	Ok(())
}
