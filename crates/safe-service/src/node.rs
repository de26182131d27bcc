//! The running node: one ledger, its persistence, and the genesis record.

use crate::genesis::{self, Deployment};
use safe_config::{Config, ConfigError};
use safe_core::{Clock, Ledger, LedgerState, SafeError, SystemClock, SystemContracts};
use safe_storage::{create_backend, StorageError, StorageService};
use safe_types::StorageKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Errors raised while starting the node or running a transaction.
#[derive(Debug, Error)]
pub enum NodeError {
	#[error(transparent)]
	Ledger(#[from] SafeError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("Genesis error: {0}")]
	Genesis(String),
}

/// What the node persists after every committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
	pub state: LedgerState,
	pub system: SystemContracts,
	pub deployment: Deployment,
}

/// A single ledger served to the API, persisted after each committed transaction.
pub struct SafeNode {
	ledger: Mutex<Ledger>,
	storage: StorageService,
	snapshot_key: String,
	system: SystemContracts,
	deployment: Deployment,
}

impl SafeNode {
	pub async fn start(config: &Config) -> Result<Self, NodeError> {
		Self::start_with_clock(config, Arc::new(SystemClock)).await
	}

	/// Restores the persisted snapshot if there is one, otherwise deploys genesis.
	pub async fn start_with_clock(
		config: &Config,
		clock: Arc<dyn Clock>,
	) -> Result<Self, NodeError> {
		let backend_config = config
			.storage
			.implementations
			.get(&config.storage.primary)
			.ok_or_else(|| {
				ConfigError::Validation(format!(
					"Primary storage '{}' not configured",
					config.storage.primary
				))
			})?;
		let storage = StorageService::new(create_backend(&config.storage.primary, backend_config)?);
		let snapshot_key = config.node.snapshot_key.clone();

		let snapshot: Option<NodeSnapshot> = storage
			.retrieve_optional(StorageKey::Ledger.as_str(), &snapshot_key)
			.await?;

		let node = match snapshot {
			Some(snapshot) => {
				if snapshot.state.chain_id != config.node.chain_id {
					return Err(NodeError::Genesis(format!(
						"snapshot '{}' is for chain {}, configured chain is {}",
						snapshot_key, snapshot.state.chain_id, config.node.chain_id
					)));
				}
				info!(
					key = %snapshot_key,
					accounts = snapshot.state.accounts.len(),
					"restored ledger snapshot"
				);
				Self {
					ledger: Mutex::new(Ledger::from_state(snapshot.state, clock)),
					storage,
					snapshot_key,
					system: snapshot.system,
					deployment: snapshot.deployment,
				}
			},
			None => {
				let mut ledger = Ledger::new(config.node.chain_id, clock);
				let (system, deployment) = genesis::deploy(&mut ledger, &config.genesis)?;
				info!(
					safes = deployment.safes.len(),
					tokens = deployment.tokens.len(),
					"deployed genesis"
				);
				let node = Self {
					ledger: Mutex::new(ledger),
					storage,
					snapshot_key,
					system,
					deployment,
				};
				let ledger = node.ledger.lock().await;
				node.persist(&ledger).await?;
				drop(ledger);
				node
			},
		};
		Ok(node)
	}

	/// Factory, master copies and installers deployed at genesis.
	pub fn system(&self) -> &SystemContracts {
		&self.system
	}

	/// Accounts genesis created, by configured name.
	pub fn deployment(&self) -> &Deployment {
		&self.deployment
	}

	/// Runs a read-only query against the ledger.
	pub async fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
		let ledger = self.ledger.lock().await;
		f(&ledger)
	}

	/// Runs one transaction and persists the ledger if it committed anything.
	///
	/// The lock is held until the snapshot is written, so snapshots are stored
	/// in transaction order.
	#[instrument(skip_all)]
	pub async fn transact<T>(
		&self,
		f: impl FnOnce(&mut Ledger) -> Result<T, SafeError>,
	) -> Result<T, NodeError> {
		let mut ledger = self.ledger.lock().await;
		let result = f(&mut ledger);
		let committed = match &result {
			Ok(_) => true,
			Err(e) => e.keeps_state(),
		};
		if committed {
			self.persist(&ledger).await?;
		}
		result.map_err(NodeError::from)
	}

	async fn persist(&self, ledger: &Ledger) -> Result<(), NodeError> {
		let snapshot = NodeSnapshot {
			state: ledger.state().clone(),
			system: self.system,
			deployment: self.deployment.clone(),
		};
		self.storage
			.store(StorageKey::Ledger.as_str(), &self.snapshot_key, &snapshot)
			.await?;
		debug!(key = %self.snapshot_key, "persisted ledger snapshot");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, U256};
	use safe_core::{ManualClock, RecoveryState};
	use safe_types::Operation;
	use tempfile::TempDir;

	const START: u64 = 1_704_099_600;

	fn config(storage: &str) -> Config {
		format!(
			r#"
[node]
id = "node-test"
chain_id = 31337

[storage]
primary = "{primary}"
[storage.implementations.{primary}]
{settings}

[[genesis.accounts]]
address = "0x9965507D1a55bcC2695C58ba16FB37d819B0A4dc"
balance = "1000"

[[genesis.tokens]]
symbol = "USDC"

[[genesis.safes]]
name = "treasury"
owners = [
	"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
	"0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
]
threshold = 2
balance = "1000000000000000000"
token_balances = {{ USDC = "5000" }}

[genesis.safes.daily_limit]
assets = ["ether", "USDC"]
limits = ["500000000000000000", "100"]

[genesis.safes.recovery]
recoverer = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65"
challenge_period_seconds = 86400
"#,
			primary = if storage.is_empty() { "memory" } else { "file" },
			settings = if storage.is_empty() {
				String::new()
			} else {
				format!("storage_path = \"{}\"", storage)
			},
		)
		.parse()
		.unwrap()
	}

	fn clock() -> Arc<dyn Clock> {
		Arc::new(ManualClock::new(START))
	}

	#[tokio::test]
	async fn test_genesis_deploys_configured_safe() {
		let node = SafeNode::start_with_clock(&config(""), clock()).await.unwrap();
		let treasury = node.deployment().safes["treasury"].clone();
		let usdc = node.deployment().tokens["USDC"];
		let module = treasury.daily_limit.unwrap();
		let extension = treasury.recovery.unwrap();

		node.read(|ledger| {
			let safe = ledger.safe(treasury.address).unwrap();
			assert_eq!(safe.threshold(), 2);
			assert_eq!(safe.modules(), &[module]);
			assert_eq!(safe.extensions(), &[extension]);
			assert_eq!(safe.nonce(), U256::ZERO);
			assert_eq!(
				ledger.balance(treasury.address),
				U256::from(1_000_000_000_000_000_000u64)
			);
			assert_eq!(
				ledger.token(usdc).unwrap().balance_of(&treasury.address),
				U256::from(5000)
			);

			let limits = ledger.daily_limit(module).unwrap();
			assert_eq!(limits.manager(), treasury.address);
			assert_eq!(limits.assets()[1].asset, usdc);

			let recovery = ledger.recovery(extension).unwrap();
			assert_eq!(recovery.safe(), treasury.address);
			assert_eq!(recovery.state(), RecoveryState::Idle);
		})
		.await;
	}

	#[tokio::test]
	async fn test_snapshot_survives_restart() {
		let dir = TempDir::new().unwrap();
		let config = config(dir.path().to_str().unwrap());
		let recipient = Address::repeat_byte(0x42);

		let node = SafeNode::start_with_clock(&config, clock()).await.unwrap();
		let treasury = node.deployment().safes["treasury"].clone();
		let module = treasury.daily_limit.unwrap();
		node.transact(|ledger| {
			ledger.execute_daily_limit(recipient, module, 0, recipient, U256::from(7))
		})
		.await
		.unwrap();
		drop(node);

		let restarted = SafeNode::start_with_clock(&config, clock()).await.unwrap();
		assert_eq!(restarted.deployment().safes["treasury"], treasury);
		let balance = restarted.read(|ledger| ledger.balance(recipient)).await;
		assert_eq!(balance, U256::from(7));
	}

	#[tokio::test]
	async fn test_rejected_transaction_is_not_persisted() {
		let dir = TempDir::new().unwrap();
		let config = config(dir.path().to_str().unwrap());
		let node = SafeNode::start_with_clock(&config, clock()).await.unwrap();
		let treasury = node.deployment().safes["treasury"].address;

		let err = node
			.transact(|ledger| {
				ledger.submit(
					Address::repeat_byte(1),
					treasury,
					&Operation::transfer(Address::repeat_byte(2), U256::from(1)),
					U256::from(3),
					&[],
				)
			})
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			NodeError::Ledger(SafeError::NonceMismatch { .. })
		));

		let snapshot: NodeSnapshot = node
			.storage
			.retrieve(StorageKey::Ledger.as_str(), "latest")
			.await
			.unwrap();
		let current = node.read(|ledger| ledger.state().clone()).await;
		assert_eq!(snapshot.state, current);
	}

	#[tokio::test]
	async fn test_snapshot_for_other_chain_rejected() {
		let dir = TempDir::new().unwrap();
		let config = config(dir.path().to_str().unwrap());
		SafeNode::start_with_clock(&config, clock()).await.unwrap();

		let mut other = config.clone();
		other.node.chain_id = 1;
		assert!(matches!(
			SafeNode::start_with_clock(&other, clock()).await,
			Err(NodeError::Genesis(_))
		));
	}
}
