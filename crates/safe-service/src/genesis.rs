//! Initial ledger state built from the `[genesis]` configuration section.
//!
//! Order matters: system contracts first, then tokens (so Safes and limits can
//! reference them by symbol), funded accounts, and finally each Safe with its
//! module and extension.

use crate::node::NodeError;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use safe_config::{AssetRef, GenesisConfig, SafeGenesis};
use safe_core::{ledger::GENESIS_DEPLOYER, Contract, Ledger, SystemContracts, Token};
use safe_types::{
	interfaces::{IDailyLimitModule, IInstaller, IProxyFactory, IRecoveryExtension, ISafe},
	utils::parse_amount,
	SafeEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Addresses of everything genesis deployed, by configured name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
	/// Token contracts by symbol.
	pub tokens: BTreeMap<String, Address>,
	/// Safes by configured name.
	pub safes: BTreeMap<String, DeployedSafe>,
}

/// One Safe created at genesis, with what was installed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedSafe {
	/// Proxy address of the Safe.
	pub address: Address,
	/// Daily-limit module, when one was configured.
	pub daily_limit: Option<Address>,
	/// Recovery extension, when one was configured.
	pub recovery: Option<Address>,
}

/// Builds the genesis state into an empty `ledger`.
pub fn deploy(
	ledger: &mut Ledger,
	genesis: &GenesisConfig,
) -> Result<(SystemContracts, Deployment), NodeError> {
	let system = ledger.deploy_system();
	let mut deployment = Deployment::default();

	for token in &genesis.tokens {
		let address = ledger.deploy(Contract::Token(Token::new(token.symbol.clone())));
		for holder in &token.holders {
			ledger.mint(address, holder.address()?, holder.balance()?)?;
		}
		info!(symbol = %token.symbol, address = %address, "deployed token");
		deployment.tokens.insert(token.symbol.clone(), address);
	}

	for account in &genesis.accounts {
		ledger.deal(account.address()?, account.balance()?);
	}

	for safe in &genesis.safes {
		let deployed = deploy_safe(ledger, &system, &deployment.tokens, safe)?;
		info!(
			name = %safe.name,
			address = %deployed.address,
			daily_limit = ?deployed.daily_limit,
			recovery = ?deployed.recovery,
			"deployed safe"
		);
		deployment.safes.insert(safe.name.clone(), deployed);
	}

	Ok((system, deployment))
}

fn deploy_safe(
	ledger: &mut Ledger,
	system: &SystemContracts,
	tokens: &BTreeMap<String, Address>,
	config: &SafeGenesis,
) -> Result<DeployedSafe, NodeError> {
	// A configured daily limit is installed by setup's own delegate call.
	let (to, data) = match &config.daily_limit {
		Some(limits) => {
			let assets = limits
				.asset_refs()?
				.into_iter()
				.map(|asset| resolve_asset(tokens, asset))
				.collect::<Result<Vec<_>, _>>()?;
			let creation = IProxyFactory::createProxyCall {
				masterCopy: system.daily_limit_master_copy,
				data: IDailyLimitModule::setupCall {
					assets,
					dailyLimits: limits.limit_amounts()?,
				}
				.abi_encode()
				.into(),
			};
			let install = IInstaller::createAndAddModulesCall {
				proxyFactory: system.proxy_factory,
				data: vec![creation.abi_encode().into()],
			};
			(system.module_installer, install.abi_encode())
		},
		None => (Address::ZERO, Vec::new()),
	};

	let setup = ISafe::setupCall {
		owners: config.owner_addresses()?,
		threshold: config.threshold,
		to,
		data: data.into(),
	};
	let (address, receipt) = ledger.create_proxy(
		GENESIS_DEPLOYER,
		system.proxy_factory,
		system.safe_master_copy,
		setup.abi_encode(),
	)?;
	let daily_limit = receipt.events.iter().find_map(|event| match event {
		SafeEvent::EnabledModule { module, .. } => Some(*module),
		_ => None,
	});

	let recovery = match &config.recovery {
		Some(recovery) => Some(install_recovery(
			ledger,
			system,
			address,
			recovery.recoverer()?,
			recovery.challenge_period_seconds,
		)?),
		None => None,
	};

	ledger.deal(address, config.balance()?);
	for (symbol, amount) in &config.token_balances {
		let token = resolve_asset(tokens, AssetRef::Symbol(symbol.clone()))?;
		let amount = parse_amount(amount).map_err(NodeError::Genesis)?;
		ledger.mint(token, address, amount)?;
	}

	Ok(DeployedSafe {
		address,
		daily_limit,
		recovery,
	})
}

/// Creates a recovery extension bound to `safe` and adds it, acting with the
/// Safe's own authority.
fn install_recovery(
	ledger: &mut Ledger,
	system: &SystemContracts,
	safe: Address,
	recoverer: Address,
	challenge_period: u64,
) -> Result<Address, NodeError> {
	let setup = IRecoveryExtension::setupCall {
		recoverer,
		challengePeriod: challenge_period,
	};
	let (extension, _) = ledger.create_proxy(
		safe,
		system.proxy_factory,
		system.recovery_master_copy,
		setup.abi_encode(),
	)?;
	ledger.call(
		safe,
		safe,
		U256::ZERO,
		ISafe::addExtensionCall { extension }.abi_encode(),
	)?;
	Ok(extension)
}

fn resolve_asset(tokens: &BTreeMap<String, Address>, asset: AssetRef) -> Result<Address, NodeError> {
	match asset {
		AssetRef::Ether => Ok(Address::ZERO),
		AssetRef::Address(address) => Ok(address),
		AssetRef::Symbol(symbol) => tokens
			.get(&symbol)
			.copied()
			.ok_or_else(|| NodeError::Genesis(format!("unknown token '{}'", symbol))),
	}
}
