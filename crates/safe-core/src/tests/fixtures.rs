//! Test fixtures for Safe scenarios.
//!
//! Provides well-known keys, a ledger with the system contracts deployed, and
//! helpers that sign and submit quorum transactions the way a wallet would.

use crate::{
	factory::SystemContracts, extensions::ACTION_TRIGGER, Ledger, ManualClock, Receipt,
	SafeError,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use safe_types::{
	interfaces::{IDailyLimitModule, IInstaller, IProxyFactory, IRecoveryExtension, ISafe},
	Operation, SafeEvent, SignatureTuple,
};
use std::sync::Arc;

pub(super) const CHAIN_ID: u64 = 31337;

/// 2024-01-01T09:00:00Z
pub(super) const START: u64 = 1_704_099_600;

pub(super) const ETHER: Address = Address::ZERO;

pub(super) fn ether(n: u64) -> U256 {
	U256::from(n) * U256::from(1_000_000_000_000_000_000u64)
}

pub(super) fn half_ether() -> U256 {
	U256::from(500_000_000_000_000_000u64)
}

/// Anvil's first development keys.
pub(super) fn test_accounts() -> Vec<PrivateKeySigner> {
	let keys = [
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
		"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
		"0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
		"0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
		"0x47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
	];
	keys.iter().map(|k| k.parse().unwrap()).collect()
}

pub(super) fn sign(signer: &PrivateKeySigner, hash: &B256) -> SignatureTuple {
	signer.sign_hash_sync(hash).unwrap().into()
}

/// Address of the first proxy created in `receipt`.
pub(super) fn created_proxy(receipt: &Receipt) -> Address {
	receipt
		.events
		.iter()
		.find_map(|e| match e {
			SafeEvent::ProxyCreation { proxy, .. } => Some(*proxy),
			_ => None,
		})
		.expect("receipt has no ProxyCreation event")
}

pub(super) struct TestEnv {
	pub ledger: Ledger,
	pub clock: Arc<ManualClock>,
	pub system: SystemContracts,
	/// Account that relays transactions and pays for nothing.
	pub relayer: Address,
}

impl TestEnv {
	pub fn new() -> Self {
		let clock = Arc::new(ManualClock::new(START));
		let mut ledger = Ledger::new(CHAIN_ID, clock.clone());
		let system = ledger.deploy_system();
		Self {
			ledger,
			clock,
			system,
			relayer: Address::repeat_byte(0x99),
		}
	}

	/// Creates a Safe owned by `owners`, funded with `balance` wei.
	pub fn deploy_safe(&mut self, owners: &[&PrivateKeySigner], threshold: u8, balance: U256) -> Address {
		let setup = ISafe::setupCall {
			owners: owners.iter().map(|s| s.address()).collect(),
			threshold,
			to: Address::ZERO,
			data: Bytes::new(),
		};
		let (safe, _) = self
			.ledger
			.create_proxy(
				self.relayer,
				self.system.proxy_factory,
				self.system.safe_master_copy,
				setup.abi_encode(),
			)
			.unwrap();
		self.ledger.deal(safe, balance);
		safe
	}

	/// Signatures of `signers` over `operation` at `nonce`, in canonical order.
	pub fn sign_operation(
		&self,
		safe: Address,
		operation: &Operation,
		nonce: U256,
		signers: &[&PrivateKeySigner],
	) -> Vec<SignatureTuple> {
		let hash = self.ledger.transaction_hash(safe, operation, nonce);
		let mut signers = signers.to_vec();
		signers.sort_by_key(|s| s.address());
		signers.iter().map(|s| sign(s, &hash)).collect()
	}

	/// Signs `operation` at the Safe's current nonce and submits it.
	pub fn submit(
		&mut self,
		safe: Address,
		operation: &Operation,
		signers: &[&PrivateKeySigner],
	) -> Result<Receipt, SafeError> {
		let nonce = self.ledger.safe(safe).unwrap().nonce();
		let signatures = self.sign_operation(safe, operation, nonce, signers);
		self.ledger
			.submit(self.relayer, safe, operation, nonce, &signatures)
	}

	/// Installs a daily-limit module through a quorum-approved delegate call.
	pub fn install_daily_limit(
		&mut self,
		safe: Address,
		signers: &[&PrivateKeySigner],
		assets: Vec<Address>,
		limits: Vec<U256>,
	) -> Address {
		let creation = IProxyFactory::createProxyCall {
			masterCopy: self.system.daily_limit_master_copy,
			data: IDailyLimitModule::setupCall {
				assets,
				dailyLimits: limits,
			}
			.abi_encode()
			.into(),
		};
		let install = IInstaller::createAndAddModulesCall {
			proxyFactory: self.system.proxy_factory,
			data: vec![creation.abi_encode().into()],
		};
		let operation = Operation::delegate_call(self.system.module_installer, install.abi_encode());
		let receipt = self.submit(safe, &operation, signers).unwrap();
		created_proxy(&receipt)
	}

	/// Installs a recovery extension through a quorum-approved delegate call.
	pub fn install_recovery(
		&mut self,
		safe: Address,
		signers: &[&PrivateKeySigner],
		recoverer: Address,
		challenge_period: u64,
	) -> Address {
		let creation = IProxyFactory::createProxyCall {
			masterCopy: self.system.recovery_master_copy,
			data: IRecoveryExtension::setupCall {
				recoverer,
				challengePeriod: challenge_period,
			}
			.abi_encode()
			.into(),
		};
		let install = IInstaller::createAndAddExtensionCall {
			proxyFactory: self.system.proxy_factory,
			data: creation.abi_encode().into(),
		};
		let operation =
			Operation::delegate_call(self.system.extension_installer, install.abi_encode());
		let receipt = self.submit(safe, &operation, signers).unwrap();
		created_proxy(&receipt)
	}

	/// Recoverer signature over a trigger request at the extension's nonce.
	pub fn sign_trigger(
		&self,
		recoverer: &PrivateKeySigner,
		extension: Address,
		owner_index: u64,
		old_owner: Address,
		new_owner: Address,
	) -> SignatureTuple {
		let hash = self
			.ledger
			.recovery_hash(extension, ACTION_TRIGGER, owner_index, old_owner, new_owner)
			.unwrap();
		sign(recoverer, &hash)
	}
}
