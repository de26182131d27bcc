//! Event types emitted while executing transactions.
//!
//! Events are collected per top-level transaction and returned in its receipt.
//! Events raised inside a call that is rolled back are discarded together with
//! the rest of that call's effects.

use crate::CallKind;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// All events the ledger can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SafeEvent {
	/// A quorum-authorized operation executed successfully.
	ExecutionSuccess {
		safe: Address,
		tx_hash: B256,
		nonce: U256,
	},
	/// A quorum-authorized operation failed; its nonce is still consumed.
	ExecutionFailed {
		safe: Address,
		tx_hash: B256,
		nonce: U256,
		reason: String,
	},
	/// An enabled module executed an operation.
	ModuleExecution {
		safe: Address,
		module: Address,
		to: Address,
		value: U256,
	},
	/// An enabled extension executed an operation.
	ExtensionExecution {
		safe: Address,
		extension: Address,
		to: Address,
		value: U256,
		kind: CallKind,
	},
	AddedOwner { safe: Address, owner: Address },
	RemovedOwner { safe: Address, owner: Address },
	ReplacedOwner {
		safe: Address,
		old_owner: Address,
		new_owner: Address,
	},
	ChangedThreshold { safe: Address, threshold: u8 },
	EnabledModule { safe: Address, module: Address },
	DisabledModule { safe: Address, module: Address },
	AddedExtension { safe: Address, extension: Address },
	RemovedExtension { safe: Address, extension: Address },
	/// A new instance was created from a master copy.
	ProxyCreation { proxy: Address, master_copy: Address },
	/// A daily-limit window rolled over before a spend was applied.
	DailyLimitReset {
		module: Address,
		asset: Address,
		window_start: u64,
	},
	DailyLimitSpent {
		module: Address,
		asset: Address,
		to: Address,
		amount: U256,
		spent_today: U256,
	},
	DailyLimitChanged {
		module: Address,
		asset: Address,
		daily_limit: U256,
	},
	RecoveryTriggered {
		extension: Address,
		old_owner: Address,
		new_owner: Address,
		trigger_time: u64,
	},
	RecoveryCancelled { extension: Address },
	RecoveryCompleted {
		extension: Address,
		old_owner: Address,
		new_owner: Address,
	},
	/// Value moved between accounts. `asset` is zero for ether.
	Transfer {
		asset: Address,
		from: Address,
		to: Address,
		amount: U256,
	},
}
