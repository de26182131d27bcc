//! The execution environment every contract in this crate runs on.
//!
//! A [`Ledger`] is a totally ordered, single-threaded account store. Callers
//! run one top-level transaction at a time through [`Ledger::call`]; the
//! transaction either commits as a whole or leaves no trace. Contract behaviour
//! is native Rust, reached by routing ABI calldata on the kind of code stored
//! at the target account.
//!
//! Operations chosen by a Safe's owners, modules or extensions only ever run
//! through [`Ledger::execute_operation`].

use crate::{
	clock::Clock,
	extensions::RecoveryExtension,
	factory::{Installer, MasterCopy},
	modules::DailyLimitModule,
	token::Token,
	Safe, SafeError,
};
use alloy_primitives::{Address, Bytes, U256};
use safe_types::{truncate_id, CallKind, Operation, SafeEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maximum nesting of calls within one transaction.
pub const MAX_CALL_DEPTH: usize = 64;

/// Account that deploys genesis contracts.
pub const GENESIS_DEPLOYER: Address = Address::new([0xde; 20]);

/// Code stored at an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contract {
	Safe(Safe),
	DailyLimit(DailyLimitModule),
	Recovery(RecoveryExtension),
	Token(Token),
	ProxyFactory,
	MasterCopy { template: MasterCopy },
	Installer { library: Installer },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	pub balance: U256,
	/// Number of contracts this account has created.
	pub nonce: u64,
	pub code: Option<Contract>,
}

/// Everything a ledger persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
	pub chain_id: u64,
	pub accounts: BTreeMap<Address, Account>,
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
	pub events: Vec<SafeEvent>,
	pub return_data: Bytes,
}

/// Caller context of one nested call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
	pub sender: Address,
	pub depth: usize,
}

impl Frame {
	pub fn root(sender: Address) -> Self {
		Self { sender, depth: 0 }
	}

	/// Frame of a call made by `sender` from within this one.
	pub fn next(&self, sender: Address) -> Self {
		Self {
			sender,
			depth: self.depth + 1,
		}
	}
}

pub(crate) struct Checkpoint {
	state: LedgerState,
	events: usize,
}

#[derive(Clone, Copy)]
enum Route {
	Safe,
	DailyLimit,
	Recovery,
	Token,
	ProxyFactory,
	MasterCopy,
	Installer,
}

impl Contract {
	fn route(&self) -> Route {
		match self {
			Contract::Safe(_) => Route::Safe,
			Contract::DailyLimit(_) => Route::DailyLimit,
			Contract::Recovery(_) => Route::Recovery,
			Contract::Token(_) => Route::Token,
			Contract::ProxyFactory => Route::ProxyFactory,
			Contract::MasterCopy { .. } => Route::MasterCopy,
			Contract::Installer { .. } => Route::Installer,
		}
	}
}

#[derive(Debug)]
pub struct Ledger {
	state: LedgerState,
	events: Vec<SafeEvent>,
	clock: Arc<dyn Clock>,
}

impl Ledger {
	pub fn new(chain_id: u64, clock: Arc<dyn Clock>) -> Self {
		Self::from_state(
			LedgerState {
				chain_id,
				accounts: BTreeMap::new(),
			},
			clock,
		)
	}

	/// Resumes from a persisted state.
	pub fn from_state(state: LedgerState, clock: Arc<dyn Clock>) -> Self {
		Self {
			state,
			events: Vec::new(),
			clock,
		}
	}

	pub fn state(&self) -> &LedgerState {
		&self.state
	}

	pub fn chain_id(&self) -> u64 {
		self.state.chain_id
	}

	pub fn now(&self) -> u64 {
		self.clock.now()
	}

	pub fn balance(&self, address: Address) -> U256 {
		self.state
			.accounts
			.get(&address)
			.map(|a| a.balance)
			.unwrap_or_default()
	}

	pub fn contract(&self, address: Address) -> Option<&Contract> {
		self.state
			.accounts
			.get(&address)
			.and_then(|a| a.code.as_ref())
	}

	pub(crate) fn contract_mut(&mut self, address: Address) -> Option<&mut Contract> {
		self.state
			.accounts
			.get_mut(&address)
			.and_then(|a| a.code.as_mut())
	}

	/// Credits `amount` wei to `address` out of thin air. Genesis only.
	pub fn deal(&mut self, address: Address, amount: U256) {
		let account = self.state.accounts.entry(address).or_default();
		account.balance = account.balance.saturating_add(amount);
	}

	/// Places `code` at the next address of the genesis deployer.
	pub fn deploy(&mut self, code: Contract) -> Address {
		self.create_account(GENESIS_DEPLOYER, code)
	}

	/// Creates a contract account at `creator.create(nonce)` and bumps the
	/// creator's nonce.
	pub(crate) fn create_account(&mut self, creator: Address, code: Contract) -> Address {
		let creator_account = self.state.accounts.entry(creator).or_default();
		let address = creator.create(creator_account.nonce);
		creator_account.nonce += 1;
		self.state.accounts.entry(address).or_default().code = Some(code);
		debug!(address = %address, "created contract account");
		address
	}

	pub(crate) fn emit(&mut self, event: SafeEvent) {
		self.events.push(event);
	}

	pub(crate) fn checkpoint(&self) -> Checkpoint {
		Checkpoint {
			state: self.state.clone(),
			events: self.events.len(),
		}
	}

	pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
		self.state = checkpoint.state;
		self.events.truncate(checkpoint.events);
	}

	/// Runs one top-level transaction from `from`.
	///
	/// State changes are committed when the call succeeds, or when it fails with
	/// an error for which [`SafeError::keeps_state`] holds. Every other failure
	/// rolls the ledger back to where it was before the call.
	#[instrument(skip_all, fields(from = %truncate_id(&from.to_string()), to = %truncate_id(&to.to_string())))]
	pub fn call(
		&mut self,
		from: Address,
		to: Address,
		value: U256,
		data: impl Into<Bytes>,
	) -> Result<Receipt, SafeError> {
		let data = data.into();
		self.events.clear();
		let checkpoint = self.checkpoint();

		match self.invoke(Frame::root(from), to, value, &data) {
			Ok(return_data) => Ok(Receipt {
				events: std::mem::take(&mut self.events),
				return_data,
			}),
			Err(err) => {
				if !err.keeps_state() {
					self.restore(checkpoint);
				}
				self.events.clear();
				warn!(error = %err, "transaction failed");
				Err(err)
			},
		}
	}

	/// Runs a transaction submitted from outside the ledger.
	///
	/// Only accounts without code may originate one. A Safe, module or extension
	/// acts solely through the gated entry points of its own code.
	pub fn external_call(
		&mut self,
		from: Address,
		to: Address,
		value: U256,
		data: impl Into<Bytes>,
	) -> Result<Receipt, SafeError> {
		if self.contract(from).is_some() {
			warn!(from = %from, "rejected transaction from contract account");
			return Err(SafeError::ContractSender(from));
		}
		self.call(from, to, value, data)
	}

	/// Moves `value` from the frame's sender to `to`, then runs the code at `to`.
	pub(crate) fn invoke(
		&mut self,
		frame: Frame,
		to: Address,
		value: U256,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		if frame.depth > MAX_CALL_DEPTH {
			return Err(SafeError::CallDepthExceeded);
		}
		if !value.is_zero() {
			self.transfer_ether(frame.sender, to, value)?;
		}

		let Some(route) = self.contract(to).map(Contract::route) else {
			// Plain accounts accept anything.
			return Ok(Bytes::new());
		};
		debug!(to = %to, depth = frame.depth, "routing call");

		match route {
			Route::Safe => self.safe_call(frame, to, data),
			Route::DailyLimit => self.daily_limit_call(frame, to, data),
			Route::Recovery => self.recovery_call(frame, to, data),
			Route::Token => self.token_call(frame, to, data),
			Route::ProxyFactory => self.factory_call(frame, to, data),
			Route::MasterCopy => Err(SafeError::UnsupportedCall(format!(
				"master copy {} cannot be called directly",
				to
			))),
			Route::Installer => Err(SafeError::UnsupportedCall(format!(
				"installer {} only runs through delegatecall",
				to
			))),
		}
	}

	/// Executes `operation` on behalf of `safe`.
	///
	/// `frame` is the frame the Safe is currently running in. Any failure of the
	/// operation surfaces as [`SafeError::OperationExecutionFailed`].
	pub(crate) fn execute_operation(
		&mut self,
		frame: Frame,
		safe: Address,
		operation: &Operation,
	) -> Result<Bytes, SafeError> {
		let result = match operation.kind {
			CallKind::Call => self.invoke(
				frame.next(safe),
				operation.to,
				operation.value,
				&operation.data,
			),
			CallKind::DelegateCall => {
				self.delegate_call(frame.next(safe), safe, operation.to, &operation.data)
			},
		};

		result.map_err(|e| SafeError::OperationExecutionFailed {
			consumed_nonce: None,
			reason: e.to_string(),
		})
	}

	/// Runs the library at `target` in the storage context of `context`.
	fn delegate_call(
		&mut self,
		frame: Frame,
		context: Address,
		target: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		if frame.depth > MAX_CALL_DEPTH {
			return Err(SafeError::CallDepthExceeded);
		}
		match self.contract(target) {
			Some(Contract::Installer { library }) => {
				let library = *library;
				self.run_installer(frame, context, library, data)
			},
			_ => Err(SafeError::UnsupportedCall(format!(
				"delegatecall target {} is not an installer library",
				target
			))),
		}
	}

	fn transfer_ether(&mut self, from: Address, to: Address, amount: U256) -> Result<(), SafeError> {
		let available = self.balance(from);
		if available < amount {
			return Err(SafeError::InsufficientBalance {
				account: from,
				available,
				required: amount,
			});
		}
		self.state.accounts.entry(from).or_default().balance = available - amount;
		let recipient = self.state.accounts.entry(to).or_default();
		recipient.balance = recipient.balance.saturating_add(amount);
		self.emit(SafeEvent::Transfer {
			asset: Address::ZERO,
			from,
			to,
			amount,
		});
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;

	fn ledger() -> Ledger {
		Ledger::new(1, Arc::new(ManualClock::new(0)))
	}

	#[test]
	fn test_plain_transfer_commits() {
		let mut ledger = ledger();
		let alice = Address::repeat_byte(1);
		let bob = Address::repeat_byte(2);
		ledger.deal(alice, U256::from(100));

		let receipt = ledger.call(alice, bob, U256::from(40), Bytes::new()).unwrap();
		assert_eq!(ledger.balance(alice), U256::from(60));
		assert_eq!(ledger.balance(bob), U256::from(40));
		assert_eq!(receipt.events.len(), 1);
	}

	#[test]
	fn test_external_call_rejects_contract_sender() {
		let mut ledger = ledger();
		let installer = ledger.deploy(Contract::Installer {
			library: Installer::ModuleInstaller,
		});
		ledger.deal(installer, U256::from(10));
		let before = ledger.state().clone();

		let err = ledger
			.external_call(installer, Address::repeat_byte(2), U256::from(10), Bytes::new())
			.unwrap_err();
		assert_eq!(err, SafeError::ContractSender(installer));
		assert_eq!(ledger.state(), &before);

		let alice = Address::repeat_byte(1);
		ledger.deal(alice, U256::from(3));
		ledger
			.external_call(alice, Address::repeat_byte(2), U256::from(3), Bytes::new())
			.unwrap();
		assert_eq!(ledger.balance(alice), U256::ZERO);
	}

	#[test]
	fn test_failed_call_rolls_back() {
		let mut ledger = ledger();
		let alice = Address::repeat_byte(1);
		let installer = ledger.deploy(Contract::Installer {
			library: Installer::ModuleInstaller,
		});
		ledger.deal(alice, U256::from(10));
		let before = ledger.state().clone();

		// Value moves first, then the direct call to the library fails.
		let err = ledger
			.call(alice, installer, U256::from(5), vec![0u8; 4])
			.unwrap_err();
		assert!(matches!(err, SafeError::UnsupportedCall(_)));
		assert_eq!(ledger.state(), &before);
	}

	#[test]
	fn test_insufficient_balance() {
		let mut ledger = ledger();
		let err = ledger
			.call(
				Address::repeat_byte(1),
				Address::repeat_byte(2),
				U256::from(1),
				Bytes::new(),
			)
			.unwrap_err();
		assert!(matches!(err, SafeError::InsufficientBalance { .. }));
	}

	#[test]
	fn test_deploy_addresses_follow_deployer_nonce() {
		let mut ledger = ledger();
		let first = ledger.deploy(Contract::ProxyFactory);
		let second = ledger.deploy(Contract::ProxyFactory);
		assert_eq!(first, GENESIS_DEPLOYER.create(0));
		assert_eq!(second, GENESIS_DEPLOYER.create(1));
	}

	#[test]
	fn test_state_survives_json() {
		let mut ledger = ledger();
		ledger.deploy(Contract::MasterCopy {
			template: MasterCopy::Safe,
		});
		ledger.deal(Address::repeat_byte(7), U256::from(5));

		let json = serde_json::to_string(ledger.state()).unwrap();
		let restored: LedgerState = serde_json::from_str(&json).unwrap();
		assert_eq!(&restored, ledger.state());
	}
}
