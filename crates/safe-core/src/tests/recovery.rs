//! Recovery extension lifecycle and extension dispatch rules.

use super::fixtures::*;
use crate::{
	extensions::{RecoveryState, ACTION_CANCEL},
	SafeError,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use safe_types::{
	interfaces::{IRecoveryExtension, ISafe},
	CallKind, Operation, SafeEvent,
};

const CHALLENGE_PERIOD: u64 = 3 * 24 * 3600;

struct RecoverySetup {
	env: TestEnv,
	safe: Address,
	extension: Address,
	recoverer: PrivateKeySigner,
	owners: Vec<PrivateKeySigner>,
}

/// Two owners, threshold 2, recovery extension with the fifth key as recoverer.
fn recovery_setup() -> RecoverySetup {
	let mut env = TestEnv::new();
	let mut accounts = test_accounts();
	let recoverer = accounts.remove(4);
	let owners: Vec<_> = accounts.drain(..2).collect();
	let signers: Vec<&PrivateKeySigner> = owners.iter().collect();

	let safe = env.deploy_safe(&signers, 2, ether(1));
	let extension = env.install_recovery(safe, &signers, recoverer.address(), CHALLENGE_PERIOD);
	RecoverySetup {
		env,
		safe,
		extension,
		recoverer,
		owners,
	}
}

impl RecoverySetup {
	fn trigger(&mut self, old_owner: Address, new_owner: Address) -> Result<(), SafeError> {
		let index = self
			.env
			.ledger
			.safe(self.safe)
			.unwrap()
			.owners()
			.iter()
			.position(|o| *o == old_owner)
			.unwrap_or(0) as u64;
		let signature =
			self.env
				.sign_trigger(&self.recoverer, self.extension, index, old_owner, new_owner);
		self.env
			.ledger
			.trigger_recovery(
				self.env.relayer,
				self.extension,
				index,
				old_owner,
				new_owner,
				signature,
			)
			.map(|_| ())
	}

	fn pending_data(&self) -> Bytes {
		self.env
			.ledger
			.recovery(self.extension)
			.unwrap()
			.pending()
			.unwrap()
			.call_data
			.clone()
	}

	fn cancel_signature(&self) -> safe_types::SignatureTuple {
		let pending = self
			.env
			.ledger
			.recovery(self.extension)
			.unwrap()
			.pending()
			.cloned()
			.unwrap();
		let hash = self
			.env
			.ledger
			.recovery_hash(
				self.extension,
				ACTION_CANCEL,
				pending.owner_index,
				pending.old_owner,
				pending.new_owner,
			)
			.unwrap();
		sign(&self.recoverer, &hash)
	}
}

#[test]
fn test_extension_is_bound_and_enabled() {
	let setup = recovery_setup();
	let ext = setup.env.ledger.recovery(setup.extension).unwrap();
	assert_eq!(ext.safe(), setup.safe);
	assert_eq!(ext.recoverer(), setup.recoverer.address());
	assert_eq!(ext.state(), RecoveryState::Idle);
	assert_eq!(
		setup.env.ledger.safe(setup.safe).unwrap().extensions(),
		&[setup.extension]
	);
}

#[test]
fn test_trigger_time_is_non_zero_at_clock_zero() {
	let mut setup = recovery_setup();
	setup.env.clock.set(0);
	let old_owner = setup.owners[0].address();
	setup.trigger(old_owner, Address::repeat_byte(0x55)).unwrap();

	let extension = setup.env.ledger.recovery(setup.extension).unwrap();
	assert_eq!(extension.state(), RecoveryState::Pending);
	assert_eq!(extension.trigger_time(), 1);
	assert_eq!(extension.ready_at(), Some(1 + CHALLENGE_PERIOD));
}

#[test]
fn test_complete_only_after_challenge_period() {
	let mut setup = recovery_setup();
	let lost = setup.owners[1].address();
	let replacement = Address::repeat_byte(0x5a);

	setup.trigger(lost, replacement).unwrap();
	let ext = setup.env.ledger.recovery(setup.extension).unwrap();
	assert_eq!(ext.state(), RecoveryState::Pending);
	assert_eq!(ext.trigger_time(), START);
	assert_eq!(ext.nonce(), U256::from(1));
	let data = setup.pending_data();

	setup.env.clock.advance(CHALLENGE_PERIOD - 1);
	let err = setup
		.env
		.ledger
		.complete_recovery(setup.env.relayer, setup.extension, data.clone())
		.unwrap_err();
	assert_eq!(
		err,
		SafeError::ChallengePeriodNotElapsed {
			ready_at: START + CHALLENGE_PERIOD,
			now: START + CHALLENGE_PERIOD - 1
		}
	);

	setup.env.clock.advance(1);
	let receipt = setup
		.env
		.ledger
		.complete_recovery(Address::repeat_byte(0x01), setup.extension, data)
		.unwrap();
	assert!(receipt.events.contains(&SafeEvent::ReplacedOwner {
		safe: setup.safe,
		old_owner: lost,
		new_owner: replacement
	}));

	let safe = setup.env.ledger.safe(setup.safe).unwrap();
	assert_eq!(safe.owners(), &[setup.owners[0].address(), replacement]);
	// Recovery bypasses the quorum nonce.
	assert_eq!(safe.nonce(), U256::from(1));
	let ext = setup.env.ledger.recovery(setup.extension).unwrap();
	assert_eq!(ext.state(), RecoveryState::Idle);
	assert_eq!(ext.trigger_time(), 0);
}

#[test]
fn test_trigger_signature_cannot_be_replayed() {
	let mut setup = recovery_setup();
	let lost = setup.owners[0].address();
	let replacement = Address::repeat_byte(0x5a);

	let signature =
		setup
			.env
			.sign_trigger(&setup.recoverer, setup.extension, 0, lost, replacement);
	setup
		.env
		.ledger
		.trigger_recovery(setup.env.relayer, setup.extension, 0, lost, replacement, signature)
		.unwrap();
	let data = setup.pending_data();
	setup.env.clock.advance(CHALLENGE_PERIOD);
	setup
		.env
		.ledger
		.complete_recovery(setup.env.relayer, setup.extension, data)
		.unwrap();

	let err = setup
		.env
		.ledger
		.trigger_recovery(setup.env.relayer, setup.extension, 0, lost, replacement, signature)
		.unwrap_err();
	assert!(matches!(
		err,
		SafeError::NotRecoverer(_) | SafeError::SignatureInvalid(_)
	));
	assert_eq!(
		setup.env.ledger.recovery(setup.extension).unwrap().state(),
		RecoveryState::Idle
	);
}

#[test]
fn test_cancel_without_pending_recovery() {
	let mut setup = recovery_setup();
	let hash = setup
		.env
		.ledger
		.recovery_hash(setup.extension, ACTION_CANCEL, 0, Address::ZERO, Address::ZERO)
		.unwrap();
	let err = setup
		.env
		.ledger
		.cancel_recovery(setup.env.relayer, setup.extension, sign(&setup.recoverer, &hash))
		.unwrap_err();
	assert_eq!(err, SafeError::NoRecoveryPending);
}

#[test]
fn test_cancel_then_stale_complete() {
	let mut setup = recovery_setup();
	let lost = setup.owners[1].address();
	setup.trigger(lost, Address::repeat_byte(0x5a)).unwrap();
	let data = setup.pending_data();

	let signature = setup.cancel_signature();
	setup
		.env
		.ledger
		.cancel_recovery(setup.env.relayer, setup.extension, signature)
		.unwrap();
	let ext = setup.env.ledger.recovery(setup.extension).unwrap();
	assert_eq!(ext.state(), RecoveryState::Idle);
	assert_eq!(ext.trigger_time(), 0);
	assert_eq!(ext.nonce(), U256::from(2));

	setup.env.clock.advance(CHALLENGE_PERIOD);
	let err = setup
		.env
		.ledger
		.complete_recovery(setup.env.relayer, setup.extension, data)
		.unwrap_err();
	assert_eq!(err, SafeError::OperationMismatch);

	// The cancel signature is spent as well.
	setup.trigger(lost, Address::repeat_byte(0x5b)).unwrap();
	let err = setup
		.env
		.ledger
		.cancel_recovery(setup.env.relayer, setup.extension, signature)
		.unwrap_err();
	assert!(matches!(
		err,
		SafeError::NotRecoverer(_) | SafeError::SignatureInvalid(_)
	));
}

#[test]
fn test_second_trigger_while_pending() {
	let mut setup = recovery_setup();
	let lost = setup.owners[1].address();
	setup.trigger(lost, Address::repeat_byte(0x5a)).unwrap();
	assert_eq!(
		setup.trigger(lost, Address::repeat_byte(0x5b)),
		Err(SafeError::RecoveryAlreadyPending)
	);
	assert_eq!(
		setup.env.ledger.recovery(setup.extension).unwrap().nonce(),
		U256::from(1)
	);
}

#[test]
fn test_only_recoverer_can_trigger_or_cancel() {
	let mut setup = recovery_setup();
	let lost = setup.owners[1].address();
	let replacement = Address::repeat_byte(0x5a);

	let forged =
		setup
			.env
			.sign_trigger(&setup.owners[0], setup.extension, 1, lost, replacement);
	let err = setup
		.env
		.ledger
		.trigger_recovery(setup.env.relayer, setup.extension, 1, lost, replacement, forged)
		.unwrap_err();
	assert_eq!(err, SafeError::NotRecoverer(setup.owners[0].address()));

	setup.trigger(lost, replacement).unwrap();
	let pending = setup
		.env
		.ledger
		.recovery(setup.extension)
		.unwrap()
		.pending()
		.cloned()
		.unwrap();
	let hash = setup
		.env
		.ledger
		.recovery_hash(
			setup.extension,
			ACTION_CANCEL,
			pending.owner_index,
			pending.old_owner,
			pending.new_owner,
		)
		.unwrap();
	let err = setup
		.env
		.ledger
		.cancel_recovery(setup.env.relayer, setup.extension, sign(&setup.owners[1], &hash))
		.unwrap_err();
	assert_eq!(err, SafeError::NotRecoverer(setup.owners[1].address()));
}

#[test]
fn test_complete_with_moved_owner_fails_and_stays_pending() {
	let mut setup = recovery_setup();
	let lost = setup.owners[1].address();
	setup.trigger(lost, Address::repeat_byte(0x5a)).unwrap();
	let data = setup.pending_data();

	// The owners remove the lost key themselves, shifting indices.
	let signers: Vec<&PrivateKeySigner> = setup.owners.iter().collect();
	let remove = ISafe::removeOwnerCall {
		ownerIndex: 1,
		owner: lost,
		threshold: 1,
	};
	setup
		.env
		.submit(
			setup.safe,
			&Operation::call(setup.safe, U256::ZERO, remove.abi_encode()),
			&signers,
		)
		.unwrap();

	setup.env.clock.advance(CHALLENGE_PERIOD);
	let err = setup
		.env
		.ledger
		.complete_recovery(setup.env.relayer, setup.extension, data)
		.unwrap_err();
	assert!(matches!(err, SafeError::OperationExecutionFailed { .. }));
	assert_eq!(
		setup.env.ledger.recovery(setup.extension).unwrap().state(),
		RecoveryState::Pending
	);
}

#[test]
fn test_extension_cannot_target_itself() {
	let mut setup = recovery_setup();
	let complete = IRecoveryExtension::completeRecoveryCall {
		data: Bytes::new(),
	}
	.abi_encode();
	let cases = [
		Operation::call(setup.extension, U256::ZERO, complete.clone()),
		Operation::call(setup.extension, U256::from(7), Vec::<u8>::new()),
		Operation::delegate_call(setup.extension, complete),
	];

	for operation in &cases {
		for sender in [setup.extension, setup.safe, setup.env.relayer] {
			let err = setup
				.env
				.ledger
				.dispatch_from_extension(sender, setup.safe, operation, setup.extension)
				.unwrap_err();
			assert_eq!(err, SafeError::SelfTargetForbidden(setup.extension));
		}
	}
}

#[test]
fn test_extension_dispatch_caller_checks() {
	let mut setup = recovery_setup();
	let payout = Operation::transfer(Address::repeat_byte(0x66), U256::from(1));

	// Naming the extension is not enough; the caller must be it.
	let relayer = setup.env.relayer;
	assert_eq!(
		setup
			.env
			.ledger
			.dispatch_from_extension(relayer, setup.safe, &payout, setup.extension),
		Err(SafeError::NotAuthorizedCaller(relayer))
	);

	let unknown = Address::repeat_byte(0x67);
	assert_eq!(
		setup
			.env
			.ledger
			.dispatch_from_extension(unknown, setup.safe, &payout, unknown),
		Err(SafeError::ExtensionNotEnabled(unknown))
	);

	let receipt = setup
		.env
		.ledger
		.dispatch_from_extension(setup.extension, setup.safe, &payout, setup.extension)
		.unwrap();
	assert!(receipt.events.iter().any(|e| matches!(
		e,
		SafeEvent::ExtensionExecution {
			kind: CallKind::Call,
			..
		}
	)));
}

#[test]
fn test_quorum_cannot_impersonate_extension() {
	let mut setup = recovery_setup();
	let signers: Vec<&PrivateKeySigner> = setup.owners.iter().collect();
	let forged = ISafe::dispatchFromExtensionCall {
		to: setup.safe,
		value: U256::ZERO,
		data: ISafe::changeThresholdCall { threshold: 1 }
			.abi_encode()
			.into(),
		operation: CallKind::Call.as_u8(),
		extension: setup.extension,
	};

	let err = setup
		.env
		.submit(
			setup.safe,
			&Operation::call(setup.safe, U256::ZERO, forged.abi_encode()),
			&signers,
		)
		.unwrap_err();
	assert!(err.keeps_state());
	assert_eq!(setup.env.ledger.safe(setup.safe).unwrap().threshold(), 2);
}
