//! Recovery extension: time-delayed, single-signer owner replacement.
//!
//! The designated recoverer signs a request to swap one owner of the bound Safe
//! for another. The request sits in `Pending` for a challenge period, during
//! which the recoverer can cancel it. After the period anyone can complete it,
//! which replaces the owner through the Safe's extension dispatch path.
//!
//! ```text
//!   Idle --trigger--> Pending --cancel----> Idle
//!                        |
//!                        +-----complete---> Idle
//! ```
//!
//! Every trigger or cancel consumes the recovery nonce, which is part of the
//! signed request, so a signature can be used at most once.

use crate::{ledger::Frame, Contract, Ledger, Receipt, SafeError};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use safe_types::{
	interfaces::{
		IRecoveryExtension::{self, IRecoveryExtensionCalls},
		ISafe,
	},
	truncate_id,
	utils::{
		compute_domain_hash, compute_final_digest, Eip712AbiEncoder, NAME_RECOVERY_EXTENSION,
		RECOVERY_REQUEST_TYPE,
	},
	CallKind, SafeEvent, SignatureTuple,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Action tag of a signed trigger request.
pub const ACTION_TRIGGER: u8 = 1;
/// Action tag of a signed cancel request.
pub const ACTION_CANCEL: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
	Idle,
	Pending,
}

/// A triggered, not yet completed owner replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecovery {
	pub owner_index: u64,
	pub old_owner: Address,
	pub new_owner: Address,
	pub trigger_time: u64,
	/// Encoded `replaceOwner` call the Safe will execute.
	pub call_data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryExtension {
	safe: Address,
	recoverer: Address,
	challenge_period: u64,
	nonce: U256,
	pending: Option<PendingRecovery>,
	initialized: bool,
}

impl RecoveryExtension {
	/// Safe this extension acts on.
	pub fn safe(&self) -> Address {
		self.safe
	}

	pub fn recoverer(&self) -> Address {
		self.recoverer
	}

	pub fn challenge_period(&self) -> u64 {
		self.challenge_period
	}

	pub fn nonce(&self) -> U256 {
		self.nonce
	}

	pub fn state(&self) -> RecoveryState {
		match self.pending {
			Some(_) => RecoveryState::Pending,
			None => RecoveryState::Idle,
		}
	}

	pub fn pending(&self) -> Option<&PendingRecovery> {
		self.pending.as_ref()
	}

	/// Trigger time of the pending request, zero when idle.
	pub fn trigger_time(&self) -> u64 {
		self.pending.as_ref().map_or(0, |p| p.trigger_time)
	}

	/// Earliest time the pending request can be completed.
	pub fn ready_at(&self) -> Option<u64> {
		self.pending
			.as_ref()
			.map(|p| p.trigger_time.saturating_add(self.challenge_period))
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	fn ensure_initialized(&self, this: Address) -> Result<(), SafeError> {
		if !self.initialized {
			return Err(SafeError::NotInitialized(this));
		}
		Ok(())
	}
}

/// EIP-712 digest the recoverer signs for a trigger or cancel request.
pub fn recovery_request_hash(
	chain_id: u64,
	extension: Address,
	action: u8,
	nonce: U256,
	owner_index: u64,
	old_owner: Address,
	new_owner: Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::for_type(RECOVERY_REQUEST_TYPE);
	enc.push_u8(action);
	enc.push_u256(nonce);
	enc.push_u64(owner_index);
	enc.push_address(&old_owner);
	enc.push_address(&new_owner);
	let struct_hash = enc.struct_hash();

	let domain = compute_domain_hash(NAME_RECOVERY_EXTENSION, chain_id, &extension);
	compute_final_digest(&domain, &struct_hash)
}

fn verify_recoverer(
	recoverer: Address,
	hash: &B256,
	signature: SignatureTuple,
) -> Result<(), SafeError> {
	let signer = signature
		.recover(hash)
		.map_err(|e| SafeError::SignatureInvalid(e.to_string()))?;
	if signer != recoverer {
		return Err(SafeError::NotRecoverer(signer));
	}
	Ok(())
}

impl Ledger {
	pub fn recovery(&self, address: Address) -> Result<&RecoveryExtension, SafeError> {
		match self.contract(address) {
			Some(Contract::Recovery(extension)) => Ok(extension),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	fn recovery_mut(&mut self, address: Address) -> Result<&mut RecoveryExtension, SafeError> {
		match self.contract_mut(address) {
			Some(Contract::Recovery(extension)) => Ok(extension),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	/// Digest for `action` at the extension's current nonce.
	pub fn recovery_hash(
		&self,
		extension: Address,
		action: u8,
		owner_index: u64,
		old_owner: Address,
		new_owner: Address,
	) -> Result<B256, SafeError> {
		let nonce = self.recovery(extension)?.nonce;
		Ok(recovery_request_hash(
			self.chain_id(),
			extension,
			action,
			nonce,
			owner_index,
			old_owner,
			new_owner,
		))
	}

	pub fn trigger_recovery(
		&mut self,
		sender: Address,
		extension: Address,
		owner_index: u64,
		old_owner: Address,
		new_owner: Address,
		signature: SignatureTuple,
	) -> Result<Receipt, SafeError> {
		let call = IRecoveryExtension::triggerRecoveryCall {
			ownerIndex: owner_index,
			oldOwner: old_owner,
			newOwner: new_owner,
			v: signature.v,
			r: signature.r,
			s: signature.s,
		};
		self.call(sender, extension, U256::ZERO, call.abi_encode())
	}

	pub fn cancel_recovery(
		&mut self,
		sender: Address,
		extension: Address,
		signature: SignatureTuple,
	) -> Result<Receipt, SafeError> {
		let call = IRecoveryExtension::cancelRecoveryCall {
			v: signature.v,
			r: signature.r,
			s: signature.s,
		};
		self.call(sender, extension, U256::ZERO, call.abi_encode())
	}

	pub fn complete_recovery(
		&mut self,
		sender: Address,
		extension: Address,
		data: impl Into<Bytes>,
	) -> Result<Receipt, SafeError> {
		let call = IRecoveryExtension::completeRecoveryCall { data: data.into() };
		self.call(sender, extension, U256::ZERO, call.abi_encode())
	}

	pub(crate) fn recovery_call(
		&mut self,
		frame: Frame,
		this: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		let call = IRecoveryExtensionCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("recovery extension: {}", e)))?;

		match call {
			IRecoveryExtensionCalls::setup(c) => {
				let extension = self.recovery_mut(this)?;
				if extension.initialized {
					return Err(SafeError::AlreadyInitialized(this));
				}
				if c.recoverer.is_zero() || c.challengePeriod == 0 {
					return Err(SafeError::InvalidSetup(
						"recoverer and challenge period must be non-zero".into(),
					));
				}
				extension.safe = frame.sender;
				extension.recoverer = c.recoverer;
				extension.challenge_period = c.challengePeriod;
				extension.initialized = true;
				Ok(Bytes::new())
			},
			IRecoveryExtensionCalls::triggerRecovery(c) => self.recovery_trigger(this, c),
			IRecoveryExtensionCalls::cancelRecovery(c) => self.recovery_cancel(this, c),
			IRecoveryExtensionCalls::completeRecovery(c) => {
				self.recovery_complete(frame, this, c.data)
			},
		}
	}

	#[instrument(skip_all, fields(extension = %truncate_id(&this.to_string())))]
	fn recovery_trigger(
		&mut self,
		this: Address,
		call: IRecoveryExtension::triggerRecoveryCall,
	) -> Result<Bytes, SafeError> {
		// Zero marks an idle extension, so a pending request never records it.
		let now = self.now().max(1);
		let hash = {
			let extension = self.recovery(this)?;
			extension.ensure_initialized(this)?;
			self.recovery_hash(
				this,
				ACTION_TRIGGER,
				call.ownerIndex,
				call.oldOwner,
				call.newOwner,
			)?
		};
		debug!(hash = %hash, "computed trigger hash");

		let extension = self.recovery_mut(this)?;
		verify_recoverer(
			extension.recoverer,
			&hash,
			SignatureTuple::new(call.v, call.r, call.s),
		)?;
		if extension.pending.is_some() {
			return Err(SafeError::RecoveryAlreadyPending);
		}

		extension.nonce += U256::from(1);
		extension.pending = Some(PendingRecovery {
			owner_index: call.ownerIndex,
			old_owner: call.oldOwner,
			new_owner: call.newOwner,
			trigger_time: now,
			call_data: ISafe::replaceOwnerCall {
				oldOwnerIndex: call.ownerIndex,
				oldOwner: call.oldOwner,
				newOwner: call.newOwner,
			}
			.abi_encode()
			.into(),
		});

		info!(
			old_owner = %call.oldOwner,
			new_owner = %call.newOwner,
			trigger_time = now,
			"recovery triggered"
		);
		self.emit(SafeEvent::RecoveryTriggered {
			extension: this,
			old_owner: call.oldOwner,
			new_owner: call.newOwner,
			trigger_time: now,
		});
		Ok(Bytes::new())
	}

	#[instrument(skip_all, fields(extension = %truncate_id(&this.to_string())))]
	fn recovery_cancel(
		&mut self,
		this: Address,
		call: IRecoveryExtension::cancelRecoveryCall,
	) -> Result<Bytes, SafeError> {
		let extension = self.recovery(this)?;
		extension.ensure_initialized(this)?;
		let pending = extension
			.pending
			.as_ref()
			.ok_or(SafeError::NoRecoveryPending)?;
		let hash = self.recovery_hash(
			this,
			ACTION_CANCEL,
			pending.owner_index,
			pending.old_owner,
			pending.new_owner,
		)?;
		debug!(hash = %hash, "computed cancel hash");

		let extension = self.recovery_mut(this)?;
		verify_recoverer(
			extension.recoverer,
			&hash,
			SignatureTuple::new(call.v, call.r, call.s),
		)?;
		extension.nonce += U256::from(1);
		extension.pending = None;

		info!("recovery cancelled");
		self.emit(SafeEvent::RecoveryCancelled { extension: this });
		Ok(Bytes::new())
	}

	#[instrument(skip_all, fields(extension = %truncate_id(&this.to_string())))]
	fn recovery_complete(
		&mut self,
		frame: Frame,
		this: Address,
		data: Bytes,
	) -> Result<Bytes, SafeError> {
		let now = self.now();
		let extension = self.recovery(this)?;
		extension.ensure_initialized(this)?;
		let pending = match &extension.pending {
			Some(pending) if pending.call_data == data => pending.clone(),
			_ => return Err(SafeError::OperationMismatch),
		};
		let ready_at = pending
			.trigger_time
			.saturating_add(extension.challenge_period);
		if now < ready_at {
			return Err(SafeError::ChallengePeriodNotElapsed { ready_at, now });
		}
		let safe = extension.safe;

		let dispatch = ISafe::dispatchFromExtensionCall {
			to: safe,
			value: U256::ZERO,
			data,
			operation: CallKind::Call.as_u8(),
			extension: this,
		};
		self.invoke(frame.next(this), safe, U256::ZERO, &dispatch.abi_encode())?;
		self.recovery_mut(this)?.pending = None;

		info!(
			old_owner = %pending.old_owner,
			new_owner = %pending.new_owner,
			"recovery completed"
		);
		self.emit(SafeEvent::RecoveryCompleted {
			extension: this,
			old_owner: pending.old_owner,
			new_owner: pending.new_owner,
		});
		Ok(Bytes::new())
	}
}
