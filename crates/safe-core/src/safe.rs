//! The authorization core.
//!
//! A [`Safe`] holds its owner set, the primary nonce and the registries of
//! enabled modules and extensions. Three entry points lead to an operation
//! being executed:
//!
//! - `submit`: the owner quorum path. Consumes one nonce per authorized
//!   operation, even when the operation itself fails.
//! - `dispatchFromModule`: an enabled module runs a plain call.
//! - `dispatchFromExtension`: an enabled extension runs an operation of its
//!   choosing, never targeting itself.
//!
//! All administration (owners, threshold, registries) is only accepted from
//! the Safe itself, so it is reachable only through one of these paths.

use crate::{
	ledger::{Frame, Receipt},
	owners::checked_index,
	Contract, Ledger, OwnerSet, SafeError, SignatureQuorum,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use safe_types::{
	interfaces::ISafe::{self, ISafeCalls},
	truncate_id,
	utils::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder, NAME_SAFE, SAFE_TX_TYPE},
	CallKind, Operation, SafeEvent, SignatureTuple,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// State of one Safe account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Safe {
	owners: OwnerSet,
	/// Next nonce the quorum path accepts.
	nonce: U256,
	/// Enabled modules, in enabling order.
	modules: Vec<Address>,
	/// Enabled extensions, in enabling order.
	extensions: Vec<Address>,
	/// Set once by `setup`.
	initialized: bool,
}

impl Safe {
	/// Owners in their stored order.
	pub fn owners(&self) -> &[Address] {
		self.owners.owners()
	}

	pub fn owner_set(&self) -> &OwnerSet {
		&self.owners
	}

	/// Signatures required by `submit`.
	pub fn threshold(&self) -> u8 {
		self.owners.threshold()
	}

	/// Nonce the next submitted transaction must carry.
	pub fn nonce(&self) -> U256 {
		self.nonce
	}

	/// Modules allowed to call `dispatchFromModule`.
	pub fn modules(&self) -> &[Address] {
		&self.modules
	}

	/// Extensions allowed to call `dispatchFromExtension`.
	pub fn extensions(&self) -> &[Address] {
		&self.extensions
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	pub fn is_module_enabled(&self, module: &Address) -> bool {
		self.modules.contains(module)
	}

	pub fn is_extension_enabled(&self, extension: &Address) -> bool {
		self.extensions.contains(extension)
	}
}

/// EIP-712 digest the owners sign to authorize `operation` at `nonce`.
pub fn safe_tx_hash(chain_id: u64, safe: Address, operation: &Operation, nonce: U256) -> B256 {
	let mut enc = Eip712AbiEncoder::for_type(SAFE_TX_TYPE);
	enc.push_address(&operation.to);
	enc.push_u256(operation.value);
	enc.push_bytes(&operation.data);
	enc.push_u8(operation.kind.as_u8());
	enc.push_u256(nonce);
	let struct_hash = enc.struct_hash();

	let domain = compute_domain_hash(NAME_SAFE, chain_id, &safe);
	compute_final_digest(&domain, &struct_hash)
}

fn call_kind(operation: u8) -> Result<CallKind, SafeError> {
	CallKind::try_from(operation)
		.map_err(|k| SafeError::UnsupportedCall(format!("unknown operation kind {}", k)))
}

fn signature_tuples(v: &[u8], r: &[B256], s: &[B256]) -> Result<Vec<SignatureTuple>, SafeError> {
	if v.len() != r.len() || v.len() != s.len() {
		return Err(SafeError::SignatureInvalid(format!(
			"signature component lengths differ: v={}, r={}, s={}",
			v.len(),
			r.len(),
			s.len()
		)));
	}
	Ok(v
		.iter()
		.zip(r)
		.zip(s)
		.map(|((v, r), s)| SignatureTuple::new(*v, *r, *s))
		.collect())
}

impl Ledger {
	/// The Safe at `address`, or `UnknownContract` for any other account.
	pub fn safe(&self, address: Address) -> Result<&Safe, SafeError> {
		match self.contract(address) {
			Some(Contract::Safe(safe)) => Ok(safe),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	fn safe_mut(&mut self, address: Address) -> Result<&mut Safe, SafeError> {
		match self.contract_mut(address) {
			Some(Contract::Safe(safe)) => Ok(safe),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	/// Digest the owners of `safe` must sign for `operation` at `nonce`.
	pub fn transaction_hash(&self, safe: Address, operation: &Operation, nonce: U256) -> B256 {
		safe_tx_hash(self.chain_id(), safe, operation, nonce)
	}

	/// Submits a quorum-signed operation to `safe`, relayed by `sender`.
	///
	/// `signatures` must be ordered by ascending signer address.
	pub fn submit(
		&mut self,
		sender: Address,
		safe: Address,
		operation: &Operation,
		nonce: U256,
		signatures: &[SignatureTuple],
	) -> Result<Receipt, SafeError> {
		let call = ISafe::submitCall {
			to: operation.to,
			value: operation.value,
			data: operation.data.clone(),
			operation: operation.kind.as_u8(),
			nonce,
			v: signatures.iter().map(|s| s.v).collect(),
			r: signatures.iter().map(|s| s.r).collect(),
			s: signatures.iter().map(|s| s.s).collect(),
		};
		self.call(sender, safe, U256::ZERO, call.abi_encode())
	}

	/// Calls `dispatchFromModule` on `safe` with `module` as the caller.
	pub fn dispatch_from_module(
		&mut self,
		module: Address,
		safe: Address,
		operation: &Operation,
	) -> Result<Receipt, SafeError> {
		let call = ISafe::dispatchFromModuleCall {
			to: operation.to,
			value: operation.value,
			data: operation.data.clone(),
			operation: operation.kind.as_u8(),
		};
		self.call(module, safe, U256::ZERO, call.abi_encode())
	}

	/// Calls `dispatchFromExtension` on `safe` from `sender`, naming `extension`.
	pub fn dispatch_from_extension(
		&mut self,
		sender: Address,
		safe: Address,
		operation: &Operation,
		extension: Address,
	) -> Result<Receipt, SafeError> {
		let call = ISafe::dispatchFromExtensionCall {
			to: operation.to,
			value: operation.value,
			data: operation.data.clone(),
			operation: operation.kind.as_u8(),
			extension,
		};
		self.call(sender, safe, U256::ZERO, call.abi_encode())
	}

	pub(crate) fn safe_call(
		&mut self,
		frame: Frame,
		this: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		if data.is_empty() {
			// Plain deposit.
			return Ok(Bytes::new());
		}
		let call = ISafeCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("safe: {}", e)))?;

		match call {
			ISafeCalls::setup(c) => self.safe_setup(frame, this, c),
			ISafeCalls::submit(c) => self.safe_submit(frame, this, c),
			ISafeCalls::dispatchFromModule(c) => self.safe_dispatch_from_module(frame, this, c),
			ISafeCalls::dispatchFromExtension(c) => {
				self.safe_dispatch_from_extension(frame, this, c)
			},
			admin => {
				if frame.sender != this {
					return Err(SafeError::NotAuthorizedCaller(frame.sender));
				}
				self.safe_admin(this, admin)?;
				Ok(Bytes::new())
			},
		}
	}

	#[instrument(skip_all, fields(safe = %truncate_id(&this.to_string())))]
	fn safe_setup(
		&mut self,
		frame: Frame,
		this: Address,
		call: ISafe::setupCall,
	) -> Result<Bytes, SafeError> {
		let safe = self.safe_mut(this)?;
		if safe.initialized {
			return Err(SafeError::AlreadyInitialized(this));
		}
		if call.owners.contains(&this) {
			return Err(SafeError::InvalidOwner(this));
		}
		safe.owners = OwnerSet::new(call.owners, call.threshold)?;
		safe.initialized = true;
		info!(
			owners = safe.owners.len(),
			threshold = safe.owners.threshold(),
			"safe initialized"
		);

		if !call.to.is_zero() {
			self.execute_operation(frame, this, &Operation::delegate_call(call.to, call.data))?;
		}
		Ok(Bytes::new())
	}

	#[instrument(skip_all, fields(safe = %truncate_id(&this.to_string()), nonce = %call.nonce))]
	fn safe_submit(
		&mut self,
		frame: Frame,
		this: Address,
		call: ISafe::submitCall,
	) -> Result<Bytes, SafeError> {
		let operation = Operation {
			to: call.to,
			value: call.value,
			data: call.data,
			kind: call_kind(call.operation)?,
		};
		let signatures = signature_tuples(&call.v, &call.r, &call.s)?;

		let safe = self.safe(this)?;
		if !safe.initialized {
			return Err(SafeError::NotInitialized(this));
		}
		let nonce = safe.nonce;
		if call.nonce != nonce {
			return Err(SafeError::NonceMismatch {
				expected: nonce,
				provided: call.nonce,
			});
		}
		let tx_hash = self.transaction_hash(this, &operation, nonce);
		debug!(tx_hash = %tx_hash, "computed transaction hash");
		SignatureQuorum::new(&safe.owners).verify(&tx_hash, &signatures)?;

		self.safe_mut(this)?.nonce = nonce + U256::from(1);
		let checkpoint = self.checkpoint();

		match self.execute_operation(frame, this, &operation) {
			Ok(return_data) => {
				self.emit(SafeEvent::ExecutionSuccess {
					safe: this,
					tx_hash,
					nonce,
				});
				info!(to = %operation.to, kind = %operation.kind, "transaction executed");
				Ok(return_data)
			},
			Err(err) => {
				// Undo the operation's effects but keep the consumed nonce.
				self.restore(checkpoint);
				let reason = err.to_string();
				self.emit(SafeEvent::ExecutionFailed {
					safe: this,
					tx_hash,
					nonce,
					reason: reason.clone(),
				});
				warn!(%reason, "authorized transaction failed");
				Err(SafeError::OperationExecutionFailed {
					consumed_nonce: Some(nonce),
					reason,
				})
			},
		}
	}

	#[instrument(skip_all, fields(safe = %truncate_id(&this.to_string()), module = %truncate_id(&frame.sender.to_string())))]
	fn safe_dispatch_from_module(
		&mut self,
		frame: Frame,
		this: Address,
		call: ISafe::dispatchFromModuleCall,
	) -> Result<Bytes, SafeError> {
		let module = frame.sender;
		if !self.safe(this)?.is_module_enabled(&module) {
			return Err(SafeError::NotAuthorizedCaller(module));
		}
		if call_kind(call.operation)? != CallKind::Call {
			return Err(SafeError::DelegateCallForbidden);
		}

		let operation = Operation::call(call.to, call.value, call.data);
		let return_data = self.execute_operation(frame, this, &operation)?;
		self.emit(SafeEvent::ModuleExecution {
			safe: this,
			module,
			to: operation.to,
			value: operation.value,
		});
		debug!(to = %operation.to, "module operation executed");
		Ok(return_data)
	}

	#[instrument(skip_all, fields(safe = %truncate_id(&this.to_string()), extension = %truncate_id(&call.extension.to_string())))]
	fn safe_dispatch_from_extension(
		&mut self,
		frame: Frame,
		this: Address,
		call: ISafe::dispatchFromExtensionCall,
	) -> Result<Bytes, SafeError> {
		let extension = call.extension;
		if call.to == extension {
			return Err(SafeError::SelfTargetForbidden(extension));
		}
		if frame.sender != extension {
			return Err(SafeError::NotAuthorizedCaller(frame.sender));
		}
		if !self.safe(this)?.is_extension_enabled(&extension) {
			return Err(SafeError::ExtensionNotEnabled(extension));
		}

		let operation = Operation {
			to: call.to,
			value: call.value,
			data: call.data,
			kind: call_kind(call.operation)?,
		};
		let return_data = self.execute_operation(frame, this, &operation)?;
		self.emit(SafeEvent::ExtensionExecution {
			safe: this,
			extension,
			to: operation.to,
			value: operation.value,
			kind: operation.kind,
		});
		debug!(to = %operation.to, kind = %operation.kind, "extension operation executed");
		Ok(return_data)
	}

	/// Applies a self-authorized administrative call.
	fn safe_admin(&mut self, this: Address, call: ISafeCalls) -> Result<(), SafeError> {
		let safe = self.safe_mut(this)?;
		if !safe.initialized {
			return Err(SafeError::NotInitialized(this));
		}
		let previous_threshold = safe.owners.threshold();

		let event = match call {
			ISafeCalls::addOwnerWithThreshold(c) => {
				if c.owner == this {
					return Err(SafeError::InvalidOwner(c.owner));
				}
				safe.owners.add(c.owner, c.threshold)?;
				SafeEvent::AddedOwner {
					safe: this,
					owner: c.owner,
				}
			},
			ISafeCalls::removeOwner(c) => {
				safe.owners.remove(c.ownerIndex, c.owner, c.threshold)?;
				SafeEvent::RemovedOwner {
					safe: this,
					owner: c.owner,
				}
			},
			ISafeCalls::replaceOwner(c) => {
				if c.newOwner == this {
					return Err(SafeError::InvalidOwner(c.newOwner));
				}
				safe.owners.replace(c.oldOwnerIndex, c.oldOwner, c.newOwner)?;
				SafeEvent::ReplacedOwner {
					safe: this,
					old_owner: c.oldOwner,
					new_owner: c.newOwner,
				}
			},
			ISafeCalls::changeThreshold(c) => {
				safe.owners.change_threshold(c.threshold)?;
				SafeEvent::ChangedThreshold {
					safe: this,
					threshold: c.threshold,
				}
			},
			ISafeCalls::enableModule(c) => {
				if c.module.is_zero() || c.module == this || safe.is_module_enabled(&c.module) {
					return Err(SafeError::InvalidModule(c.module));
				}
				safe.modules.push(c.module);
				SafeEvent::EnabledModule {
					safe: this,
					module: c.module,
				}
			},
			ISafeCalls::disableModule(c) => {
				let position = checked_index(&safe.modules, c.moduleIndex, c.module)?;
				safe.modules.remove(position);
				SafeEvent::DisabledModule {
					safe: this,
					module: c.module,
				}
			},
			ISafeCalls::addExtension(c) => {
				if c.extension.is_zero()
					|| c.extension == this
					|| safe.is_extension_enabled(&c.extension)
				{
					return Err(SafeError::InvalidExtension(c.extension));
				}
				safe.extensions.push(c.extension);
				SafeEvent::AddedExtension {
					safe: this,
					extension: c.extension,
				}
			},
			ISafeCalls::removeExtension(c) => {
				let position = checked_index(&safe.extensions, c.extensionIndex, c.extension)?;
				safe.extensions.remove(position);
				SafeEvent::RemovedExtension {
					safe: this,
					extension: c.extension,
				}
			},
			ISafeCalls::setup(_)
			| ISafeCalls::submit(_)
			| ISafeCalls::dispatchFromModule(_)
			| ISafeCalls::dispatchFromExtension(_) => {
				return Err(SafeError::UnsupportedCall("not an admin call".into()));
			},
		};

		let threshold = safe.owners.threshold();
		let implicit_threshold_change = threshold != previous_threshold
			&& !matches!(event, SafeEvent::ChangedThreshold { .. });
		info!(?event, "safe configuration changed");
		self.emit(event);
		if implicit_threshold_change {
			self.emit(SafeEvent::ChangedThreshold {
				safe: this,
				threshold,
			});
		}
		Ok(())
	}
}
