//! Daily-limit module: rolling per-asset spend cap.
//!
//! Once enabled on a Safe, anyone may ask the module to pay out of that Safe,
//! as long as the amount fits in what is left of the asset's limit for the
//! current day. Windows are aligned to UTC midnight and reset lazily: the first
//! spend after a window has ended starts a new one, however many days passed.

use crate::{ledger::Frame, Contract, Ledger, Receipt, SafeError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};
use safe_types::{
	interfaces::{
		IDailyLimitModule::{self, IDailyLimitModuleCalls},
		ISafe, IToken,
	},
	truncate_id, CallKind, Operation, SafeEvent,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Length of a limit window in seconds.
pub const DAY: u64 = 86_400;

/// Start of the UTC day containing `now`.
pub fn window_start(now: u64) -> u64 {
	now - now % DAY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLimit {
	/// Token address, or zero for ether.
	pub asset: Address,
	pub daily_limit: U256,
	pub spent_today: U256,
	/// Start of the window `spent_today` belongs to.
	pub last_reset: u64,
}

impl AssetLimit {
	fn new(asset: Address, daily_limit: U256) -> Self {
		Self {
			asset,
			daily_limit,
			spent_today: U256::ZERO,
			last_reset: 0,
		}
	}

	fn window_elapsed(&self, now: u64) -> bool {
		now >= self.last_reset.saturating_add(DAY)
	}

	/// Amount still spendable at `now`, accounting for a pending reset.
	pub fn remaining(&self, now: u64) -> U256 {
		let spent = if self.window_elapsed(now) {
			U256::ZERO
		} else {
			self.spent_today
		};
		self.daily_limit.saturating_sub(spent)
	}
}

/// Result of applying a spend to a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spend {
	pub asset: Address,
	pub spent_today: U256,
	/// Start of the new window when the spend triggered a reset.
	pub reset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimitModule {
	manager: Address,
	assets: Vec<AssetLimit>,
	initialized: bool,
}

impl DailyLimitModule {
	/// Account allowed to change limits; the Safe the module pays out of.
	pub fn manager(&self) -> Address {
		self.manager
	}

	pub fn assets(&self) -> &[AssetLimit] {
		&self.assets
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	pub fn setup(
		&mut self,
		this: Address,
		manager: Address,
		assets: Vec<Address>,
		limits: Vec<U256>,
	) -> Result<(), SafeError> {
		if self.initialized {
			return Err(SafeError::AlreadyInitialized(this));
		}
		if assets.len() != limits.len() {
			return Err(SafeError::InvalidSetup(format!(
				"{} assets but {} limits",
				assets.len(),
				limits.len()
			)));
		}
		for (i, asset) in assets.iter().enumerate() {
			if assets[..i].contains(asset) {
				return Err(SafeError::InvalidSetup(format!("asset {} listed twice", asset)));
			}
		}

		self.manager = manager;
		self.assets = assets
			.into_iter()
			.zip(limits)
			.map(|(asset, limit)| AssetLimit::new(asset, limit))
			.collect();
		self.initialized = true;
		Ok(())
	}

	/// Records a spend of `amount` on the asset at `index`.
	///
	/// Nothing changes when the spend is rejected.
	pub fn spend(&mut self, index: u64, amount: U256, now: u64) -> Result<Spend, SafeError> {
		let limit = usize::try_from(index)
			.ok()
			.and_then(|i| self.assets.get_mut(i))
			.ok_or(SafeError::UnknownAsset(index))?;

		let reset = limit.window_elapsed(now).then(|| window_start(now));
		let spent = if reset.is_some() {
			U256::ZERO
		} else {
			limit.spent_today
		};
		let spent_today = spent
			.checked_add(amount)
			.filter(|total| *total <= limit.daily_limit)
			.ok_or(SafeError::DailyLimitExceeded {
				asset: limit.asset,
				spent,
				requested: amount,
				limit: limit.daily_limit,
			})?;

		if let Some(start) = reset {
			limit.last_reset = start;
		}
		limit.spent_today = spent_today;
		Ok(Spend {
			asset: limit.asset,
			spent_today,
			reset,
		})
	}

	/// Sets the limit of `asset`, adding it when unknown.
	pub fn change_limit(&mut self, asset: Address, daily_limit: U256) {
		match self.assets.iter_mut().find(|l| l.asset == asset) {
			Some(limit) => {
				limit.daily_limit = daily_limit;
				limit.spent_today = limit.spent_today.min(daily_limit);
			},
			None => self.assets.push(AssetLimit::new(asset, daily_limit)),
		}
	}
}

/// Operation moving `amount` of `asset` to `to`.
fn payout(asset: Address, to: Address, amount: U256) -> Operation {
	if asset.is_zero() {
		Operation::transfer(to, amount)
	} else {
		Operation::call(
			asset,
			U256::ZERO,
			IToken::transferCall { to, amount }.abi_encode(),
		)
	}
}

impl Ledger {
	pub fn daily_limit(&self, address: Address) -> Result<&DailyLimitModule, SafeError> {
		match self.contract(address) {
			Some(Contract::DailyLimit(module)) => Ok(module),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	fn daily_limit_mut(&mut self, address: Address) -> Result<&mut DailyLimitModule, SafeError> {
		match self.contract_mut(address) {
			Some(Contract::DailyLimit(module)) => Ok(module),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	/// Asks `module` to pay `amount` of the asset at `asset_index` to `to`.
	pub fn execute_daily_limit(
		&mut self,
		sender: Address,
		module: Address,
		asset_index: u64,
		to: Address,
		amount: U256,
	) -> Result<Receipt, SafeError> {
		let call = IDailyLimitModule::executeDailyLimitCall {
			assetIndex: asset_index,
			to,
			amount,
		};
		self.call(sender, module, U256::ZERO, call.abi_encode())
	}

	pub(crate) fn daily_limit_call(
		&mut self,
		frame: Frame,
		this: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		let call = IDailyLimitModuleCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("daily limit module: {}", e)))?;

		match call {
			IDailyLimitModuleCalls::setup(c) => {
				self.daily_limit_mut(this)?
					.setup(this, frame.sender, c.assets, c.dailyLimits)?;
			},
			IDailyLimitModuleCalls::executeDailyLimit(c) => {
				return self.daily_limit_execute(frame, this, c.assetIndex, c.to, c.amount);
			},
			IDailyLimitModuleCalls::changeDailyLimit(c) => {
				let module = self.daily_limit_mut(this)?;
				if !module.initialized {
					return Err(SafeError::NotInitialized(this));
				}
				if frame.sender != module.manager {
					return Err(SafeError::NotAuthorizedCaller(frame.sender));
				}
				module.change_limit(c.asset, c.dailyLimit);
				info!(asset = %c.asset, limit = %c.dailyLimit, "daily limit changed");
				self.emit(SafeEvent::DailyLimitChanged {
					module: this,
					asset: c.asset,
					daily_limit: c.dailyLimit,
				});
			},
		}
		Ok(Bytes::new())
	}

	#[instrument(skip_all, fields(module = %truncate_id(&this.to_string()), asset_index = asset_index, amount = %amount))]
	fn daily_limit_execute(
		&mut self,
		frame: Frame,
		this: Address,
		asset_index: u64,
		to: Address,
		amount: U256,
	) -> Result<Bytes, SafeError> {
		let now = self.now();
		let module = self.daily_limit_mut(this)?;
		if !module.initialized {
			return Err(SafeError::NotInitialized(this));
		}
		let safe = module.manager;
		let spend = module.spend(asset_index, amount, now)?;

		if let Some(window_start) = spend.reset {
			info!(asset = %spend.asset, window_start, "daily limit window reset");
			self.emit(SafeEvent::DailyLimitReset {
				module: this,
				asset: spend.asset,
				window_start,
			});
		}

		let operation = payout(spend.asset, to, amount);
		let dispatch = ISafe::dispatchFromModuleCall {
			to: operation.to,
			value: operation.value,
			data: operation.data,
			operation: CallKind::Call.as_u8(),
		};
		self.invoke(frame.next(this), safe, U256::ZERO, &dispatch.abi_encode())?;

		info!(
			asset = %spend.asset,
			to = %to,
			spent_today = %spend.spent_today,
			"daily limit spend executed"
		);
		self.emit(SafeEvent::DailyLimitSpent {
			module: this,
			asset: spend.asset,
			to,
			amount,
			spent_today: spend.spent_today,
		});
		Ok(Bytes::new())
	}
}
