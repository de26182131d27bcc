//! Minimal fungible token used as a non-ether asset.

use crate::{ledger::Frame, Contract, Ledger, SafeError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use safe_types::{interfaces::IToken::ITokenCalls, SafeEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	pub symbol: String,
	balances: BTreeMap<Address, U256>,
}

impl Token {
	pub fn new(symbol: impl Into<String>) -> Self {
		Self {
			symbol: symbol.into(),
			balances: BTreeMap::new(),
		}
	}

	pub fn balance_of(&self, holder: &Address) -> U256 {
		self.balances.get(holder).copied().unwrap_or_default()
	}

	pub fn mint(&mut self, to: Address, amount: U256) {
		let balance = self.balances.entry(to).or_default();
		*balance = balance.saturating_add(amount);
	}

	fn transfer(
		&mut self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), SafeError> {
		let available = self.balance_of(&from);
		if available < amount {
			return Err(SafeError::InsufficientBalance {
				account: from,
				available,
				required: amount,
			});
		}
		self.balances.insert(from, available - amount);
		self.mint(to, amount);
		Ok(())
	}
}

impl Ledger {
	pub fn token(&self, address: Address) -> Result<&Token, SafeError> {
		match self.contract(address) {
			Some(Contract::Token(token)) => Ok(token),
			_ => Err(SafeError::UnknownContract(address)),
		}
	}

	/// Mints `amount` of `token` to `to`. Genesis only.
	pub fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<(), SafeError> {
		match self.contract_mut(token) {
			Some(Contract::Token(t)) => {
				t.mint(to, amount);
				Ok(())
			},
			_ => Err(SafeError::UnknownContract(token)),
		}
	}

	pub(crate) fn token_call(
		&mut self,
		frame: Frame,
		this: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		let ITokenCalls::transfer(call) = ITokenCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("token: {}", e)))?;

		match self.contract_mut(this) {
			Some(Contract::Token(token)) => token.transfer(frame.sender, call.to, call.amount)?,
			_ => return Err(SafeError::UnknownContract(this)),
		}
		self.emit(SafeEvent::Transfer {
			asset: this,
			from: frame.sender,
			to: call.to,
			amount: call.amount,
		});
		Ok(Bytes::from(U256::from(1).to_be_bytes::<32>().to_vec()))
	}
}
