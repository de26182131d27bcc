//! Ordered owner set with its signing threshold.
//!
//! Owners are kept in insertion order. Positional mutations name both the index
//! and the expected address, so a stale index can never remove or replace the
//! wrong owner, and removal shifts later owners down without reordering them.

use crate::SafeError;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Owners of a Safe and how many of them must sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSet {
	owners: Vec<Address>,
	/// Always within `1..=owners.len()`.
	threshold: u8,
}

impl OwnerSet {
	/// Builds a validated owner set.
	pub fn new(owners: Vec<Address>, threshold: u8) -> Result<Self, SafeError> {
		let mut set = Self::default();
		for owner in owners {
			set.check_candidate(owner)?;
			set.owners.push(owner);
		}
		check_threshold(threshold, set.owners.len())?;
		set.threshold = threshold;
		Ok(set)
	}

	/// Owners in insertion order.
	pub fn owners(&self) -> &[Address] {
		&self.owners
	}

	/// Number of distinct owner signatures required.
	pub fn threshold(&self) -> u8 {
		self.threshold
	}

	/// Number of owners.
	pub fn len(&self) -> usize {
		self.owners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.owners.is_empty()
	}

	/// Whether `address` is an owner.
	pub fn contains(&self, address: &Address) -> bool {
		self.owners.contains(address)
	}

	/// Appends `owner` and sets a new threshold.
	pub fn add(&mut self, owner: Address, threshold: u8) -> Result<(), SafeError> {
		self.check_candidate(owner)?;
		check_threshold(threshold, self.owners.len() + 1)?;
		self.owners.push(owner);
		self.threshold = threshold;
		Ok(())
	}

	/// Removes the owner at `index` and sets a new threshold.
	pub fn remove(&mut self, index: u64, owner: Address, threshold: u8) -> Result<(), SafeError> {
		let position = checked_index(&self.owners, index, owner)?;
		check_threshold(threshold, self.owners.len() - 1)?;
		self.owners.remove(position);
		self.threshold = threshold;
		Ok(())
	}

	/// Swaps `old_owner` at `index` for `new_owner` in place.
	pub fn replace(
		&mut self,
		index: u64,
		old_owner: Address,
		new_owner: Address,
	) -> Result<(), SafeError> {
		let position = checked_index(&self.owners, index, old_owner)?;
		self.check_candidate(new_owner)?;
		self.owners[position] = new_owner;
		Ok(())
	}

	pub fn change_threshold(&mut self, threshold: u8) -> Result<(), SafeError> {
		check_threshold(threshold, self.owners.len())?;
		self.threshold = threshold;
		Ok(())
	}

	fn check_candidate(&self, owner: Address) -> Result<(), SafeError> {
		if owner.is_zero() {
			return Err(SafeError::InvalidOwner(owner));
		}
		if self.contains(&owner) {
			return Err(SafeError::DuplicateOwner(owner));
		}
		Ok(())
	}
}

fn check_threshold(threshold: u8, owners: usize) -> Result<(), SafeError> {
	if threshold == 0 || usize::from(threshold) > owners {
		return Err(SafeError::InvalidThreshold { threshold, owners });
	}
	Ok(())
}

/// Resolves `index` in `list`, requiring the entry there to be `expected`.
pub(crate) fn checked_index(
	list: &[Address],
	index: u64,
	expected: Address,
) -> Result<usize, SafeError> {
	usize::try_from(index)
		.ok()
		.filter(|i| list.get(*i) == Some(&expected))
		.ok_or(SafeError::IndexMismatch { index, expected })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	#[test]
	fn test_new_rejects_bad_sets() {
		assert_eq!(
			OwnerSet::new(vec![addr(1), addr(1)], 1),
			Err(SafeError::DuplicateOwner(addr(1)))
		);
		assert_eq!(
			OwnerSet::new(vec![Address::ZERO], 1),
			Err(SafeError::InvalidOwner(Address::ZERO))
		);
		assert_eq!(
			OwnerSet::new(vec![addr(1)], 2),
			Err(SafeError::InvalidThreshold {
				threshold: 2,
				owners: 1
			})
		);
		assert!(OwnerSet::new(vec![], 0).is_err());
	}

	#[test]
	fn test_remove_preserves_order() {
		let mut set = OwnerSet::new(vec![addr(1), addr(2), addr(3)], 2).unwrap();
		set.remove(0, addr(1), 1).unwrap();
		assert_eq!(set.owners(), &[addr(2), addr(3)]);
		assert_eq!(set.threshold(), 1);
	}

	#[test]
	fn test_remove_checks_index_and_threshold() {
		let mut set = OwnerSet::new(vec![addr(1), addr(2)], 2).unwrap();
		assert_eq!(
			set.remove(1, addr(1), 1),
			Err(SafeError::IndexMismatch {
				index: 1,
				expected: addr(1)
			})
		);
		assert!(matches!(
			set.remove(0, addr(1), 2),
			Err(SafeError::InvalidThreshold { .. })
		));
		// Failed mutations leave the set untouched.
		assert_eq!(set.owners(), &[addr(1), addr(2)]);
		assert_eq!(set.threshold(), 2);
	}

	#[test]
	fn test_last_owner_cannot_be_removed() {
		let mut set = OwnerSet::new(vec![addr(1)], 1).unwrap();
		assert!(set.remove(0, addr(1), 0).is_err());
		assert!(set.remove(0, addr(1), 1).is_err());
	}

	#[test]
	fn test_replace_in_place() {
		let mut set = OwnerSet::new(vec![addr(1), addr(2), addr(3)], 2).unwrap();
		set.replace(1, addr(2), addr(9)).unwrap();
		assert_eq!(set.owners(), &[addr(1), addr(9), addr(3)]);
		assert_eq!(
			set.replace(0, addr(1), addr(3)),
			Err(SafeError::DuplicateOwner(addr(3)))
		);
	}

	#[test]
	fn test_add_and_change_threshold() {
		let mut set = OwnerSet::new(vec![addr(1)], 1).unwrap();
		set.add(addr(2), 2).unwrap();
		assert_eq!(set.len(), 2);
		assert!(set.change_threshold(3).is_err());
		set.change_threshold(1).unwrap();
		assert_eq!(set.threshold(), 1);
	}
}
