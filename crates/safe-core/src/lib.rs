//! Authorization core of the Safe multi-owner vault.
//!
//! A Safe executes operations only when a quorum of its owners has signed them,
//! or when an enabled module or extension asks for it. This crate contains the
//! core itself, the daily-limit module, the recovery extension, and the
//! [`Ledger`] execution environment they all run on.
//!
//! ```text
//!   owners --signatures--> Safe.submit ------------+
//!   anyone --> DailyLimitModule --dispatchFromModule-+--> execute_operation
//!   anyone --> RecoveryExtension --dispatchFromExtension+
//! ```

pub mod clock;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod ledger;
pub mod modules;
pub mod owners;
pub mod quorum;
pub mod safe;
pub mod token;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SafeError;
pub use extensions::{RecoveryExtension, RecoveryState};
pub use factory::{Installer, MasterCopy, SystemContracts};
pub use ledger::{Account, Contract, Ledger, LedgerState, Receipt};
pub use modules::DailyLimitModule;
pub use owners::OwnerSet;
pub use quorum::SignatureQuorum;
pub use safe::{safe_tx_hash, Safe};
pub use token::Token;
