//! Extensions: enabled actors that trigger one self-declared operation on a
//! Safe without quorum.

pub mod recovery;

pub use recovery::{
	recovery_request_hash, PendingRecovery, RecoveryExtension, RecoveryState, ACTION_CANCEL,
	ACTION_TRIGGER,
};
