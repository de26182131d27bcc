//! Common types for the Safe workspace.
//!
//! Value types shared by the authorization core, the configuration and storage
//! layers, and the HTTP service.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Events emitted while executing transactions.
pub mod events;
/// ABI interfaces used to encode and route calldata.
pub mod interfaces;
/// Operations and call kinds.
pub mod operation;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Detached secp256k1 signatures.
pub mod signature;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for hashing, encoding and formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use operation::*;
pub use registry::ImplementationRegistry;
pub use signature::*;
pub use storage::*;
pub use utils::{truncate_id, without_0x_prefix};
pub use validation::*;
