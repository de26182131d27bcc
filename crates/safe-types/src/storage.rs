//! Storage namespaces used by the Safe node.

/// Namespaces for persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Full ledger state snapshots
	Ledger,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Ledger => "ledger",
		}
	}
}
