//! Configuration for the Safe node.
//!
//! Configuration is TOML with `${VAR}` / `${VAR:-default}` environment
//! interpolation. It can be split across files:
//! - `include = ["storage.toml", "genesis.toml"]` pulls in other files
//! - each top-level section must be unique across all files

mod loader;

use alloy_primitives::{Address, U256};
use regex::Regex;
use safe_types::utils::{parse_address, parse_amount};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Only the message; the default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub node: NodeConfig,
	pub storage: StorageConfig,
	pub api: Option<ApiConfig>,
	#[serde(default)]
	pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Chain id bound into every EIP-712 domain.
	pub chain_id: u64,
	/// Id under which the ledger snapshot is persisted.
	#[serde(default = "default_snapshot_key")]
	pub snapshot_key: String,
}

fn default_snapshot_key() -> String {
	"latest".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Raw settings per implementation name.
	pub implementations: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// State deployed when the node starts without a snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenesisConfig {
	#[serde(default)]
	pub accounts: Vec<Allocation>,
	#[serde(default)]
	pub tokens: Vec<TokenGenesis>,
	#[serde(default)]
	pub safes: Vec<SafeGenesis>,
}

/// An address and an amount, both as strings in the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Allocation {
	pub address: String,
	/// Decimal or 0x-prefixed hex.
	pub balance: String,
}

impl Allocation {
	pub fn address(&self) -> Result<Address, ConfigError> {
		parse_address(&self.address).map_err(ConfigError::Validation)
	}

	pub fn balance(&self) -> Result<U256, ConfigError> {
		parse_amount(&self.balance).map_err(ConfigError::Validation)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenGenesis {
	pub symbol: String,
	#[serde(default)]
	pub holders: Vec<Allocation>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafeGenesis {
	/// Label used in logs and to reference the Safe elsewhere in genesis.
	pub name: String,
	pub owners: Vec<String>,
	pub threshold: u8,
	/// Ether funding, decimal or hex wei.
	pub balance: Option<String>,
	/// Token funding by symbol.
	#[serde(default)]
	pub token_balances: HashMap<String, String>,
	pub daily_limit: Option<DailyLimitGenesis>,
	pub recovery: Option<RecoveryGenesis>,
}

impl SafeGenesis {
	pub fn owner_addresses(&self) -> Result<Vec<Address>, ConfigError> {
		self.owners
			.iter()
			.map(|o| parse_address(o).map_err(ConfigError::Validation))
			.collect()
	}

	pub fn balance(&self) -> Result<U256, ConfigError> {
		match &self.balance {
			Some(b) => parse_amount(b).map_err(ConfigError::Validation),
			None => Ok(U256::ZERO),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DailyLimitGenesis {
	/// `"ether"`, a token symbol from `genesis.tokens`, or a contract address.
	pub assets: Vec<String>,
	pub limits: Vec<String>,
}

impl DailyLimitGenesis {
	pub fn asset_refs(&self) -> Result<Vec<AssetRef>, ConfigError> {
		self.assets.iter().map(|a| a.parse()).collect()
	}

	pub fn limit_amounts(&self) -> Result<Vec<U256>, ConfigError> {
		self.limits
			.iter()
			.map(|l| parse_amount(l).map_err(ConfigError::Validation))
			.collect()
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoveryGenesis {
	pub recoverer: String,
	pub challenge_period_seconds: u64,
}

impl RecoveryGenesis {
	pub fn recoverer(&self) -> Result<Address, ConfigError> {
		parse_address(&self.recoverer).map_err(ConfigError::Validation)
	}
}

/// How a daily-limit asset is named in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
	Ether,
	Address(Address),
	Symbol(String),
}

impl FromStr for AssetRef {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.eq_ignore_ascii_case("ether") || s.eq_ignore_ascii_case("eth") {
			return Ok(AssetRef::Ether);
		}
		if s.starts_with("0x") {
			let address = parse_address(s).map_err(ConfigError::Validation)?;
			return Ok(if address.is_zero() {
				AssetRef::Ether
			} else {
				AssetRef::Address(address)
			});
		}
		if s.is_empty() {
			return Err(ConfigError::Validation("Asset name cannot be empty".into()));
		}
		Ok(AssetRef::Symbol(s.to_string()))
	}
}

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
///
/// Inputs are capped at 1 MiB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.node.id.is_empty() {
			return Err(ConfigError::Validation("Node ID cannot be empty".into()));
		}
		if self.node.chain_id == 0 {
			return Err(ConfigError::Validation("chain_id must be non-zero".into()));
		}
		if self.node.snapshot_key.is_empty() {
			return Err(ConfigError::Validation("snapshot_key cannot be empty".into()));
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.host.is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
		}

		self.validate_genesis()
	}

	fn validate_genesis(&self) -> Result<(), ConfigError> {
		let genesis = &self.genesis;
		for account in &genesis.accounts {
			account.address()?;
			account.balance()?;
		}

		let mut symbols = HashSet::new();
		for token in &genesis.tokens {
			if token.symbol.is_empty() {
				return Err(ConfigError::Validation("Token symbol cannot be empty".into()));
			}
			if !symbols.insert(token.symbol.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Duplicate token symbol '{}'",
					token.symbol
				)));
			}
			for holder in &token.holders {
				holder.address()?;
				holder.balance()?;
			}
		}

		let mut names = HashSet::new();
		for (i, safe) in genesis.safes.iter().enumerate() {
			let at = |message: String| {
				ConfigError::Validation(format!("genesis.safes[{}] ({}): {}", i, safe.name, message))
			};
			if !names.insert(safe.name.as_str()) {
				return Err(at("duplicate Safe name".into()));
			}

			let owners = safe.owner_addresses()?;
			if owners.is_empty() {
				return Err(at("owners cannot be empty".into()));
			}
			if safe.threshold == 0 || usize::from(safe.threshold) > owners.len() {
				return Err(at(format!(
					"threshold {} must be between 1 and {}",
					safe.threshold,
					owners.len()
				)));
			}
			safe.balance()?;
			for (symbol, amount) in &safe.token_balances {
				if !symbols.contains(symbol.as_str()) {
					return Err(at(format!("unknown token '{}'", symbol)));
				}
				parse_amount(amount).map_err(|e| at(e))?;
			}

			if let Some(limits) = &safe.daily_limit {
				if limits.assets.len() != limits.limits.len() {
					return Err(at(format!(
						"daily_limit has {} assets but {} limits",
						limits.assets.len(),
						limits.limits.len()
					)));
				}
				for asset in limits.asset_refs()? {
					if let AssetRef::Symbol(symbol) = asset {
						if !symbols.contains(symbol.as_str()) {
							return Err(at(format!("unknown daily_limit asset '{}'", symbol)));
						}
					}
				}
				limits.limit_amounts()?;
			}

			if let Some(recovery) = &safe.recovery {
				if recovery.recoverer()?.is_zero() {
					return Err(at("recoverer cannot be the zero address".into()));
				}
				if recovery.challenge_period_seconds == 0 {
					return Err(at("challenge_period_seconds must be greater than 0".into()));
				}
			}
		}

		Ok(())
	}
}

/// Parses TOML, resolving environment variables first, then validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
