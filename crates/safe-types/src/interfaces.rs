//! ABI interfaces of every contract the ledger can route calldata to.
//!
//! Contract behaviour is native Rust; these declarations only fix the calldata
//! layout so operations can be encoded, signed and decoded canonically.

use alloy_sol_types::sol;

sol! {
	/// Authorization core.
	interface ISafe {
		function setup(address[] owners, uint8 threshold, address to, bytes data);

		function submit(
			address to,
			uint256 value,
			bytes data,
			uint8 operation,
			uint256 nonce,
			uint8[] v,
			bytes32[] r,
			bytes32[] s
		);
		function dispatchFromModule(address to, uint256 value, bytes data, uint8 operation);
		function dispatchFromExtension(
			address to,
			uint256 value,
			bytes data,
			uint8 operation,
			address extension
		);

		function addOwnerWithThreshold(address owner, uint8 threshold);
		function removeOwner(uint64 ownerIndex, address owner, uint8 threshold);
		function replaceOwner(uint64 oldOwnerIndex, address oldOwner, address newOwner);
		function changeThreshold(uint8 threshold);
		function enableModule(address module);
		function disableModule(uint64 moduleIndex, address module);
		function addExtension(address extension);
		function removeExtension(uint64 extensionIndex, address extension);
	}

	/// Rolling per-asset spend cap.
	interface IDailyLimitModule {
		function setup(address[] assets, uint256[] dailyLimits);
		function executeDailyLimit(uint64 assetIndex, address to, uint256 amount);
		function changeDailyLimit(address asset, uint256 dailyLimit);
	}

	/// Time-delayed single-signer owner replacement.
	interface IRecoveryExtension {
		function setup(address recoverer, uint64 challengePeriod);
		function triggerRecovery(
			uint64 ownerIndex,
			address oldOwner,
			address newOwner,
			uint8 v,
			bytes32 r,
			bytes32 s
		);
		function cancelRecovery(uint8 v, bytes32 r, bytes32 s);
		function completeRecovery(bytes data);
	}

	interface IProxyFactory {
		function createProxy(address masterCopy, bytes data) returns (address proxy);
	}

	/// Libraries that must be delegate-called from a Safe.
	interface IInstaller {
		function createAndAddModules(address proxyFactory, bytes[] data);
		function createAndAddExtension(address proxyFactory, bytes data);
	}

	interface IToken {
		function transfer(address to, uint256 amount) returns (bool);
	}
}
