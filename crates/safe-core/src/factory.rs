//! Proxy factory and installer libraries.
//!
//! Master copies are immutable templates. The factory stamps out a fresh,
//! uninitialized instance of a template per request and immediately runs the
//! supplied initialization call against it. Installers are libraries a Safe
//! delegate-calls to create modules or extensions and enable them in one step.

use crate::{ledger::Frame, Contract, Ledger, Receipt, SafeError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolInterface};
use safe_types::{
	interfaces::{
		IInstaller::IInstallerCalls,
		IProxyFactory::{self, IProxyFactoryCalls},
		ISafe,
	},
	utils::address_from_word,
	SafeEvent,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Template a master copy instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterCopy {
	Safe,
	DailyLimitModule,
	RecoveryExtension,
}

impl MasterCopy {
	fn instantiate(self) -> Contract {
		match self {
			MasterCopy::Safe => Contract::Safe(Default::default()),
			MasterCopy::DailyLimitModule => Contract::DailyLimit(Default::default()),
			MasterCopy::RecoveryExtension => Contract::Recovery(Default::default()),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Installer {
	/// `createAndAddModules(factory, bytes[])`
	ModuleInstaller,
	/// `createAndAddExtension(factory, bytes)`
	ExtensionInstaller,
}

/// Addresses of the shared infrastructure contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemContracts {
	pub proxy_factory: Address,
	pub safe_master_copy: Address,
	pub daily_limit_master_copy: Address,
	pub recovery_master_copy: Address,
	pub module_installer: Address,
	pub extension_installer: Address,
}

impl Ledger {
	/// Deploys the factory, master copies and installers.
	pub fn deploy_system(&mut self) -> SystemContracts {
		SystemContracts {
			proxy_factory: self.deploy(Contract::ProxyFactory),
			safe_master_copy: self.deploy(Contract::MasterCopy {
				template: MasterCopy::Safe,
			}),
			daily_limit_master_copy: self.deploy(Contract::MasterCopy {
				template: MasterCopy::DailyLimitModule,
			}),
			recovery_master_copy: self.deploy(Contract::MasterCopy {
				template: MasterCopy::RecoveryExtension,
			}),
			module_installer: self.deploy(Contract::Installer {
				library: Installer::ModuleInstaller,
			}),
			extension_installer: self.deploy(Contract::Installer {
				library: Installer::ExtensionInstaller,
			}),
		}
	}

	/// Creates an instance of `master_copy` and initializes it with `data`,
	/// sent by `sender`. Returns the new instance's address.
	pub fn create_proxy(
		&mut self,
		sender: Address,
		factory: Address,
		master_copy: Address,
		data: impl Into<Bytes>,
	) -> Result<(Address, Receipt), SafeError> {
		let call = IProxyFactory::createProxyCall {
			masterCopy: master_copy,
			data: data.into(),
		};
		let receipt = self.call(sender, factory, U256::ZERO, call.abi_encode())?;
		let proxy = address_from_word(&receipt.return_data).ok_or_else(|| {
			SafeError::UnsupportedCall("factory returned no proxy address".into())
		})?;
		Ok((proxy, receipt))
	}

	pub(crate) fn factory_call(
		&mut self,
		frame: Frame,
		this: Address,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		let IProxyFactoryCalls::createProxy(call) = IProxyFactoryCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("proxy factory: {}", e)))?;

		let template = match self.contract(call.masterCopy) {
			Some(Contract::MasterCopy { template }) => *template,
			_ => return Err(SafeError::UnknownMasterCopy(call.masterCopy)),
		};
		let proxy = self.create_account(this, template.instantiate());
		info!(proxy = %proxy, ?template, "proxy created");
		self.emit(SafeEvent::ProxyCreation {
			proxy,
			master_copy: call.masterCopy,
		});

		if !call.data.is_empty() {
			self.invoke(frame.next(frame.sender), proxy, U256::ZERO, &call.data)?;
		}
		Ok(Bytes::from(proxy.into_word().to_vec()))
	}

	/// Runs installer `library` as if it were the code of `safe`.
	pub(crate) fn run_installer(
		&mut self,
		frame: Frame,
		safe: Address,
		library: Installer,
		data: &[u8],
	) -> Result<Bytes, SafeError> {
		let call = IInstallerCalls::abi_decode(data)
			.map_err(|e| SafeError::UnsupportedCall(format!("installer: {}", e)))?;

		match (library, call) {
			(Installer::ModuleInstaller, IInstallerCalls::createAndAddModules(c)) => {
				for creation in &c.data {
					let module = self.create_through_factory(frame, safe, c.proxyFactory, creation)?;
					let enable = ISafe::enableModuleCall { module };
					self.invoke(frame.next(safe), safe, U256::ZERO, &enable.abi_encode())?;
					debug!(module = %module, "module installed");
				}
			},
			(Installer::ExtensionInstaller, IInstallerCalls::createAndAddExtension(c)) => {
				let extension = self.create_through_factory(frame, safe, c.proxyFactory, &c.data)?;
				let add = ISafe::addExtensionCall { extension };
				self.invoke(frame.next(safe), safe, U256::ZERO, &add.abi_encode())?;
				debug!(extension = %extension, "extension installed");
			},
			(library, _) => {
				return Err(SafeError::UnsupportedCall(format!(
					"{:?} does not implement this call",
					library
				)));
			},
		}
		Ok(Bytes::new())
	}

	fn create_through_factory(
		&mut self,
		frame: Frame,
		safe: Address,
		factory: Address,
		creation: &[u8],
	) -> Result<Address, SafeError> {
		let returned = self.invoke(frame.next(safe), factory, U256::ZERO, creation)?;
		address_from_word(&returned)
			.ok_or_else(|| SafeError::UnsupportedCall(format!("{} did not return an address", factory)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use safe_types::interfaces::IDailyLimitModule;
	use std::sync::Arc;

	#[test]
	fn test_create_proxy_runs_setup_as_sender() {
		let mut ledger = Ledger::new(1, Arc::new(ManualClock::new(0)));
		let system = ledger.deploy_system();
		let caller = Address::repeat_byte(0x42);
		let setup = IDailyLimitModule::setupCall {
			assets: vec![Address::ZERO],
			dailyLimits: vec![U256::from(10)],
		};

		let (proxy, receipt) = ledger
			.create_proxy(
				caller,
				system.proxy_factory,
				system.daily_limit_master_copy,
				setup.abi_encode(),
			)
			.unwrap();

		assert_eq!(proxy, system.proxy_factory.create(0));
		assert_eq!(
			receipt.events[0],
			SafeEvent::ProxyCreation {
				proxy,
				master_copy: system.daily_limit_master_copy
			}
		);
		let module = ledger.daily_limit(proxy).unwrap();
		assert_eq!(module.manager(), caller);
		assert!(module.is_initialized());
	}

	#[test]
	fn test_unknown_master_copy_rolls_back() {
		let mut ledger = Ledger::new(1, Arc::new(ManualClock::new(0)));
		let system = ledger.deploy_system();
		let err = ledger
			.create_proxy(
				Address::repeat_byte(1),
				system.proxy_factory,
				system.module_installer,
				Bytes::new(),
			)
			.unwrap_err();
		assert_eq!(err, SafeError::UnknownMasterCopy(system.module_installer));
		assert!(ledger.contract(system.proxy_factory.create(0)).is_none());
	}

	#[test]
	fn test_master_copy_cannot_be_called() {
		let mut ledger = Ledger::new(1, Arc::new(ManualClock::new(0)));
		let system = ledger.deploy_system();
		let setup = IDailyLimitModule::setupCall {
			assets: vec![],
			dailyLimits: vec![],
		};
		assert!(matches!(
			ledger.call(
				Address::repeat_byte(1),
				system.daily_limit_master_copy,
				U256::ZERO,
				setup.abi_encode()
			),
			Err(SafeError::UnsupportedCall(_))
		));
	}
}
