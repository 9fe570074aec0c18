//! Reactive BLE peripheral device core.
//!
//! Wraps a native BLE device handle ([`domain::NativeDevice`]) and exposes its
//! identity, connection lifecycle, GATT service discovery, and pairing as
//! multicast streams through [`device::BleDevice`].

pub mod device;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod reactive;

#[cfg(test)]
pub(crate) mod testing;

pub use device::{BleDevice, Device, GattService};
pub use domain::{BluetoothAddress, ConnectionConfig, ConnectionStatus, DeviceId, PairingStatus};
pub use error::{Capability, DeviceError, Result};
