//! Bluetooth Module
//!
//! Platform backends implementing [`NativeDevice`](crate::domain::NativeDevice).
//!
//! ## Modules
//!
//! - [`device`] - WinRT `BluetoothLEDevice` backend (Windows only)

#[cfg(windows)]
pub mod device;

#[cfg(windows)]
pub use device::{WinRtDevice, WinRtService};
