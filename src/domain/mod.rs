//! Domain Module
//!
//! Device-independent types: identity, status models, settings, and the
//! native platform contract.

pub mod identity;
pub mod models;
pub mod native;
pub mod settings;

pub use identity::{derive_identity, BluetoothAddress, DeviceId};
pub use models::{ConnectionConfig, ConnectionPriority, ConnectionStatus, PairingStatus};
pub use native::{
    CacheMode, EventHandler, EventToken, NativeDevice, NativeService, PairingResultStatus,
    ProtectionLevel,
};
pub use settings::{DeviceSettings, LogSettings, Settings, SettingsService};
