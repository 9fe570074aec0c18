//! Device Module
//!
//! Reactive facade over a native BLE peripheral.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BleDevice                          │
//! │       (identity + the capability contract `Device`)      │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┬──────────────┐
//!         │             │              │              │
//!         ▼             ▼              ▼              ▼
//! ┌────────────┐ ┌─────────────┐ ┌──────────┐ ┌────────────┐
//! │ Connection │ │  Discovery  │ │ Pairing  │ │  Metadata  │
//! │            │◀│             │ │          │ │            │
//! │ - connect  │ │ - per-      │ │ - bond   │ │ - name     │
//! │ - status   │ │   episode   │ │   state  │ │ - MTU/RSSI │
//! │   stream   │ │   services  │ │ - pair   │ │ (unsupp.)  │
//! └────────────┘ └─────────────┘ └──────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`connection`] - Connect/disconnect and the replay-latest status stream
//! - [`discovery`] - Ref-counted service discovery, reset on disconnect
//! - [`pairing`] - Pairing snapshot and negotiation
//! - [`metadata`] - Name stream, MTU and RSSI
//! - [`service`] - Discovered service handles
//! - [`transaction`] - Reliable write queue

pub mod connection;
pub mod discovery;
pub mod metadata;
pub mod pairing;
pub mod service;
pub mod transaction;

pub use connection::{ConnectionController, StatusStream};
pub use discovery::ServiceStream;
pub use metadata::NameStream;
pub use pairing::PairingCoordinator;
pub use service::GattService;
pub use transaction::{QueuedWrite, ReliableWriteTransaction};

use crate::domain::identity::{derive_identity, BluetoothAddress, DeviceId};
use crate::domain::models::{ConnectionConfig, ConnectionStatus, PairingStatus};
use crate::domain::native::NativeDevice;
use crate::domain::settings::DeviceSettings;
use crate::error::{DeviceError, Result};
use crate::reactive::Subscription;
use async_trait::async_trait;
use discovery::ServiceDiscovery;
use metadata::NameHub;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Capabilities a BLE peripheral exposes to consumers
#[async_trait]
pub trait Device: Send + Sync {
    fn id(&self) -> DeviceId;

    fn name(&self) -> String;

    fn begin_reliable_write_transaction(&self) -> ReliableWriteTransaction;

    /// Request a connection; `None` uses [`ConnectionConfig::default`]
    async fn connect(&self, config: Option<ConnectionConfig>) -> Result<()>;

    fn cancel_connection(&self);

    fn status(&self) -> ConnectionStatus;

    /// Current status first, then every change, for the device's lifetime
    fn status_changes(&self) -> Result<StatusStream>;

    /// Services discovered in each connection episode
    fn service_discoveries(&self) -> Result<ServiceStream>;

    fn name_changes(&self) -> Result<NameStream>;

    fn pairing_status(&self) -> PairingStatus;

    async fn request_pairing(&self, pin: Option<&str>) -> Result<bool>;

    fn is_pairing_supported(&self) -> bool;

    fn is_mtu_request_supported(&self) -> bool;

    async fn request_mtu(&self, size: u16) -> Result<u16>;

    fn mtu_changes(&self) -> Result<Subscription<u16>>;

    fn rssi_updates(&self, frequency: Option<Duration>) -> Result<Subscription<i16>>;
}

/// A BLE peripheral backed by a native device handle.
///
/// Must be created inside a tokio runtime; service discovery runs on it.
pub struct BleDevice {
    id: DeviceId,
    address: BluetoothAddress,
    native: Arc<dyn NativeDevice>,
    connection: ConnectionController,
    discovery: Arc<ServiceDiscovery>,
    names: Arc<NameHub>,
    pairing: PairingCoordinator,
}

impl BleDevice {
    pub fn new(native: Arc<dyn NativeDevice>, settings: DeviceSettings) -> Result<Self> {
        let address = BluetoothAddress::try_from(native.address())?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeviceError::Runtime(e.to_string()))?;
        let id = derive_identity(address);

        let connection = ConnectionController::new(Arc::clone(&native), settings.connect_timeout);
        let discovery = ServiceDiscovery::new(
            id,
            Arc::clone(&native),
            Arc::clone(connection.hub()),
            settings.discovery_timeout,
            runtime,
        );
        let names = NameHub::new(Arc::clone(&native));
        let pairing = PairingCoordinator::new(Arc::clone(&native), settings.pairing_timeout);

        info!("Device {} ({}) ready", address, id);
        Ok(Self {
            id,
            address,
            native,
            connection,
            discovery,
            names,
            pairing,
        })
    }

    pub fn address(&self) -> BluetoothAddress {
        self.address
    }

    pub fn current_mtu(&self) -> Result<u16> {
        metadata::current_mtu()
    }
}

#[async_trait]
impl Device for BleDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> String {
        self.native.name()
    }

    fn begin_reliable_write_transaction(&self) -> ReliableWriteTransaction {
        ReliableWriteTransaction::new(self.id)
    }

    async fn connect(&self, config: Option<ConnectionConfig>) -> Result<()> {
        let config = config.unwrap_or_default();
        self.connection.connect(&config).await
    }

    fn cancel_connection(&self) {
        self.connection.cancel_connection();
    }

    fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    fn status_changes(&self) -> Result<StatusStream> {
        self.connection.status_changes()
    }

    fn service_discoveries(&self) -> Result<ServiceStream> {
        self.discovery.subscribe()
    }

    fn name_changes(&self) -> Result<NameStream> {
        self.names.subscribe()
    }

    fn pairing_status(&self) -> PairingStatus {
        self.pairing.pairing_status()
    }

    async fn request_pairing(&self, pin: Option<&str>) -> Result<bool> {
        self.pairing.request_pairing(pin).await
    }

    fn is_pairing_supported(&self) -> bool {
        true
    }

    fn is_mtu_request_supported(&self) -> bool {
        false
    }

    async fn request_mtu(&self, size: u16) -> Result<u16> {
        metadata::request_mtu(size)
    }

    fn mtu_changes(&self) -> Result<Subscription<u16>> {
        metadata::mtu_changes()
    }

    fn rssi_updates(&self, frequency: Option<Duration>) -> Result<Subscription<i16>> {
        metadata::rssi_updates(frequency)
    }
}
