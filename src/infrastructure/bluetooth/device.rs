//! WinRT Device Module
//!
//! `NativeDevice` over `Windows.Devices.Bluetooth.BluetoothLEDevice`.

use crate::domain::native::{
    CacheMode, EventHandler, EventToken, NativeDevice, NativeService, PairingResultStatus,
    ProtectionLevel,
};
use crate::error::{DeviceError, NativeOperation, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use windows::core::IInspectable;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCommunicationStatus, GattDeviceService, GattSession,
};
use windows::Devices::Bluetooth::{BluetoothCacheMode, BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Devices::Enumeration::{DevicePairingProtectionLevel, DevicePairingResultStatus};
use windows::Foundation::TypedEventHandler;

trait WinRtResultExt<T> {
    fn during(self, operation: NativeOperation) -> Result<T>;
}

impl<T> WinRtResultExt<T> for windows::core::Result<T> {
    fn during(self, operation: NativeOperation) -> Result<T> {
        self.map_err(|e| DeviceError::native(operation, e.to_string()))
    }
}

/// GATT service returned by WinRT enumeration
pub struct WinRtService {
    service: GattDeviceService,
    uuid: Uuid,
    attribute_handle: u16,
}

impl WinRtService {
    fn new(service: GattDeviceService) -> windows::core::Result<Self> {
        let uuid = Uuid::from_u128(service.Uuid()?.to_u128());
        let attribute_handle = service.AttributeHandle()?;
        Ok(Self {
            service,
            uuid,
            attribute_handle,
        })
    }

    pub fn service(&self) -> &GattDeviceService {
        &self.service
    }
}

impl fmt::Debug for WinRtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WinRtService")
            .field("uuid", &self.uuid)
            .field("attribute_handle", &self.attribute_handle)
            .finish()
    }
}

impl NativeService for WinRtService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn attribute_handle(&self) -> u16 {
        self.attribute_handle
    }
}

/// BLE peripheral handle backed by WinRT
pub struct WinRtDevice {
    device: BluetoothLEDevice,
    address: u64,
    session: Mutex<Option<GattSession>>,
}

impl WinRtDevice {
    /// Open a device by Bluetooth address
    pub async fn from_address(address: u64) -> Result<Self> {
        info!("Opening Bluetooth device: {:#X}", address);
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)
            .during(NativeOperation::Connect)?
            .await
            .during(NativeOperation::Connect)?;
        Self::new(device).during(NativeOperation::Connect)
    }

    /// Wrap an opened device; fails if its address cannot be read
    pub fn new(device: BluetoothLEDevice) -> windows::core::Result<Self> {
        let address = device.BluetoothAddress()?;
        Ok(Self {
            device,
            address,
            session: Mutex::new(None),
        })
    }

    fn event_handler(handler: EventHandler) -> TypedEventHandler<BluetoothLEDevice, IInspectable> {
        TypedEventHandler::<BluetoothLEDevice, IInspectable>::new(
            move |_: windows::core::Ref<BluetoothLEDevice>, _: windows::core::Ref<IInspectable>| {
                handler();
                Ok(())
            },
        )
    }
}

#[async_trait]
impl NativeDevice for WinRtDevice {
    fn address(&self) -> u64 {
        self.address
    }

    fn name(&self) -> String {
        self.device
            .Name()
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    fn is_connected(&self) -> bool {
        self.device
            .ConnectionStatus()
            .map(|s| s == BluetoothConnectionStatus::Connected)
            .unwrap_or(false)
    }

    fn on_connection_status_changed(&self, handler: EventHandler) -> Result<EventToken> {
        self.device
            .ConnectionStatusChanged(&Self::event_handler(handler))
            .map(EventToken)
            .during(NativeOperation::Subscribe)
    }

    fn remove_connection_status_changed(&self, token: EventToken) {
        if let Err(e) = self.device.RemoveConnectionStatusChanged(token.0) {
            warn!("Failed to remove status handler: {}", e);
        }
    }

    fn on_name_changed(&self, handler: EventHandler) -> Result<EventToken> {
        self.device
            .NameChanged(&Self::event_handler(handler))
            .map(EventToken)
            .during(NativeOperation::Subscribe)
    }

    fn remove_name_changed(&self, token: EventToken) {
        if let Err(e) = self.device.RemoveNameChanged(token.0) {
            warn!("Failed to remove name handler: {}", e);
        }
    }

    /// WinRT has no explicit connect; a GattSession that maintains the
    /// connection keeps the link up until it is released.
    async fn connect(&self) -> Result<()> {
        let device_id = self
            .device
            .BluetoothDeviceId()
            .during(NativeOperation::Connect)?;
        let session = GattSession::FromDeviceIdAsync(&device_id)
            .during(NativeOperation::Connect)?
            .await
            .during(NativeOperation::Connect)?;
        session
            .SetMaintainConnection(true)
            .during(NativeOperation::Connect)?;

        info!("GattSession created, MaintainConnection set to true");
        if let Some(previous) = self.session.lock().replace(session) {
            let _ = previous.Close();
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        if let Some(session) = self.session.lock().take() {
            session
                .SetMaintainConnection(false)
                .during(NativeOperation::Disconnect)?;
            session.Close().during(NativeOperation::Disconnect)?;
        }
        Ok(())
    }

    async fn enumerate_services(
        &self,
        cache_mode: CacheMode,
    ) -> Result<Vec<Arc<dyn NativeService>>> {
        let mode = match cache_mode {
            CacheMode::Cached => BluetoothCacheMode::Cached,
            CacheMode::Uncached => BluetoothCacheMode::Uncached,
        };
        let op = NativeOperation::EnumerateServices;

        let result = self
            .device
            .GetGattServicesWithCacheModeAsync(mode)
            .during(op)?
            .await
            .during(op)?;

        let status = result.Status().during(op)?;
        if status != GattCommunicationStatus::Success {
            return Err(DeviceError::native(
                op,
                format!("GATT communication status {:?}", status),
            ));
        }

        let services = result.Services().during(op)?;
        let count = services.Size().during(op)?;
        let mut found: Vec<Arc<dyn NativeService>> = Vec::with_capacity(count as usize);
        for i in 0..count {
            let service = services.GetAt(i).during(op)?;
            found.push(Arc::new(WinRtService::new(service).during(op)?));
        }
        Ok(found)
    }

    fn is_paired(&self) -> bool {
        self.device
            .DeviceInformation()
            .and_then(|info| info.Pairing())
            .and_then(|pairing| pairing.IsPaired())
            .unwrap_or(false)
    }

    async fn pair(&self, protection_level: ProtectionLevel) -> Result<PairingResultStatus> {
        let level = match protection_level {
            ProtectionLevel::None => DevicePairingProtectionLevel::None,
            ProtectionLevel::Encryption => DevicePairingProtectionLevel::Encryption,
            ProtectionLevel::EncryptionAndAuthentication => {
                DevicePairingProtectionLevel::EncryptionAndAuthentication
            }
        };
        let op = NativeOperation::Pair;

        let pairing = self
            .device
            .DeviceInformation()
            .and_then(|info| info.Pairing())
            .during(op)?;
        let result = pairing
            .PairWithProtectionLevelAsync(level)
            .during(op)?
            .await
            .during(op)?;

        let status = result.Status().during(op)?;
        Ok(match status {
            DevicePairingResultStatus::Paired => PairingResultStatus::Paired,
            DevicePairingResultStatus::AlreadyPaired => PairingResultStatus::AlreadyPaired,
            DevicePairingResultStatus::NotReadyToPair => PairingResultStatus::NotReadyToPair,
            DevicePairingResultStatus::NotPaired => PairingResultStatus::NotPaired,
            DevicePairingResultStatus::ConnectionRejected => {
                PairingResultStatus::ConnectionRejected
            }
            DevicePairingResultStatus::AuthenticationFailure => {
                PairingResultStatus::AuthenticationFailure
            }
            DevicePairingResultStatus::RejectedByHandler => PairingResultStatus::RejectedByHandler,
            DevicePairingResultStatus::PairingCanceled => PairingResultStatus::Canceled,
            _ => PairingResultStatus::Failed,
        })
    }
}

impl Drop for WinRtDevice {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            let _ = session.Close();
        }
        let _ = self.device.Close();
    }
}
