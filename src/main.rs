//! `ble-probe <address>`: connect to a peripheral and log its status and
//! discovered services until Ctrl-C.

use anyhow::Context;
use ble_device::domain::{BluetoothAddress, SettingsService};
use std::str::FromStr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().unwrap_or_else(|e| {
        eprintln!("Failed to load settings, using defaults: {}", e);
        SettingsService::with_path(std::env::temp_dir().join("ble_device_settings.json"))
    });

    let _logging_guard = ble_device::infrastructure::logging::init_logger(
        &settings_service.get().log_settings,
    )
    .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
    .ok();

    let arg = std::env::args()
        .nth(1)
        .context("usage: ble-probe <address>")?;
    let address = BluetoothAddress::from_str(&arg)?;

    tracing::info!("Starting BLE probe for {}", address);
    probe(address, &settings_service).await
}

#[cfg(windows)]
async fn probe(address: BluetoothAddress, settings: &SettingsService) -> anyhow::Result<()> {
    use ble_device::infrastructure::bluetooth::WinRtDevice;
    use ble_device::{BleDevice, Device};
    use futures::StreamExt;
    use std::sync::Arc;
    use tracing::{error, info};

    let native = WinRtDevice::from_address(address.as_u64()).await?;
    let device = BleDevice::new(Arc::new(native), settings.get().device_settings())?;
    info!("Probing {} ({})", device.name(), device.id());

    let mut statuses = device.status_changes()?;
    let mut services = device.service_discoveries()?;
    device.connect(None).await?;

    loop {
        tokio::select! {
            Some(status) = statuses.next() => info!("Status: {:?}", status),
            Some(found) = services.next() => match found {
                Ok(service) => info!(
                    "Service {} (handle {:#06X})",
                    service.uuid(),
                    service.attribute_handle()
                ),
                Err(e) => error!("Service discovery failed: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    device.cancel_connection();
    info!("Probe finished");
    Ok(())
}

#[cfg(not(windows))]
async fn probe(address: BluetoothAddress, _settings: &SettingsService) -> anyhow::Result<()> {
    anyhow::bail!("no native BLE backend on this platform, cannot probe {}", address)
}
