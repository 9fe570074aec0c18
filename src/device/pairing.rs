//! Pairing Module
//!
//! Bond-state snapshot and single-shot pairing negotiation.

use crate::domain::models::PairingStatus;
use crate::domain::native::{NativeDevice, PairingResultStatus, ProtectionLevel};
use crate::error::{Capability, DeviceError, NativeOperation, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest PIN accepted by legacy pairing
pub const MAX_PIN_LENGTH: usize = 16;

pub struct PairingCoordinator {
    native: Arc<dyn NativeDevice>,
    timeout: Duration,
}

impl PairingCoordinator {
    pub fn new(native: Arc<dyn NativeDevice>, timeout: Duration) -> Self {
        Self { native, timeout }
    }

    pub fn pairing_status(&self) -> PairingStatus {
        if self.native.is_paired() {
            PairingStatus::Paired
        } else {
            PairingStatus::NotPaired
        }
    }

    /// Run one pairing negotiation with no protection level.
    ///
    /// Resolves `Ok(true)` only when the platform reports the device paired;
    /// every other negotiation outcome resolves `Ok(false)`. A PIN cannot be
    /// forwarded to the platform, so supplying one is rejected up front.
    pub async fn request_pairing(&self, pin: Option<&str>) -> Result<bool> {
        if let Some(pin) = pin {
            validate_pin(pin)?;
            return Err(DeviceError::Unsupported(Capability::PinPairing));
        }

        info!("Requesting pairing...");
        let status = tokio::time::timeout(self.timeout, self.native.pair(ProtectionLevel::None))
            .await
            .map_err(|_| DeviceError::Timeout {
                operation: NativeOperation::Pair,
                timeout: self.timeout,
            })??;

        info!("Pairing result: {:?}", status);
        if status != PairingResultStatus::Paired {
            warn!("Pairing was not completed");
        }
        Ok(status == PairingResultStatus::Paired)
    }
}

fn validate_pin(pin: &str) -> Result<()> {
    if pin.is_empty() || pin.len() > MAX_PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit())
    {
        return Err(DeviceError::InvalidInput(format!(
            "PIN must be 1-{} digits",
            MAX_PIN_LENGTH
        )));
    }
    Ok(())
}
