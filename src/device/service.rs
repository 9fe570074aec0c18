//! Service Module
//!
//! Handles to GATT services found during one connection episode.

use crate::domain::identity::DeviceId;
use crate::domain::native::NativeService;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Liveness flag shared by every service discovered in one connection episode
#[derive(Debug)]
pub(crate) struct EpisodeLiveness(AtomicBool);

impl EpisodeLiveness {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub(crate) fn invalidate(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A GATT service discovered on a connected device.
///
/// Only valid for the connection episode that produced it; once the device
/// disconnects `is_valid` returns false and a fresh discovery is needed.
#[derive(Clone)]
pub struct GattService {
    native: Arc<dyn NativeService>,
    device_id: DeviceId,
    liveness: Arc<EpisodeLiveness>,
}

impl GattService {
    pub(crate) fn new(
        native: Arc<dyn NativeService>,
        device_id: DeviceId,
        liveness: Arc<EpisodeLiveness>,
    ) -> Self {
        Self {
            native,
            device_id,
            liveness,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.native.uuid()
    }

    pub fn attribute_handle(&self) -> u16 {
        self.native.attribute_handle()
    }

    /// Identifier of the owning device
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn is_valid(&self) -> bool {
        self.liveness.0.load(Ordering::SeqCst)
    }

    pub fn native(&self) -> &Arc<dyn NativeService> {
        &self.native
    }
}

impl fmt::Debug for GattService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GattService")
            .field("uuid", &self.uuid())
            .field("attribute_handle", &self.attribute_handle())
            .field("device_id", &self.device_id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl PartialEq for GattService {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.native, &other.native) && Arc::ptr_eq(&self.liveness, &other.liveness)
    }
}

impl Eq for GattService {}
