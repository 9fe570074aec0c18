//! Transaction Module
//!
//! Client-side queue for reliable characteristic writes.

use crate::domain::identity::DeviceId;
use crate::error::{Capability, DeviceError, Result};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedWrite {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Queue of characteristic writes meant to be applied atomically.
///
/// The native contract has no write path, so `commit` reports the
/// capability as unsupported rather than pretending the writes landed.
#[derive(Debug)]
pub struct ReliableWriteTransaction {
    device_id: DeviceId,
    writes: Vec<QueuedWrite>,
}

impl ReliableWriteTransaction {
    pub(crate) fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            writes: Vec::new(),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn write(&mut self, characteristic: Uuid, value: impl Into<Vec<u8>>) {
        self.writes.push(QueuedWrite {
            characteristic,
            value: value.into(),
        });
    }

    pub fn writes(&self) -> &[QueuedWrite] {
        &self.writes
    }

    pub fn commit(self) -> Result<()> {
        debug!(
            "Reliable write of {} values to {} not supported",
            self.writes.len(),
            self.device_id
        );
        Err(DeviceError::Unsupported(Capability::ReliableWrite))
    }

    pub fn abort(self) {
        debug!("Reliable write to {} aborted", self.device_id);
    }
}
