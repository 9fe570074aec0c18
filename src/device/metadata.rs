//! Metadata Module
//!
//! Device name stream plus the MTU and RSSI capabilities, which the native
//! layer does not provide.

use crate::domain::native::{EventHandler, EventToken, NativeDevice};
use crate::error::{Capability, DeviceError, Result};
use crate::reactive::{SubscriberId, SubscriberRegistry, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type NameStream = Subscription<String>;

/// Smallest ATT MTU permitted by the Bluetooth core specification
pub const MIN_MTU: u16 = 23;
/// Largest ATT MTU permitted by the Bluetooth core specification
pub const MAX_MTU: u16 = 517;

/// Ref-counted multicast over the native name-changed event.
///
/// Each activation emits the current name to the subscriber that triggered
/// it; later joiners only see subsequent changes.
pub(crate) struct NameHub {
    native: Arc<dyn NativeDevice>,
    state: Mutex<NameState>,
}

struct NameState {
    token: Option<EventToken>,
    subscribers: SubscriberRegistry<String>,
}

impl NameHub {
    pub(crate) fn new(native: Arc<dyn NativeDevice>) -> Arc<Self> {
        Arc::new(Self {
            native,
            state: Mutex::new(NameState {
                token: None,
                subscribers: SubscriberRegistry::new(),
            }),
        })
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<NameStream> {
        let mut state = self.state.lock();

        let initial = if state.token.is_none() {
            let weak = Arc::downgrade(self);
            let handler: EventHandler = Arc::new(move || {
                if let Some(hub) = weak.upgrade() {
                    hub.publish();
                }
            });
            state.token = Some(self.native.on_name_changed(handler)?);
            debug!("Name stream activated");
            Some(self.native.name())
        } else {
            None
        };

        let (id, rx) = state.subscribers.insert(initial);
        drop(state);

        let weak = Arc::downgrade(self);
        Ok(Subscription::new(rx, move || {
            if let Some(hub) = weak.upgrade() {
                hub.detach(id);
            }
        }))
    }

    fn detach(&self, id: SubscriberId) {
        let mut state = self.state.lock();
        state.subscribers.remove(id);
        if state.subscribers.is_empty() {
            if let Some(token) = state.token.take() {
                self.native.remove_name_changed(token);
                debug!("Name stream torn down");
            }
        }
    }

    fn publish(&self) {
        let mut state = self.state.lock();
        if state.token.is_some() {
            let name = self.native.name();
            debug!("Device name changed: {}", name);
            state.subscribers.broadcast(&name);
        }
    }
}

impl Drop for NameHub {
    fn drop(&mut self) {
        if let Some(token) = self.state.get_mut().token.take() {
            self.native.remove_name_changed(token);
        }
    }
}

pub fn request_mtu(size: u16) -> Result<u16> {
    if !(MIN_MTU..=MAX_MTU).contains(&size) {
        return Err(DeviceError::InvalidInput(format!(
            "MTU {} outside {}..={}",
            size, MIN_MTU, MAX_MTU
        )));
    }
    Err(DeviceError::Unsupported(Capability::Mtu))
}

pub fn mtu_changes() -> Result<Subscription<u16>> {
    Err(DeviceError::Unsupported(Capability::Mtu))
}

pub fn current_mtu() -> Result<u16> {
    Err(DeviceError::Unsupported(Capability::Mtu))
}

pub fn rssi_updates(frequency: Option<Duration>) -> Result<Subscription<i16>> {
    if frequency.is_some_and(|f| f.is_zero()) {
        return Err(DeviceError::InvalidInput(
            "RSSI update frequency must be non-zero".to_string(),
        ));
    }
    Err(DeviceError::Unsupported(Capability::Rssi))
}
