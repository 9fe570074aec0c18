//! Native Platform Contract
//!
//! The narrow interface the device core consumes from a platform BLE stack.
//! Event registration is token based: every `on_*` call returns a token that
//! the matching `remove_*` call unregisters.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Callback invoked by the platform when a native event fires
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// Registration handle returned by the platform for an event handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventToken(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Cached,
    Uncached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    None,
    Encryption,
    EncryptionAndAuthentication,
}

/// Outcome reported by a native pairing negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingResultStatus {
    Paired,
    AlreadyPaired,
    NotReadyToPair,
    NotPaired,
    ConnectionRejected,
    AuthenticationFailure,
    RejectedByHandler,
    Canceled,
    Failed,
}

/// A GATT service as enumerated by the platform
pub trait NativeService: fmt::Debug + Send + Sync {
    fn uuid(&self) -> Uuid;
    fn attribute_handle(&self) -> u16;
}

/// Platform BLE device handle.
///
/// Implementations must not invoke a handler synchronously from inside the
/// call that registers it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NativeDevice: Send + Sync + 'static {
    fn address(&self) -> u64;

    fn name(&self) -> String;

    fn is_connected(&self) -> bool;

    fn on_connection_status_changed(&self, handler: EventHandler) -> Result<EventToken>;

    fn remove_connection_status_changed(&self, token: EventToken);

    fn on_name_changed(&self, handler: EventHandler) -> Result<EventToken>;

    fn remove_name_changed(&self, token: EventToken);

    async fn connect(&self) -> Result<()>;

    fn disconnect(&self) -> Result<()>;

    async fn enumerate_services(&self, cache_mode: CacheMode)
        -> Result<Vec<Arc<dyn NativeService>>>;

    fn is_paired(&self) -> bool;

    async fn pair(&self, protection_level: ProtectionLevel) -> Result<PairingResultStatus>;
}
