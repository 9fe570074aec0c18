//! Connection Module
//!
//! Connect/disconnect requests and the replay-latest status stream.

use crate::domain::models::{ConnectionConfig, ConnectionStatus};
use crate::domain::native::{EventHandler, EventToken, NativeDevice};
use crate::error::{DeviceError, NativeOperation, Result};
use crate::reactive::{SubscriberRegistry, Subscription};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

pub type StatusStream = Subscription<ConnectionStatus>;

/// Permanent multicast over the native connection-status event.
///
/// The native handler is registered on first subscription and stays
/// registered until the hub is dropped.
pub(crate) struct StatusHub {
    native: Arc<dyn NativeDevice>,
    state: Mutex<StatusState>,
}

struct StatusState {
    token: Option<EventToken>,
    latest: ConnectionStatus,
    subscribers: SubscriberRegistry<ConnectionStatus>,
}

impl StatusHub {
    fn new(native: Arc<dyn NativeDevice>) -> Arc<Self> {
        let latest = ConnectionStatus::from_native(native.is_connected());
        Arc::new(Self {
            native,
            state: Mutex::new(StatusState {
                token: None,
                latest,
                subscribers: SubscriberRegistry::new(),
            }),
        })
    }

    pub(crate) fn current(&self) -> ConnectionStatus {
        ConnectionStatus::from_native(self.native.is_connected())
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<StatusStream> {
        let mut state = self.state.lock();

        if state.token.is_none() {
            let weak = Arc::downgrade(self);
            let handler: EventHandler = Arc::new(move || {
                if let Some(hub) = weak.upgrade() {
                    hub.publish();
                }
            });
            let token = self.native.on_connection_status_changed(handler)?;
            state.token = Some(token);
            state.latest = self.current();
            debug!("Status stream activated ({:?})", state.latest);
        }

        let latest = state.latest;
        let (id, rx) = state.subscribers.insert([latest]);
        drop(state);

        let weak: Weak<Self> = Arc::downgrade(self);
        Ok(Subscription::new(rx, move || {
            if let Some(hub) = weak.upgrade() {
                hub.state.lock().subscribers.remove(id);
            }
        }))
    }

    fn publish(&self) {
        let mut state = self.state.lock();
        let status = self.current();
        if status != state.latest {
            info!("Connection status changed: {:?} -> {:?}", state.latest, status);
        }
        state.latest = status;
        state.subscribers.broadcast(&status);
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }
}

impl Drop for StatusHub {
    fn drop(&mut self) {
        if let Some(token) = self.state.get_mut().token.take() {
            self.native.remove_connection_status_changed(token);
        }
    }
}

/// Issues connect/disconnect against the native handle and owns the status stream
pub struct ConnectionController {
    native: Arc<dyn NativeDevice>,
    status: Arc<StatusHub>,
    connect_timeout: Duration,
}

impl ConnectionController {
    pub fn new(native: Arc<dyn NativeDevice>, connect_timeout: Duration) -> Self {
        let status = StatusHub::new(Arc::clone(&native));
        Self {
            native,
            status,
            connect_timeout,
        }
    }

    pub(crate) fn hub(&self) -> &Arc<StatusHub> {
        &self.status
    }

    /// Request a connection.
    ///
    /// Resolves once the request has been issued; observe `status_changes`
    /// for the link actually coming up. A no-op when already connected.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<()> {
        if self.status() == ConnectionStatus::Connected {
            debug!("Connect requested while already connected");
            return Ok(());
        }

        info!(
            "Requesting connection (priority: {:?}, auto_reconnect: {})",
            config.priority, config.auto_reconnect
        );
        if config.auto_reconnect {
            debug!("Automatic reconnect is left to the platform");
        }

        tokio::time::timeout(self.connect_timeout, self.native.connect())
            .await
            .map_err(|_| DeviceError::Timeout {
                operation: NativeOperation::Connect,
                timeout: self.connect_timeout,
            })?
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.current()
    }

    pub fn status_changes(&self) -> Result<StatusStream> {
        self.status.subscribe()
    }

    /// Fire-and-forget disconnect; the outcome arrives on the status stream
    pub fn cancel_connection(&self) {
        info!("Cancelling connection");
        if let Err(e) = self.native.disconnect() {
            warn!("Disconnect request failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::native::MockNativeDevice;
    use crate::testing::FakeNative;
    use futures::{FutureExt, StreamExt};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn controller(native: &Arc<FakeNative>) -> ConnectionController {
        ConnectionController::new(native.clone(), TIMEOUT)
    }

    #[test]
    fn test_initial_status_read_from_native() {
        let connected = FakeNative::new(1, true);
        assert_eq!(controller(&connected).status(), ConnectionStatus::Connected);

        let disconnected = FakeNative::new(1, false);
        assert_eq!(
            controller(&disconnected).status(),
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_three_subscribers_see_initial_status_once() {
        let native = FakeNative::new(1, false);
        let controller = controller(&native);

        let mut streams: Vec<StatusStream> = (0..3)
            .map(|_| controller.status_changes().unwrap())
            .collect();

        for stream in streams.iter_mut() {
            assert_eq!(stream.next().await, Some(ConnectionStatus::Disconnected));
            assert!(stream.next().now_or_never().is_none());
        }
        assert_eq!(native.status_registrations(), 1);
        assert_eq!(controller.hub().subscriber_count(), 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_latest() {
        let native = FakeNative::new(1, false);
        let controller = controller(&native);
        let mut early = controller.status_changes().unwrap();

        native.set_connected(true);
        assert_eq!(early.next().await, Some(ConnectionStatus::Disconnected));
        assert_eq!(early.next().await, Some(ConnectionStatus::Connected));

        let mut late = controller.status_changes().unwrap();
        assert_eq!(late.next().await, Some(ConnectionStatus::Connected));
        assert!(late.next().now_or_never().is_none());
        assert_eq!(native.status_registrations(), 1);
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let native = FakeNative::new(1, false);
        let controller = controller(&native);
        let mut stream = controller.status_changes().unwrap();

        native.set_connected(true);
        native.set_connected(false);
        native.set_connected(true);

        let seen: Vec<_> = stream.by_ref().take(4).collect().await;
        assert_eq!(
            seen,
            vec![
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_dropping_subscribers_keeps_native_handler() {
        let native = FakeNative::new(1, true);
        let controller = controller(&native);

        drop(controller.status_changes().unwrap());
        assert_eq!(controller.hub().subscriber_count(), 0);
        assert_eq!(native.active_status_handlers(), 1);

        drop(controller.status_changes().unwrap());
        assert_eq!(native.status_registrations(), 1);
    }

    #[tokio::test]
    async fn test_teardown_ends_streams_and_unregisters() {
        let native = FakeNative::new(1, true);
        let controller = controller(&native);
        let mut stream = controller.status_changes().unwrap();
        assert_eq!(stream.next().await, Some(ConnectionStatus::Connected));

        drop(controller);
        assert_eq!(stream.next().await, None);
        assert_eq!(native.active_status_handlers(), 0);
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let mut mock = MockNativeDevice::new();
        mock.expect_is_connected().return_const(true);
        mock.expect_connect().never();

        let controller = ConnectionController::new(Arc::new(mock), TIMEOUT);
        controller.connect(&ConnectionConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_issues_one_native_request() {
        let mut mock = MockNativeDevice::new();
        mock.expect_is_connected().return_const(false);
        mock.expect_connect().times(1).returning(|| Ok(()));

        let controller = ConnectionController::new(Arc::new(mock), TIMEOUT);
        controller.connect(&ConnectionConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let mut mock = MockNativeDevice::new();
        mock.expect_is_connected().return_const(false);
        mock.expect_connect()
            .returning(|| Err(DeviceError::native(NativeOperation::Connect, "radio off")));

        let controller = ConnectionController::new(Arc::new(mock), TIMEOUT);
        let err = controller
            .connect(&ConnectionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Native {
                operation: NativeOperation::Connect,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out() {
        let native = FakeNative::new(1, false);
        native.hang_connect();
        let controller = ConnectionController::new(native.clone(), Duration::from_millis(250));

        let err = controller
            .connect(&ConnectionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::Timeout {
                operation: NativeOperation::Connect,
                timeout: Duration::from_millis(250),
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_connection_reaches_status_stream() {
        let native = FakeNative::new(1, true);
        let controller = controller(&native);
        let mut stream = controller.status_changes().unwrap();
        assert_eq!(stream.next().await, Some(ConnectionStatus::Connected));

        controller.cancel_connection();
        assert_eq!(native.disconnects(), 1);
        assert_eq!(stream.next().await, Some(ConnectionStatus::Disconnected));
    }
}
