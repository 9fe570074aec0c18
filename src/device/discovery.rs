//! Service Discovery Module
//!
//! Ref-counted, resettable multicast of discovered GATT services.
//!
//! ```text
//!   Idle ──first subscriber──▶ Active ──Connected──▶ enumerate once ──▶ emit
//!    ▲                           │  ▲                                    │
//!    │                    Disconnected│                                  │
//!    │                           ▼  │                                    │
//!    └──last detach / failure── Resetting ◀──────────Disconnected────────┘
//! ```
//!
//! One driver task per activation owns the status subscription and the
//! in-flight enumeration. Every activation gets a fresh generation number and
//! anything tagged with an older generation is dropped on arrival.

use crate::device::connection::{StatusHub, StatusStream};
use crate::device::service::{EpisodeLiveness, GattService};
use crate::domain::identity::DeviceId;
use crate::domain::models::ConnectionStatus;
use crate::domain::native::{CacheMode, NativeDevice, NativeService};
use crate::error::{DeviceError, NativeOperation, Result};
use crate::reactive::{SubscriberId, SubscriberRegistry, Subscription};
use futures::future::{BoxFuture, OptionFuture};
use futures::{ready, Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Services discovered per connection episode.
///
/// Services queued before their episode ended are skipped on receipt, so a
/// slow reader never sees handles from a previous connection.
#[derive(Debug)]
pub struct ServiceStream {
    inner: Subscription<Result<GattService>>,
}

impl Stream for ServiceStream {
    type Item = Result<GattService>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(service)) if !service.is_valid() => {
                    debug!("Skipping stale service (handle {:#06x})", service.attribute_handle());
                }
                item => return Poll::Ready(item),
            }
        }
    }
}

type Enumeration = BoxFuture<'static, Result<Vec<Arc<dyn NativeService>>>>;

pub(crate) struct ServiceDiscovery {
    device_id: DeviceId,
    native: Arc<dyn NativeDevice>,
    status: Arc<StatusHub>,
    timeout: Duration,
    runtime: Handle,
    state: Mutex<DiscoveryState>,
}

struct DiscoveryState {
    generation: u64,
    active: Option<ActiveDiscovery>,
}

struct ActiveDiscovery {
    generation: u64,
    driver: Option<JoinHandle<()>>,
    subscribers: SubscriberRegistry<Result<GattService>>,
    /// `None` while resetting or waiting for the first connection
    episode: Option<Episode>,
}

struct Episode {
    services: Vec<GattService>,
    liveness: Arc<EpisodeLiveness>,
}

impl Episode {
    fn new() -> Self {
        Self {
            services: Vec::new(),
            liveness: EpisodeLiveness::new(),
        }
    }
}

impl ActiveDiscovery {
    fn close_episode(&mut self) {
        if let Some(episode) = self.episode.take() {
            episode.liveness.invalidate();
        }
    }
}

impl ServiceDiscovery {
    pub(crate) fn new(
        device_id: DeviceId,
        native: Arc<dyn NativeDevice>,
        status: Arc<StatusHub>,
        timeout: Duration,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            device_id,
            native,
            status,
            timeout,
            runtime,
            state: Mutex::new(DiscoveryState {
                generation: 0,
                active: None,
            }),
        })
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<ServiceStream> {
        let mut state = self.state.lock();

        let (generation, id, rx) = match state.active.as_mut() {
            Some(active) => {
                let replay: Vec<Result<GattService>> = active
                    .episode
                    .as_ref()
                    .map(|episode| episode.services.iter().cloned().map(Ok).collect())
                    .unwrap_or_default();
                let (id, rx) = active.subscribers.insert(replay);
                (active.generation, id, rx)
            }
            None => {
                let statuses = self.status.subscribe()?;
                state.generation += 1;
                let generation = state.generation;

                let mut subscribers = SubscriberRegistry::new();
                let (id, rx) = subscribers.insert(Vec::new());
                let driver = self
                    .runtime
                    .spawn(drive(Arc::downgrade(self), generation, statuses));

                debug!("Service discovery activated (generation {})", generation);
                state.active = Some(ActiveDiscovery {
                    generation,
                    driver: Some(driver),
                    subscribers,
                    episode: None,
                });
                (generation, id, rx)
            }
        };
        drop(state);

        let weak = Arc::downgrade(self);
        let inner = Subscription::new(rx, move || {
            if let Some(discovery) = weak.upgrade() {
                discovery.detach(generation, id);
            }
        });
        Ok(ServiceStream { inner })
    }

    fn detach(&self, generation: u64, id: SubscriberId) {
        let mut state = self.state.lock();
        let Some(active) = state
            .active
            .as_mut()
            .filter(|active| active.generation == generation)
        else {
            return;
        };

        active.subscribers.remove(id);
        if !active.subscribers.is_empty() {
            return;
        }

        let mut finished = state.active.take();
        drop(state);

        if let Some(active) = finished.as_mut() {
            active.close_episode();
            if let Some(driver) = active.driver.take() {
                driver.abort();
            }
            debug!("Service discovery torn down (generation {})", generation);
        }
    }

    fn active_for(
        state: &mut DiscoveryState,
        generation: u64,
    ) -> Option<&mut ActiveDiscovery> {
        state
            .active
            .as_mut()
            .filter(|active| active.generation == generation)
    }

    fn open_episode(&self, generation: u64) -> Option<Enumeration> {
        let mut state = self.state.lock();
        let active = Self::active_for(&mut state, generation)?;
        active.close_episode();
        active.episode = Some(Episode::new());
        info!("Device connected, enumerating GATT services");
        Some(self.enumerate())
    }

    fn reset_episode(&self, generation: u64) {
        let mut state = self.state.lock();
        if let Some(active) = Self::active_for(&mut state, generation) {
            active.close_episode();
            info!("Device disconnected, discarding discovered services");
        }
    }

    fn publish(&self, generation: u64, services: Vec<Arc<dyn NativeService>>) {
        let mut state = self.state.lock();
        let Some(active) = Self::active_for(&mut state, generation) else {
            return;
        };
        let Some(episode) = active.episode.as_mut() else {
            return;
        };

        info!("Discovered {} GATT services", services.len());
        for native in services {
            let service = GattService::new(native, self.device_id, Arc::clone(&episode.liveness));
            debug!("Service {} (handle {:#06x})", service.uuid(), service.attribute_handle());
            episode.services.push(service.clone());
            active.subscribers.broadcast(&Ok(service));
        }
    }

    /// Deliver `error` to every attached subscriber and return to idle
    fn fail(&self, generation: u64, error: DeviceError) {
        let mut state = self.state.lock();
        if Self::active_for(&mut state, generation).is_none() {
            return;
        }
        let Some(mut active) = state.active.take() else {
            return;
        };
        drop(state);

        warn!("Service discovery failed: {}", error);
        active.close_episode();
        active.subscribers.broadcast(&Err(error));
        active.subscribers.clear();
    }

    fn enumerate(&self) -> Enumeration {
        let native = Arc::clone(&self.native);
        let timeout = self.timeout;
        Box::pin(async move {
            tokio::time::timeout(timeout, native.enumerate_services(CacheMode::Uncached))
                .await
                .map_err(|_| DeviceError::Timeout {
                    operation: NativeOperation::EnumerateServices,
                    timeout,
                })?
        })
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().active.is_some()
    }
}

impl Drop for ServiceDiscovery {
    fn drop(&mut self) {
        if let Some(mut active) = self.state.get_mut().active.take() {
            active.close_episode();
            if let Some(driver) = active.driver.take() {
                driver.abort();
            }
        }
    }
}

/// Follow the status stream for one activation, enumerating on every
/// transition into Connected and resetting on every transition out of it.
async fn drive(weak: Weak<ServiceDiscovery>, generation: u64, mut statuses: StatusStream) {
    let mut connected = false;
    let mut pending: Option<Enumeration> = None;

    loop {
        // Status first: a Disconnected queued alongside a finished
        // enumeration must reset the episode before anything is published.
        tokio::select! {
            biased;

            status = statuses.next() => {
                let Some(status) = status else {
                    debug!("Status stream closed, stopping service discovery");
                    return;
                };
                let Some(discovery) = weak.upgrade() else {
                    return;
                };

                match status {
                    ConnectionStatus::Connected if !connected => {
                        connected = true;
                        pending = discovery.open_episode(generation);
                    }
                    ConnectionStatus::Disconnected if connected => {
                        connected = false;
                        pending = None;
                        discovery.reset_episode(generation);
                    }
                    _ => {}
                }
            }
            Some(result) = OptionFuture::from(pending.as_mut()) => {
                pending = None;
                let Some(discovery) = weak.upgrade() else {
                    return;
                };

                match result {
                    Ok(services) => discovery.publish(generation, services),
                    Err(e) => {
                        discovery.fail(generation, e);
                        return;
                    }
                }
            }
        }
    }
}
