//! In-memory native device used by the unit tests.

use crate::domain::native::{
    CacheMode, EventHandler, EventToken, NativeDevice, NativeService, PairingResultStatus,
    ProtectionLevel,
};
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug)]
pub struct FakeService {
    pub uuid: Uuid,
    pub handle: u16,
}

impl NativeService for FakeService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn attribute_handle(&self) -> u16 {
        self.handle
    }
}

pub fn service(handle: u16) -> Arc<dyn NativeService> {
    Arc::new(FakeService {
        uuid: Uuid::from_u128(0x1800 + u128::from(handle)),
        handle,
    })
}

pub struct FakeNative {
    address: u64,
    name: Mutex<String>,
    connected: AtomicBool,
    paired: AtomicBool,
    next_token: AtomicI64,
    status_handlers: Mutex<HashMap<EventToken, EventHandler>>,
    name_handlers: Mutex<HashMap<EventToken, EventHandler>>,
    status_registrations: AtomicUsize,
    name_registrations: AtomicUsize,
    services: Mutex<Vec<Arc<dyn NativeService>>>,
    enumeration_failure: Mutex<Option<DeviceError>>,
    gate: watch::Sender<bool>,
    enumerations: AtomicUsize,
    completed_enumerations: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    hang_connect: AtomicBool,
    hang_pair: AtomicBool,
}

impl FakeNative {
    pub fn new(address: u64, connected: bool) -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            address,
            name: Mutex::new("Fake Peripheral".to_string()),
            connected: AtomicBool::new(connected),
            paired: AtomicBool::new(false),
            next_token: AtomicI64::new(1),
            status_handlers: Mutex::new(HashMap::new()),
            name_handlers: Mutex::new(HashMap::new()),
            status_registrations: AtomicUsize::new(0),
            name_registrations: AtomicUsize::new(0),
            services: Mutex::new(vec![service(1), service(2)]),
            enumeration_failure: Mutex::new(None),
            gate,
            enumerations: AtomicUsize::new(0),
            completed_enumerations: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            hang_connect: AtomicBool::new(false),
            hang_pair: AtomicBool::new(false),
        })
    }

    /// Flip the connection flag and fire the status event
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let handlers: Vec<EventHandler> = self.status_handlers.lock().values().cloned().collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn rename(&self, name: &str) {
        *self.name.lock() = name.to_string();
        let handlers: Vec<EventHandler> = self.name_handlers.lock().values().cloned().collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn set_services(&self, services: Vec<Arc<dyn NativeService>>) {
        *self.services.lock() = services;
    }

    pub fn fail_next_enumeration(&self, error: DeviceError) {
        *self.enumeration_failure.lock() = Some(error);
    }

    /// Hold enumerations in flight until `release_enumerations`
    pub fn hold_enumerations(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_enumerations(&self) {
        self.gate.send_replace(true);
    }

    pub fn hang_connect(&self) {
        self.hang_connect.store(true, Ordering::SeqCst);
    }

    pub fn hang_pair(&self) {
        self.hang_pair.store(true, Ordering::SeqCst);
    }

    pub fn active_status_handlers(&self) -> usize {
        self.status_handlers.lock().len()
    }

    pub fn active_name_handlers(&self) -> usize {
        self.name_handlers.lock().len()
    }

    pub fn status_registrations(&self) -> usize {
        self.status_registrations.load(Ordering::SeqCst)
    }

    pub fn name_registrations(&self) -> usize {
        self.name_registrations.load(Ordering::SeqCst)
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    pub fn completed_enumerations(&self) -> usize {
        self.completed_enumerations.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn token(&self) -> EventToken {
        EventToken(self.next_token.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl NativeDevice for FakeNative {
    fn address(&self) -> u64 {
        self.address
    }

    fn name(&self) -> String {
        self.name.lock().clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn on_connection_status_changed(&self, handler: EventHandler) -> Result<EventToken> {
        let token = self.token();
        self.status_registrations.fetch_add(1, Ordering::SeqCst);
        self.status_handlers.lock().insert(token, handler);
        Ok(token)
    }

    fn remove_connection_status_changed(&self, token: EventToken) {
        self.status_handlers.lock().remove(&token);
    }

    fn on_name_changed(&self, handler: EventHandler) -> Result<EventToken> {
        let token = self.token();
        self.name_registrations.fetch_add(1, Ordering::SeqCst);
        self.name_handlers.lock().insert(token, handler);
        Ok(token)
    }

    fn remove_name_changed(&self, token: EventToken) {
        self.name_handlers.lock().remove(&token);
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_connect.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.set_connected(false);
        Ok(())
    }

    async fn enumerate_services(
        &self,
        _cache_mode: CacheMode,
    ) -> Result<Vec<Arc<dyn NativeService>>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.map(|_| ());
        if opened.is_err() {
            future::pending::<()>().await;
        }

        self.completed_enumerations.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.enumeration_failure.lock().take() {
            return Err(error);
        }
        Ok(self.services.lock().clone())
    }

    fn is_paired(&self) -> bool {
        self.paired.load(Ordering::SeqCst)
    }

    async fn pair(&self, _protection_level: ProtectionLevel) -> Result<PairingResultStatus> {
        if self.hang_pair.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }
        self.paired.store(true, Ordering::SeqCst);
        Ok(PairingResultStatus::Paired)
    }
}
