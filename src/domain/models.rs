//! Status and configuration models shared across the device core.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    /// Anything other than an explicit "connected" flag reads as disconnected.
    pub fn from_native(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingStatus {
    Paired,
    NotPaired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPriority {
    #[default]
    Normal,
    High,
    LowPower,
}

/// Options passed to a connect request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Whether the platform should re-establish the link on loss.
    /// The device core never reconnects on its own.
    pub auto_reconnect: bool,
    pub priority: ConnectionPriority,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            priority: ConnectionPriority::Normal,
        }
    }
}
