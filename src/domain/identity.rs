//! Device Identity
//!
//! Hardware addresses and the device identifiers derived from them.

use crate::error::{DeviceError, Result};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Largest value representable in 48 bits
pub const MAX_ADDRESS: u64 = 0xFFFF_FFFF_FFFF;

/// A 48-bit Bluetooth hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BluetoothAddress(u64);

impl BluetoothAddress {
    /// Address as a raw integer
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Address bytes, most significant first
    pub fn octets(&self) -> [u8; 6] {
        let bytes = self.0.to_be_bytes();
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&bytes[2..]);
        octets
    }
}

impl TryFrom<u64> for BluetoothAddress {
    type Error = DeviceError;

    fn try_from(value: u64) -> Result<Self> {
        if value > MAX_ADDRESS {
            return Err(DeviceError::InvalidInput(format!(
                "address {:#X} does not fit in 48 bits",
                value
            )));
        }
        Ok(Self(value))
    }
}

impl FromStr for BluetoothAddress {
    type Err = DeviceError;

    /// Accepts exactly 12 hex digits, either bare or as six colon-separated pairs.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DeviceError::InvalidInput(format!("malformed Bluetooth address {:?}", s));

        let digits = if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
                return Err(invalid());
            }
            parts.concat()
        } else {
            s.to_string()
        };

        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let value = u64::from_str_radix(&digits, 16).map_err(|_| invalid())?;
        Self::try_from(value)
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// Stable 128-bit device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Derive the device identifier for a hardware address.
///
/// The six address bytes occupy bytes 10..16 of the identifier and the rest
/// stay zero, so distinct addresses always yield distinct identifiers.
pub fn derive_identity(address: BluetoothAddress) -> DeviceId {
    let mut bytes = [0u8; 16];
    bytes[10..].copy_from_slice(&address.octets());
    DeviceId(Uuid::from_bytes(bytes))
}
