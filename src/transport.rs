//! The blocking capability interface the device handle talks to.
//!
//! Everything BLE-specific (scanning, GATT discovery, link security, bonding)
//! lives behind [`Transport`]. On Linux the binary talks to BlueZ through
//! [`bluez::BluezConnector`], which can bond; elsewhere it uses
//! [`btle::BtleConnector`]. Tests substitute their own.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub mod btle;
#[cfg(target_os = "linux")]
pub mod bluez;

pub use btle::{BtleConnector, BtleTransport};
#[cfg(target_os = "linux")]
pub use bluez::{BluezConnector, BluezTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => f.write_str("public"),
            AddressType::Random => f.write_str("random"),
        }
    }
}

/// Link security tiers. `High` means authenticated (passkey) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityLevel::Low => f.write_str("low"),
            SecurityLevel::Medium => f.write_str("medium"),
            SecurityLevel::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub address: String,
    pub address_type: AddressType,
    /// Local adapter index.
    pub interface: usize,
    /// How long to scan for the peripheral before giving up.
    pub scan_timeout: Duration,
    /// Log raw transport traffic.
    pub debug: bool,
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        ConnectionConfig {
            address: address.into(),
            address_type: AddressType::Random,
            interface: 0,
            scan_timeout: Duration::from_secs(10),
            debug: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no bluetooth adapter with index {0}")]
    AdapterUnavailable(usize),
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
    #[error("device is not paired")]
    NotPaired,
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),
    #[error("device disconnected")]
    Disconnected,
    #[error("failed to start the bluetooth runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Btle(#[from] btleplug::Error),
    #[cfg(target_os = "linux")]
    #[error(transparent)]
    Bluez(#[from] bluez_async::BluetoothError),
}

/// A live connection to one peripheral. All calls block.
pub trait Transport {
    type Service: Clone + fmt::Debug;
    type Characteristic: Clone + fmt::Debug;

    /// First service with the given UUID, if the peripheral has one.
    fn find_service(&mut self, uuid: Uuid) -> Result<Option<Self::Service>, TransportError>;

    /// First characteristic with the given UUID inside `service`.
    fn find_characteristic(
        &mut self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Option<Self::Characteristic>, TransportError>;

    fn read(&mut self, characteristic: &Self::Characteristic) -> Result<Vec<u8>, TransportError>;

    fn set_security(&mut self, level: SecurityLevel) -> Result<(), TransportError>;

    fn pair(&mut self) -> Result<(), TransportError>;

    /// Fails with [`TransportError::NotPaired`] when there is no bond to remove.
    fn unpair(&mut self) -> Result<(), TransportError>;

    /// Blocks until a notification arrives or `timeout` elapses. Returns
    /// whether a notification was received.
    fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool, TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Opens [`Transport`] connections.
pub trait Connector {
    type Transport: Transport;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<Self::Transport, TransportError>;
}
