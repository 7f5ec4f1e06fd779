//! Read sensors of a BBC micro:bit over Bluetooth LE.
//!
//! [`Microbit`] wraps a connected [`Transport`] and exposes the temperature,
//! accelerometer, buttons and magnetometer services. [`app`] holds the pair
//! and poll flows used by the `microbit-poll` binary.

pub mod app;
pub mod cli;
pub mod device;
pub mod logging;
pub mod services;
pub mod transport;
pub mod uuids;

pub use device::{DeviceError, Microbit, Sensor};
pub use services::{Acceleration, ButtonStates, MagneticField, ServiceError};
#[cfg(target_os = "linux")]
pub use transport::BluezConnector;
pub use transport::{
    AddressType, BtleConnector, ConnectionConfig, Connector, SecurityLevel, Transport,
    TransportError,
};
