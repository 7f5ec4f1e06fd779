use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::{
    Acceleration, AccelerometerService, ButtonStates, ButtonsService, MagneticField,
    MagnetometerService, ServiceError, TemperatureService,
};
use crate::transport::{ConnectionConfig, Connector, SecurityLevel, Transport, TransportError};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{0} security is not currently supported")]
    UnsupportedSecurity(SecurityLevel),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Temperature,
    Accelerometer,
    Buttons,
    Magnetometer,
}

/// A connected micro:bit.
///
/// The link is released by [`Microbit::disconnect`] or, failing that, when
/// the handle is dropped.
pub struct Microbit<T: Transport> {
    transport: T,
    connected: bool,
    pub temperature: TemperatureService<T>,
    pub accelerometer: AccelerometerService<T>,
    pub buttons: ButtonsService<T>,
    pub magnetometer: MagnetometerService<T>,
}

impl<T: Transport> Microbit<T> {
    pub fn connect<C>(connector: &mut C, config: &ConnectionConfig) -> Result<Self, TransportError>
    where
        C: Connector<Transport = T>,
    {
        let transport = connector.connect(config)?;
        Ok(Self::new(transport))
    }

    /// Wraps an already connected transport.
    pub fn new(transport: T) -> Self {
        Microbit {
            transport,
            connected: true,
            temperature: TemperatureService::new(),
            accelerometer: AccelerometerService::new(),
            buttons: ButtonsService::new(),
            magnetometer: MagnetometerService::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn enable(&mut self, sensor: Sensor) -> Result<(), DeviceError> {
        debug!(?sensor, "enabling");
        match sensor {
            Sensor::Temperature => self.temperature.enable(&mut self.transport)?,
            Sensor::Accelerometer => self.accelerometer.enable(&mut self.transport)?,
            Sensor::Buttons => self.buttons.enable(&mut self.transport)?,
            Sensor::Magnetometer => self.magnetometer.enable(&mut self.transport)?,
        }
        Ok(())
    }

    pub fn read_temperature(&mut self) -> Result<u8, DeviceError> {
        Ok(self.temperature.read(&mut self.transport)?)
    }

    pub fn read_acceleration(&mut self) -> Result<Acceleration, DeviceError> {
        Ok(self.accelerometer.read(&mut self.transport)?)
    }

    pub fn read_buttons(&mut self) -> Result<ButtonStates, DeviceError> {
        Ok(self.buttons.read(&mut self.transport)?)
    }

    pub fn read_magnetometer(&mut self) -> Result<MagneticField, DeviceError> {
        Ok(self.magnetometer.read(&mut self.transport)?)
    }

    pub fn read_bearing(&mut self) -> Result<u16, DeviceError> {
        Ok(self.magnetometer.read_bearing(&mut self.transport)?)
    }

    /// Passkey (`High`) security is refused without touching the link.
    pub fn set_security(&mut self, level: SecurityLevel) -> Result<(), DeviceError> {
        if level == SecurityLevel::High {
            return Err(DeviceError::UnsupportedSecurity(level));
        }
        self.transport.set_security(level)?;
        Ok(())
    }

    pub fn pair(&mut self) -> Result<(), DeviceError> {
        Ok(self.transport.pair()?)
    }

    pub fn unpair(&mut self) -> Result<(), DeviceError> {
        Ok(self.transport.unpair()?)
    }

    pub fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool, DeviceError> {
        Ok(self.transport.wait_for_notifications(timeout)?)
    }

    /// Releases the link. Calling it again, or on a link that already
    /// dropped, is a no-op.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        match self.transport.disconnect() {
            Ok(()) => info!("disconnected"),
            Err(e) => warn!(error = %e, "disconnect failed"),
        }
    }
}

impl<T: Transport> Drop for Microbit<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
