//! micro:bit GATT service wrappers.
//!
//! A wrapper starts [`Binding::Unresolved`]. `enable()` looks up the service
//! and its characteristics once; afterwards the resolved handles are reused
//! and `read()` decodes the characteristic payloads.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::transport::{Transport, TransportError};
use crate::uuids::{self, microbit_uuid};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service {0} not found on device")]
    ServiceNotFound(String),
    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(String),
    #[error("{0} service read before it was enabled")]
    NotEnabled(&'static str),
    #[error("expected a {expected} byte payload, got {actual} bytes")]
    MalformedPayload { expected: usize, actual: usize },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Handle resolution state of a wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<S, C> {
    Unresolved,
    Resolved { service: S, characteristics: C },
}

impl<S, C> Binding<S, C> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Binding::Resolved { .. })
    }

    fn characteristics(&self, name: &'static str) -> Result<&C, ServiceError> {
        match self {
            Binding::Resolved {
                characteristics, ..
            } => Ok(characteristics),
            Binding::Unresolved => Err(ServiceError::NotEnabled(name)),
        }
    }
}

fn resolve_service<T: Transport>(transport: &mut T, uuid: Uuid) -> Result<T::Service, ServiceError> {
    let service = transport
        .find_service(uuid)?
        .ok_or_else(|| ServiceError::ServiceNotFound(uuids::canonical(uuid)))?;
    debug!(service = %uuid, "resolved service");
    Ok(service)
}

fn resolve_characteristic<T: Transport>(
    transport: &mut T,
    service: &T::Service,
    uuid: Uuid,
) -> Result<T::Characteristic, ServiceError> {
    transport
        .find_characteristic(service, uuid)?
        .ok_or_else(|| ServiceError::CharacteristicNotFound(uuids::canonical(uuid)))
}

fn expect_len(payload: &[u8], expected: usize) -> Result<(), ServiceError> {
    if payload.len() != expected {
        return Err(ServiceError::MalformedPayload {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Whole degrees Celsius, read as an unsigned byte.
pub fn decode_temperature(payload: &[u8]) -> Result<u8, ServiceError> {
    expect_len(payload, 1)?;
    Ok(payload[0])
}

/// Raw button byte. Polarity is defined by the firmware.
pub fn decode_button(payload: &[u8]) -> Result<u8, ServiceError> {
    expect_len(payload, 1)?;
    Ok(payload[0])
}

fn decode_axes(payload: &[u8]) -> Result<(i16, i16, i16), ServiceError> {
    expect_len(payload, 6)?;
    Ok((
        LittleEndian::read_i16(&payload[0..2]),
        LittleEndian::read_i16(&payload[2..4]),
        LittleEndian::read_i16(&payload[4..6]),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceleration {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

pub fn decode_acceleration(payload: &[u8]) -> Result<Acceleration, ServiceError> {
    let (x, y, z) = decode_axes(payload)?;
    Ok(Acceleration { x, y, z })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagneticField {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

pub fn decode_magnetic_field(payload: &[u8]) -> Result<MagneticField, ServiceError> {
    let (x, y, z) = decode_axes(payload)?;
    Ok(MagneticField { x, y, z })
}

/// Compass bearing in degrees from north.
pub fn decode_bearing(payload: &[u8]) -> Result<u16, ServiceError> {
    expect_len(payload, 2)?;
    Ok(LittleEndian::read_u16(payload))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStates {
    pub a: u8,
    pub b: u8,
}

pub struct TemperatureService<T: Transport> {
    binding: Binding<T::Service, T::Characteristic>,
}

impl<T: Transport> TemperatureService<T> {
    pub const SERVICE: Uuid = microbit_uuid(uuids::TEMP_SERVICE);
    pub const DATA: Uuid = microbit_uuid(uuids::TEMP_DATA);

    pub fn new() -> Self {
        TemperatureService {
            binding: Binding::Unresolved,
        }
    }

    pub fn binding(&self) -> &Binding<T::Service, T::Characteristic> {
        &self.binding
    }

    pub fn enable(&mut self, transport: &mut T) -> Result<(), ServiceError> {
        if self.binding.is_resolved() {
            return Ok(());
        }
        let service = resolve_service(transport, Self::SERVICE)?;
        let data = resolve_characteristic(transport, &service, Self::DATA)?;
        self.binding = Binding::Resolved {
            service,
            characteristics: data,
        };
        Ok(())
    }

    pub fn read(&self, transport: &mut T) -> Result<u8, ServiceError> {
        let data = self.binding.characteristics("temperature")?;
        decode_temperature(&transport.read(data)?)
    }
}

impl<T: Transport> Default for TemperatureService<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AccelerometerService<T: Transport> {
    binding: Binding<T::Service, T::Characteristic>,
}

impl<T: Transport> AccelerometerService<T> {
    pub const SERVICE: Uuid = microbit_uuid(uuids::ACCEL_SERVICE);
    pub const DATA: Uuid = microbit_uuid(uuids::ACCEL_DATA);

    pub fn new() -> Self {
        AccelerometerService {
            binding: Binding::Unresolved,
        }
    }

    pub fn binding(&self) -> &Binding<T::Service, T::Characteristic> {
        &self.binding
    }

    pub fn enable(&mut self, transport: &mut T) -> Result<(), ServiceError> {
        if self.binding.is_resolved() {
            return Ok(());
        }
        let service = resolve_service(transport, Self::SERVICE)?;
        let data = resolve_characteristic(transport, &service, Self::DATA)?;
        self.binding = Binding::Resolved {
            service,
            characteristics: data,
        };
        Ok(())
    }

    /// X/Y/Z acceleration, three little-endian signed shorts.
    pub fn read(&self, transport: &mut T) -> Result<Acceleration, ServiceError> {
        let data = self.binding.characteristics("accelerometer")?;
        decode_acceleration(&transport.read(data)?)
    }
}

impl<T: Transport> Default for AccelerometerService<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonCharacteristics<C> {
    pub a: C,
    pub b: C,
}

pub struct ButtonsService<T: Transport> {
    binding: Binding<T::Service, ButtonCharacteristics<T::Characteristic>>,
}

impl<T: Transport> ButtonsService<T> {
    pub const SERVICE: Uuid = microbit_uuid(uuids::BTN_SERVICE);
    pub const BUTTON_A: Uuid = microbit_uuid(uuids::BTN_A_STATE);
    pub const BUTTON_B: Uuid = microbit_uuid(uuids::BTN_B_STATE);

    pub fn new() -> Self {
        ButtonsService {
            binding: Binding::Unresolved,
        }
    }

    pub fn binding(&self) -> &Binding<T::Service, ButtonCharacteristics<T::Characteristic>> {
        &self.binding
    }

    pub fn enable(&mut self, transport: &mut T) -> Result<(), ServiceError> {
        if self.binding.is_resolved() {
            return Ok(());
        }
        let service = resolve_service(transport, Self::SERVICE)?;
        let a = resolve_characteristic(transport, &service, Self::BUTTON_A)?;
        let b = resolve_characteristic(transport, &service, Self::BUTTON_B)?;
        self.binding = Binding::Resolved {
            service,
            characteristics: ButtonCharacteristics { a, b },
        };
        Ok(())
    }

    pub fn read_button_a(&self, transport: &mut T) -> Result<u8, ServiceError> {
        let chars = self.binding.characteristics("buttons")?;
        decode_button(&transport.read(&chars.a)?)
    }

    pub fn read_button_b(&self, transport: &mut T) -> Result<u8, ServiceError> {
        let chars = self.binding.characteristics("buttons")?;
        decode_button(&transport.read(&chars.b)?)
    }

    /// Both buttons, A then B. The two reads are separate round trips.
    pub fn read(&self, transport: &mut T) -> Result<ButtonStates, ServiceError> {
        let a = self.read_button_a(transport)?;
        let b = self.read_button_b(transport)?;
        Ok(ButtonStates { a, b })
    }
}

impl<T: Transport> Default for ButtonsService<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MagnetometerCharacteristics<C> {
    pub data: C,
    pub bearing: C,
}

pub struct MagnetometerService<T: Transport> {
    binding: Binding<T::Service, MagnetometerCharacteristics<T::Characteristic>>,
}

impl<T: Transport> MagnetometerService<T> {
    pub const SERVICE: Uuid = microbit_uuid(uuids::MAGNETO_SERVICE);
    pub const DATA: Uuid = microbit_uuid(uuids::MAGNETO_DATA);
    pub const BEARING: Uuid = microbit_uuid(uuids::MAGNETO_BEARING);

    pub fn new() -> Self {
        MagnetometerService {
            binding: Binding::Unresolved,
        }
    }

    pub fn binding(&self) -> &Binding<T::Service, MagnetometerCharacteristics<T::Characteristic>> {
        &self.binding
    }

    pub fn enable(&mut self, transport: &mut T) -> Result<(), ServiceError> {
        if self.binding.is_resolved() {
            return Ok(());
        }
        let service = resolve_service(transport, Self::SERVICE)?;
        let data = resolve_characteristic(transport, &service, Self::DATA)?;
        let bearing = resolve_characteristic(transport, &service, Self::BEARING)?;
        self.binding = Binding::Resolved {
            service,
            characteristics: MagnetometerCharacteristics { data, bearing },
        };
        Ok(())
    }

    pub fn read(&self, transport: &mut T) -> Result<MagneticField, ServiceError> {
        let chars = self.binding.characteristics("magnetometer")?;
        decode_magnetic_field(&transport.read(&chars.data)?)
    }

    pub fn read_bearing(&self, transport: &mut T) -> Result<u16, ServiceError> {
        let chars = self.binding.characteristics("magnetometer")?;
        decode_bearing(&transport.read(&chars.bearing)?)
    }
}

impl<T: Transport> Default for MagnetometerService<T> {
    fn default() -> Self {
        Self::new()
    }
}
