//! Command line arguments and their validation.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::device::Sensor;
use crate::transport::{AddressType, ConnectionConfig, SecurityLevel};

#[derive(Parser, Debug)]
#[command(
    name = "microbit-poll",
    about = "Poll sensor readings from a BBC micro:bit over Bluetooth LE"
)]
pub struct Args {
    /// MAC address of BLE peripheral
    pub mac_address: String,

    /// Number of times to loop data
    #[arg(short = 'n', default_value_t = 1)]
    pub count: u32,

    /// Time between polling, in seconds
    #[arg(short = 't', default_value_t = 1.0)]
    pub interval: f64,

    /// Poll the temperature service
    #[arg(long)]
    pub temperature: bool,

    /// Poll the accelerometer service
    #[arg(long)]
    pub accelerator: bool,

    /// Poll the A and B button states
    #[arg(long)]
    pub buttons: bool,

    /// Poll the magnetometer and compass bearing
    #[arg(long)]
    pub magnetometer: bool,

    /// Link security to request before polling
    #[arg(long, value_enum, default_value_t = SecurityTier::NoPairing)]
    pub security: SecurityTier,

    /// Remove any existing bond and pair again
    #[arg(long)]
    pub pair: bool,

    /// Local bluetooth adapter index
    #[arg(long, default_value_t = 0)]
    pub interface: usize,

    /// Seconds to scan for the device before giving up
    #[arg(long, default_value_t = 10.0)]
    pub scan_timeout: f64,

    /// Verbose transport logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityTier {
    NoPairing,
    JustWorks,
    Passkey,
    Low,
    Medium,
    High,
}

impl SecurityTier {
    pub fn level(self) -> SecurityLevel {
        match self {
            SecurityTier::NoPairing | SecurityTier::Low => SecurityLevel::Low,
            SecurityTier::JustWorks | SecurityTier::Medium => SecurityLevel::Medium,
            SecurityTier::Passkey | SecurityTier::High => SecurityLevel::High,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("--pair can not be combined with other services (e.g --buttons)")]
    ArgumentConflict,
    #[error("no action requested (e.g --pair or --temperature/--accelerator/--buttons), aborting.")]
    NoAction,
    #[error("microbit with Passkey security mode is not currently supported in this program")]
    UnsupportedSecurity,
    #[error("invalid {name} of {value} seconds")]
    InvalidInterval { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollPlan {
    pub security: SecurityLevel,
    /// Read order within one iteration.
    pub sensors: Vec<Sensor>,
    pub count: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Pair,
    Poll(PollPlan),
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub connection: ConnectionConfig,
    pub action: Action,
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(value).map_err(|_| CliError::InvalidInterval { name, value })
}

impl Args {
    pub fn sensors(&self) -> Vec<Sensor> {
        [
            (self.temperature, Sensor::Temperature),
            (self.accelerator, Sensor::Accelerometer),
            (self.buttons, Sensor::Buttons),
            (self.magnetometer, Sensor::Magnetometer),
        ]
        .into_iter()
        .filter_map(|(on, sensor)| on.then_some(sensor))
        .collect()
    }

    /// Checks flag combinations. Nothing here touches the radio.
    pub fn into_plan(self) -> Result<Plan, CliError> {
        let sensors = self.sensors();

        if self.pair && !sensors.is_empty() {
            return Err(CliError::ArgumentConflict);
        }
        if !self.pair && sensors.is_empty() {
            return Err(CliError::NoAction);
        }

        let connection = ConnectionConfig {
            address: self.mac_address,
            address_type: AddressType::Random,
            interface: self.interface,
            scan_timeout: seconds("scan timeout", self.scan_timeout)?,
            debug: self.debug,
        };

        let action = if self.pair {
            Action::Pair
        } else {
            let security = self.security.level();
            if security == SecurityLevel::High {
                return Err(CliError::UnsupportedSecurity);
            }
            Action::Poll(PollPlan {
                security,
                sensors,
                count: self.count,
                interval: seconds("polling interval", self.interval)?,
            })
        };

        Ok(Plan { connection, action })
    }
}
