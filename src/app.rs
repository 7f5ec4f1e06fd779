//! The pair and poll flows behind the command line.

use std::io::{self, Write};

use thiserror::Error;
use tracing::info;

use crate::cli::{Action, Plan, PollPlan};
use crate::device::{DeviceError, Microbit, Sensor};
use crate::transport::{ConnectionConfig, Connector, Transport, TransportError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

pub fn run<C, W>(plan: &Plan, connector: &mut C, out: &mut W) -> Result<(), AppError>
where
    C: Connector,
    W: Write,
{
    match &plan.action {
        Action::Pair => pair(&plan.connection, connector, out),
        Action::Poll(poll_plan) => poll(&plan.connection, poll_plan, connector, out),
    }
}

/// Drops any existing bond, then reconnects and pairs from scratch.
pub fn pair<C, W>(config: &ConnectionConfig, connector: &mut C, out: &mut W) -> Result<(), AppError>
where
    C: Connector,
    W: Write,
{
    info!(address = %config.address, "connecting");
    let mut microbit = Microbit::connect(connector, config)?;
    match microbit.unpair() {
        Ok(()) => info!("removed existing pairing"),
        Err(DeviceError::Transport(TransportError::NotPaired)) => {
            info!("unpair failed: not-paired (which is OK)")
        }
        Err(e) => return Err(e.into()),
    }
    microbit.disconnect();

    let mut microbit = Microbit::connect(connector, config)?;
    microbit.pair()?;
    microbit.disconnect();

    writeln!(out, "Paired.")?;
    Ok(())
}

pub fn poll<C, W>(
    config: &ConnectionConfig,
    plan: &PollPlan,
    connector: &mut C,
    out: &mut W,
) -> Result<(), AppError>
where
    C: Connector,
    W: Write,
{
    info!(address = %config.address, "connecting");
    let mut microbit = Microbit::connect(connector, config)?;

    let result = poll_connected(&mut microbit, plan, out);
    microbit.disconnect();
    result
}

fn poll_connected<T, W>(microbit: &mut Microbit<T>, plan: &PollPlan, out: &mut W) -> Result<(), AppError>
where
    T: Transport,
    W: Write,
{
    info!(level = %plan.security, "setting security");
    microbit.set_security(plan.security)?;

    info!(sensors = ?plan.sensors, "enabling selected sensors");
    for sensor in &plan.sensors {
        microbit.enable(*sensor)?;
    }

    let mut counter = 1;
    loop {
        for sensor in &plan.sensors {
            print_reading(microbit, *sensor, out)?;
        }

        if counter >= plan.count {
            break;
        }
        counter += 1;
        microbit.wait_for_notifications(plan.interval)?;
    }

    Ok(())
}

fn print_reading<T, W>(microbit: &mut Microbit<T>, sensor: Sensor, out: &mut W) -> Result<(), AppError>
where
    T: Transport,
    W: Write,
{
    match sensor {
        Sensor::Temperature => {
            writeln!(out, "Temperature: {}C", microbit.read_temperature()?)?;
        }
        Sensor::Accelerometer => {
            let a = microbit.read_acceleration()?;
            writeln!(out, "Accelerator: x: {:05}   y: {:05}   z: {:05}", a.x, a.y, a.z)?;
        }
        Sensor::Buttons => {
            let b = microbit.read_buttons()?;
            writeln!(out, "buttons: A: {}   B: {}", b.a, b.b)?;
        }
        Sensor::Magnetometer => {
            let m = microbit.read_magnetometer()?;
            let bearing = microbit.read_bearing()?;
            writeln!(
                out,
                "Magnetometer: x: {:05}   y: {:05}   z: {:05}   bearing: {}",
                m.x, m.y, m.z, bearing
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
