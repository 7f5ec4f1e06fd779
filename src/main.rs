use std::io;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;

use microbit_btle::app;
use microbit_btle::cli::{Args, Plan};
use microbit_btle::logging;
use microbit_btle::TransportError;

fn main() {
    let args = Args::parse();
    logging::init_logger(args.debug);

    let plan = match args.into_plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {e}");
            exit(2);
        }
    };

    if let Err(e) = run(&plan) {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run(plan: &Plan) -> Result<()> {
    let mut connector = connector().context("failed to set up bluetooth")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    app::run(plan, &mut connector, &mut out)
        .with_context(|| format!("micro:bit {}", plan.connection.address))
}

/// BlueZ on Linux so pairing and security work; btleplug everywhere else.
#[cfg(target_os = "linux")]
fn connector() -> Result<microbit_btle::BluezConnector, TransportError> {
    microbit_btle::BluezConnector::new()
}

#[cfg(not(target_os = "linux"))]
fn connector() -> Result<microbit_btle::BtleConnector, TransportError> {
    microbit_btle::BtleConnector::new()
}
