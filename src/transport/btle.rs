//! [`Transport`] on top of `btleplug`.
//!
//! btleplug is async; this wrapper owns a current-thread tokio runtime and
//! blocks on every call so the rest of the crate stays synchronous.

use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    Service,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::runtime::{Builder, Runtime};
use tokio::time::Instant;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AddressType, ConnectionConfig, Connector, SecurityLevel, Transport, TransportError};

pub struct BtleConnector {
    runtime: Arc<Runtime>,
}

impl BtleConnector {
    pub fn new() -> Result<Self, TransportError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(BtleConnector {
            runtime: Arc::new(runtime),
        })
    }
}

impl Connector for BtleConnector {
    type Transport = BtleTransport;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<BtleTransport, TransportError> {
        let address: BDAddr = config
            .address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(config.address.clone()))?;

        if config.address_type == AddressType::Public {
            // The host stack picks the address type from the advertisement.
            debug!("btleplug ignores the requested public address type");
        }

        let peripheral = self.runtime.block_on(async {
            let manager = Manager::new().await?;
            let central = manager
                .adapters()
                .await?
                .into_iter()
                .nth(config.interface)
                .ok_or(TransportError::AdapterUnavailable(config.interface))?;

            let peripheral = find_peripheral(&central, address, config.scan_timeout).await?;

            peripheral.connect().await?;
            peripheral.discover_services().await?;

            Ok::<_, TransportError>(peripheral)
        })?;

        info!(%address, address_type = %config.address_type, "connected");

        Ok(BtleTransport {
            runtime: self.runtime.clone(),
            peripheral,
            debug: config.debug,
            connected: true,
        })
    }
}

async fn find_peripheral(
    central: &Adapter,
    address: BDAddr,
    scan_timeout: Duration,
) -> Result<Peripheral, TransportError> {
    for p in central.peripherals().await? {
        if p.address() == address {
            return Ok(p);
        }
    }

    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;
    debug!(%address, ?scan_timeout, "scanning");

    let found = tokio::time::timeout(scan_timeout, async {
        while let Some(event) = events.next().await {
            if let CentralEvent::DeviceDiscovered(id) = event {
                let p = central.peripheral(&id).await?;
                if p.address() == address {
                    return Ok(Some(p));
                }
            }
        }
        Ok::<_, btleplug::Error>(None)
    })
    .await;

    central.stop_scan().await?;

    match found {
        Ok(Ok(Some(p))) => Ok(p),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(None)) | Err(_) => Err(TransportError::DeviceNotFound(address.to_string())),
    }
}

/// btleplug has no bonding or security API. `Low` is the state of a fresh
/// link; anything above it would need pairing.
fn check_security(level: SecurityLevel) -> Result<(), TransportError> {
    match level {
        SecurityLevel::Low => Ok(()),
        SecurityLevel::Medium => Err(TransportError::Unsupported("just-works security")),
        SecurityLevel::High => Err(TransportError::Unsupported("passkey security")),
    }
}

/// Next item of `stream`, or `None` once `timeout` has passed. A stream that
/// ends early still waits out the timeout.
async fn next_within<S>(stream: &mut S, timeout: Duration) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    let started = Instant::now();
    match tokio::time::timeout(timeout, stream.next()).await {
        Ok(Some(item)) => Some(item),
        Ok(None) => {
            tokio::time::sleep(timeout.saturating_sub(started.elapsed())).await;
            None
        }
        Err(_) => None,
    }
}

pub struct BtleTransport {
    runtime: Arc<Runtime>,
    peripheral: Peripheral,
    debug: bool,
    connected: bool,
}

impl Transport for BtleTransport {
    type Service = Service;
    type Characteristic = Characteristic;

    fn find_service(&mut self, uuid: Uuid) -> Result<Option<Service>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        Ok(self.peripheral.services().into_iter().find(|s| s.uuid == uuid))
    }

    fn find_characteristic(
        &mut self,
        service: &Service,
        uuid: Uuid,
    ) -> Result<Option<Characteristic>, TransportError> {
        Ok(service
            .characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned())
    }

    fn read(&mut self, characteristic: &Characteristic) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let value = self
            .runtime
            .block_on(self.peripheral.read(characteristic))?;

        if self.debug {
            debug!(characteristic = %characteristic.uuid, bytes = ?value, "read");
        }
        Ok(value)
    }

    fn set_security(&mut self, level: SecurityLevel) -> Result<(), TransportError> {
        check_security(level)?;
        debug!(%level, "security level");
        Ok(())
    }

    fn pair(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("pairing"))
    }

    fn unpair(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("unpairing"))
    }

    fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        let debug = self.debug;
        let peripheral = &self.peripheral;

        self.runtime.block_on(async {
            let mut notifications = peripheral.notifications().await?;

            match next_within(&mut notifications, timeout).await {
                Some(n) => {
                    if debug {
                        debug!(characteristic = %n.uuid, bytes = ?n.value, "notification");
                    }
                    Ok::<_, TransportError>(true)
                }
                None => Ok(false),
            }
        })
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        let peripheral = &self.peripheral;
        self.runtime.block_on(async {
            if peripheral.is_connected().await? {
                peripheral.disconnect().await?;
            }
            Ok::<_, TransportError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_low_security_without_bonding() {
        assert!(check_security(SecurityLevel::Low).is_ok());
        assert!(matches!(
            check_security(SecurityLevel::Medium),
            Err(TransportError::Unsupported(_))
        ));
        assert!(matches!(
            check_security(SecurityLevel::High),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn huge_timeout_does_not_overflow() {
        let timeout = Duration::try_from_secs_f64(1e19).unwrap();
        let mut stream = tokio_stream::iter(vec![7u8]);
        assert_eq!(next_within(&mut stream, timeout).await, Some(7));
    }

    #[tokio::test]
    async fn ended_stream_waits_out_the_timeout() {
        let timeout = Duration::from_millis(20);
        let started = std::time::Instant::now();
        let mut stream = tokio_stream::empty::<u8>();
        assert_eq!(next_within(&mut stream, timeout).await, None);
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out() {
        let mut stream = tokio_stream::pending::<u8>();
        assert_eq!(next_within(&mut stream, Duration::from_secs(3600)).await, None);
    }
}
