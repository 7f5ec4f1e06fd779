//! [`Transport`] talking to BlueZ over D-Bus, via `bluez-async`.
//!
//! Unlike btleplug this backend can bond: `pair` asks BlueZ to pair,
//! `unpair` removes the device from its adapter, and `Medium` security pairs
//! just-works when no bond exists yet.

use std::sync::Arc;
use std::time::Duration;

use bluez_async::{
    AdapterId, BluetoothError, BluetoothEvent, BluetoothSession, CharacteristicInfo,
    DeviceEvent, DeviceId, MacAddress, ServiceInfo,
};
use bluez_generated::OrgBluezAdapter1;
use dbus::nonblock::{Proxy, SyncConnection};
use tokio::runtime::{Builder, Runtime};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AddressType, ConnectionConfig, Connector, SecurityLevel, Transport, TransportError};

const PAIRING_TIMEOUT: Duration = Duration::from_secs(30);
const DBUS_TIMEOUT: Duration = Duration::from_secs(30);
const DOES_NOT_EXIST: &str = "org.bluez.Error.DoesNotExist";

pub struct BluezConnector {
    runtime: Arc<Runtime>,
    session: BluetoothSession,
    dbus: Arc<SyncConnection>,
}

impl BluezConnector {
    pub fn new() -> Result<Self, TransportError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let (session, dbus) = runtime.block_on(async {
            // The session's own D-Bus task is spawned onto this runtime.
            let (_, session) = BluetoothSession::new().await?;

            let (resource, dbus) =
                dbus_tokio::connection::new_system_sync().map_err(BluetoothError::from)?;
            tokio::spawn(async move {
                let err = resource.await;
                warn!(error = %err, "lost D-Bus connection");
            });

            Ok::<_, TransportError>((session, dbus))
        })?;

        Ok(BluezConnector {
            runtime: Arc::new(runtime),
            session,
            dbus,
        })
    }
}

impl Connector for BluezConnector {
    type Transport = BluezTransport;

    fn connect(&mut self, config: &ConnectionConfig) -> Result<BluezTransport, TransportError> {
        let address: MacAddress = config
            .address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(config.address.clone()))?;

        if config.address_type == AddressType::Public {
            debug!("BlueZ takes the address type from the advertisement");
        }

        let session = &self.session;
        let device = self.runtime.block_on(async {
            let adapter_name = format!("hci{}", config.interface);
            let adapter = session
                .get_adapters()
                .await?
                .into_iter()
                .find(|a| a.id.to_string() == adapter_name)
                .ok_or(TransportError::AdapterUnavailable(config.interface))?;

            let device = find_device(session, &adapter.id, address, config.scan_timeout).await?;
            session.connect(&device).await?;

            Ok::<_, TransportError>(device)
        })?;

        info!(%address, address_type = %config.address_type, %device, "connected");

        Ok(BluezTransport {
            runtime: self.runtime.clone(),
            session: self.session.clone(),
            dbus: self.dbus.clone(),
            device,
            debug: config.debug,
            connected: true,
        })
    }
}

async fn find_device(
    session: &BluetoothSession,
    adapter: &AdapterId,
    address: MacAddress,
    scan_timeout: Duration,
) -> Result<DeviceId, TransportError> {
    let known = session.get_devices_on_adapter(adapter).await?;
    if let Some(device) = known.into_iter().find(|d| d.mac_address == address) {
        return Ok(device.id);
    }

    let events = session.adapter_event_stream(adapter).await?;
    tokio::pin!(events);
    session.start_discovery_on_adapter(adapter).await?;
    debug!(%address, ?scan_timeout, "scanning");

    let found = tokio::time::timeout(scan_timeout, async {
        while let Some(event) = events.next().await {
            if let BluetoothEvent::Device {
                id,
                event: DeviceEvent::Discovered,
            } = event
            {
                if session.get_device_info(&id).await?.mac_address == address {
                    return Ok(Some(id));
                }
            }
        }
        Ok::<_, BluetoothError>(None)
    })
    .await;

    session.stop_discovery_on_adapter(adapter).await?;

    match found {
        Ok(Ok(Some(id))) => Ok(id),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(None)) | Err(_) => Err(TransportError::DeviceNotFound(address.to_string())),
    }
}

/// BlueZ answers `RemoveDevice` with `DoesNotExist` when there is nothing to
/// forget.
fn removal_error(e: dbus::Error) -> TransportError {
    if e.name() == Some(DOES_NOT_EXIST) {
        TransportError::NotPaired
    } else {
        TransportError::Bluez(BluetoothError::DbusError(e))
    }
}

/// Whether reaching `level` requires pairing first.
fn needs_pairing(level: SecurityLevel, paired: bool) -> Result<bool, TransportError> {
    match level {
        SecurityLevel::Low => Ok(false),
        SecurityLevel::Medium => Ok(!paired),
        SecurityLevel::High => Err(TransportError::Unsupported("passkey security")),
    }
}

pub struct BluezTransport {
    runtime: Arc<Runtime>,
    session: BluetoothSession,
    dbus: Arc<SyncConnection>,
    device: DeviceId,
    debug: bool,
    connected: bool,
}

impl BluezTransport {
    fn is_paired(&self) -> Result<bool, TransportError> {
        let info = self
            .runtime
            .block_on(self.session.get_device_info(&self.device))?;
        Ok(info.paired)
    }

    fn pair_device(&self) -> Result<(), TransportError> {
        info!(device = %self.device, "pairing");
        self.runtime
            .block_on(self.session.pair_with_timeout(&self.device, PAIRING_TIMEOUT))?;
        Ok(())
    }
}

impl Transport for BluezTransport {
    type Service = ServiceInfo;
    type Characteristic = CharacteristicInfo;

    fn find_service(&mut self, uuid: Uuid) -> Result<Option<ServiceInfo>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let services = self
            .runtime
            .block_on(self.session.get_services(&self.device))?;
        Ok(services.into_iter().find(|s| s.uuid == uuid))
    }

    fn find_characteristic(
        &mut self,
        service: &ServiceInfo,
        uuid: Uuid,
    ) -> Result<Option<CharacteristicInfo>, TransportError> {
        let characteristics = self
            .runtime
            .block_on(self.session.get_characteristics(&service.id))?;
        Ok(characteristics.into_iter().find(|c| c.uuid == uuid))
    }

    fn read(&mut self, characteristic: &CharacteristicInfo) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let value = self
            .runtime
            .block_on(self.session.read_characteristic_value(&characteristic.id))?;

        if self.debug {
            debug!(characteristic = %characteristic.uuid, bytes = ?value, "read");
        }
        Ok(value)
    }

    fn set_security(&mut self, level: SecurityLevel) -> Result<(), TransportError> {
        let paired = self.is_paired()?;
        debug!(%level, paired, "security level");
        if needs_pairing(level, paired)? {
            self.pair_device()?;
        }
        Ok(())
    }

    fn pair(&mut self) -> Result<(), TransportError> {
        if self.is_paired()? {
            debug!(device = %self.device, "already paired");
            return Ok(());
        }
        self.pair_device()
    }

    fn unpair(&mut self) -> Result<(), TransportError> {
        if !self.is_paired()? {
            return Err(TransportError::NotPaired);
        }

        let adapter = Proxy::new(
            "org.bluez",
            dbus::Path::from(self.device.adapter()),
            DBUS_TIMEOUT,
            self.dbus.clone(),
        );
        self.runtime
            .block_on(adapter.remove_device(self.device.clone().into()))
            .map_err(removal_error)?;

        // BlueZ drops the link together with the device.
        self.connected = false;
        info!(device = %self.device, "removed pairing");
        Ok(())
    }

    /// Nothing subscribes to notifications, so this just waits out the
    /// timeout.
    fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool, TransportError> {
        self.runtime.block_on(tokio::time::sleep(timeout));
        Ok(false)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        self.runtime.block_on(async {
            if self.session.get_device_info(&self.device).await?.connected {
                self.session.disconnect(&self.device).await?;
            }
            Ok::<_, TransportError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_means_not_paired() {
        let e = dbus::Error::new_custom(DOES_NOT_EXIST, "Does Not Exist");
        assert!(matches!(removal_error(e), TransportError::NotPaired));
    }

    #[test]
    fn other_removal_failures_surface() {
        let e = dbus::Error::new_custom("org.bluez.Error.Failed", "boom");
        assert!(matches!(
            removal_error(e),
            TransportError::Bluez(BluetoothError::DbusError(_))
        ));
    }

    #[test]
    fn medium_pairs_only_when_unbonded() {
        assert!(needs_pairing(SecurityLevel::Medium, false).unwrap());
        assert!(!needs_pairing(SecurityLevel::Medium, true).unwrap());
        assert!(!needs_pairing(SecurityLevel::Low, false).unwrap());
        assert!(matches!(
            needs_pairing(SecurityLevel::High, true),
            Err(TransportError::Unsupported(_))
        ));
    }
}
