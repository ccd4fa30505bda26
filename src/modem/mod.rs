//! Modem capability interface.
//!
//! One trait per device capability set, one concrete implementation per
//! vendor/firmware family, selected by a factory keyed on what discovery
//! identified. Operations a family's firmware does not expose default to a
//! typed [`Error::UnsupportedOperation`] instead of a generic failure.

pub mod station;

pub use station::StationModem;

use async_trait::async_trait;

use crate::config::Config;
use crate::discovery::{DeviceAddress, DeviceKind, DiscoveredDevice};
use crate::error::{Error, Result};
use crate::models::{DocsisStatus, OverviewData, StatusData};

#[async_trait]
pub trait Modem: Send + Sync {
    /// Human-readable driver name.
    fn name(&self) -> &'static str;

    fn address(&self) -> &DeviceAddress;

    /// Establish an authenticated session. At most one attempt per session
    /// instance; construct a new modem value to retry after a failure.
    async fn login(&mut self, password: &str) -> Result<()>;

    /// Best-effort session teardown. Safe to call on every exit path.
    async fn logout(&mut self) -> Result<()>;

    async fn status(&mut self) -> Result<StatusData> {
        Err(Error::UnsupportedOperation("status"))
    }

    async fn overview(&mut self) -> Result<OverviewData> {
        Err(Error::UnsupportedOperation("overview"))
    }

    async fn docsis(&mut self) -> Result<DocsisStatus> {
        Err(Error::UnsupportedOperation("docsis"))
    }

    async fn restart(&mut self) -> Result<()> {
        Err(Error::UnsupportedOperation("restart"))
    }

    /// Board temperature in degrees Celsius, where the firmware reports it.
    async fn temperature(&mut self) -> Result<f64> {
        Err(Error::UnsupportedOperation("temperature"))
    }
}

/// Select the driver for a discovered device.
pub fn modem_factory(device: &DiscoveredDevice, config: &Config) -> Result<Box<dyn Modem>> {
    match device.kind {
        DeviceKind::Arris => Ok(Box::new(StationModem::new(device.address.clone(), config)?)),
        DeviceKind::Technicolor => Err(Error::UnsupportedDevice(
            "technicolor-family firmware".to_string(),
        )),
        DeviceKind::Unknown => Err(Error::UnsupportedDevice(format!(
            "unrecognized login page at {}",
            device.address
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered(kind: DeviceKind) -> DiscoveredDevice {
        DiscoveredDevice {
            address: DeviceAddress::new("192.168.0.1"),
            kind,
            firmware_version: String::new(),
        }
    }

    #[test]
    fn factory_selects_arris_driver() {
        let modem = modem_factory(&discovered(DeviceKind::Arris), &Config::default()).unwrap();
        assert_eq!(modem.name(), "arris-station");
    }

    #[test]
    fn factory_rejects_unsupported_families() {
        let err = modem_factory(&discovered(DeviceKind::Technicolor), &Config::default());
        assert!(matches!(err, Err(Error::UnsupportedDevice(_))));

        let err = modem_factory(&discovered(DeviceKind::Unknown), &Config::default());
        assert!(matches!(err, Err(Error::UnsupportedDevice(_))));
    }

    #[tokio::test]
    async fn unimplemented_operations_are_typed() {
        let mut modem =
            modem_factory(&discovered(DeviceKind::Arris), &Config::default()).unwrap();
        let err = modem.temperature().await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation("temperature")));
    }
}
