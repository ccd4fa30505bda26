//! Device address resolution.
//!
//! Probes the configured address, or the usual gateway addresses, with a
//! short per-probe timeout and classifies the responding login page into a
//! device family. No broadcast discovery; a modem that does not answer HTTP
//! on a candidate address is treated as absent.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser;

const CANDIDATE_ADDRESSES: &[&str] = &["192.168.0.1", "192.168.100.1", "192.168.1.1"];

/// Resolved network address of the modem. Immutable for a session lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vendor/firmware family, keyed off login-page markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Arris-family station firmware (crypto material embedded in the page).
    Arris,
    /// Technicolor-family firmware; recognized but no driver in this build.
    Technicolor,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: DeviceAddress,
    pub kind: DeviceKind,
    pub firmware_version: String,
}

pub fn classify_login_page(html: &str) -> DeviceKind {
    if html.contains("csp_nonce") || html.contains("mySalt") {
        DeviceKind::Arris
    } else if html.to_ascii_lowercase().contains("technicolor") {
        DeviceKind::Technicolor
    } else {
        DeviceKind::Unknown
    }
}

/// Resolve the device address and identify its family.
pub async fn discover(config: &Config) -> Result<DiscoveredDevice> {
    let candidates: Vec<String> = match &config.device.address {
        Some(fixed) => vec![fixed.clone()],
        None => CANDIDATE_ADDRESSES.iter().map(|a| a.to_string()).collect(),
    };

    let client = reqwest::Client::builder()
        .timeout(config.http.probe_timeout())
        .connect_timeout(config.http.probe_timeout())
        .build()?;

    for address in &candidates {
        match probe(&client, address).await {
            Some(device) => {
                tracing::debug!(
                    %address,
                    kind = ?device.kind,
                    firmware = %device.firmware_version,
                    "device answered probe"
                );
                return Ok(device);
            }
            None => tracing::debug!(%address, "no answer on candidate address"),
        }
    }

    Err(Error::Discovery {
        tried: candidates.join(", "),
    })
}

async fn probe(client: &reqwest::Client, address: &str) -> Option<DiscoveredDevice> {
    let url = format!("http://{address}/");
    let resp = client.get(&url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let html = resp.text().await.ok()?;
    Some(DiscoveredDevice {
        address: DeviceAddress::new(address),
        kind: classify_login_page(&html),
        firmware_version: parser::extract_firmware_version(&html),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_arris_family_by_crypto_markers() {
        let html = "<script>var csp_nonce = \"x\"; var mySalt = 'y';</script>";
        assert_eq!(classify_login_page(html), DeviceKind::Arris);
    }

    #[test]
    fn classifies_technicolor_by_vendor_string() {
        let html = "<title>Technicolor Gateway</title>";
        assert_eq!(classify_login_page(html), DeviceKind::Technicolor);
    }

    #[test]
    fn unrecognized_pages_are_unknown() {
        assert_eq!(classify_login_page("<html>hi</html>"), DeviceKind::Unknown);
    }

    #[tokio::test]
    async fn fixed_address_that_does_not_answer_is_a_discovery_error() {
        let mut config = Config::default();
        config.device.address = Some("127.0.0.1:1".to_string());
        config.http.probe_timeout = 1;
        let err = discover(&config).await.unwrap_err();
        assert!(matches!(err, Error::Discovery { ref tried } if tried.contains("127.0.0.1:1")));
    }
}
