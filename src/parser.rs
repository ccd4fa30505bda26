//! Page state extraction.
//!
//! The device has no telemetry API; every page embeds its state as script
//! variable assignments (`var js_SerialNumber = '...';`) and bare JSON
//! literals (`json_dsData = [...];`). The extractors here locate those
//! assignments and degrade to defaults on anything missing or garbled, so a
//! drifted page format never aborts a telemetry cycle.
//!
//! All patterns are compiled fresh per call, so no match state survives
//! between invocations.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::models::{
    CryptoMaterial, DocsisStatus, OverviewData, PhoneStatus, RawDocsisChannel, StatusData,
};

/// First `name = "value";` assignment in document order.
fn script_string(html: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"{}\s*=\s*["']([^"']*)["']\s*;"#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .captures(html)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// First bare `name = <literal>;` assignment, value captured verbatim.
/// JSON tables are frequently pretty-printed across lines, hence `(?s)`.
fn script_literal(html: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"(?s){}\s*=\s*(.*?);"#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .captures(html)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

fn string_or_default(html: &str, name: &str) -> String {
    script_string(html, name).unwrap_or_else(|| {
        tracing::debug!(field = name, "script variable missing, defaulting to empty");
        String::new()
    })
}

fn number_or_default(html: &str, name: &str) -> f64 {
    match script_string(html, name) {
        Some(raw) => crate::models::parse_level(&raw),
        None => {
            tracing::debug!(field = name, "script variable missing, defaulting to 0");
            0.0
        }
    }
}

fn bool_or_default(html: &str, name: &str) -> bool {
    match script_string(html, name) {
        Some(raw) => matches!(raw.trim(), "1" | "true" | "TRUE" | "True"),
        None => {
            tracing::debug!(field = name, "script variable missing, defaulting to false");
            false
        }
    }
}

/// Embedded JSON array; parse failures degrade to an empty list.
fn json_or_default<T: DeserializeOwned>(html: &str, name: &str) -> Vec<T> {
    let Some(raw) = script_literal(html, name) else {
        tracing::debug!(field = name, "embedded JSON missing, defaulting to empty list");
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(field = name, %err, "embedded JSON unparseable, defaulting to empty list");
            Vec::new()
        }
    }
}

/// Crypto material embedded in the login page. Fields default to empty;
/// the session controller decides whether that is fatal.
pub fn extract_crypto_material(html: &str) -> CryptoMaterial {
    CryptoMaterial {
        nonce: string_or_default(html, "var csp_nonce"),
        iv: string_or_default(html, "var myIv"),
        salt: string_or_default(html, "var mySalt"),
        session_id: string_or_default(html, "var currentSessionId"),
    }
}

/// Firmware version advertised on the login page, used by discovery to
/// identify the device family.
pub fn extract_firmware_version(html: &str) -> String {
    string_or_default(html, "_ga.swVersion")
}

/// Post-login acknowledgement token: the device answers a successful login
/// with a page instructing the browser to set a `credential` cookie.
pub fn extract_credential_string(html: &str) -> String {
    let pattern = r#"(?s)createCookie\(\s*"credential"\s*,\s*["']([^"']*)["']"#;
    Regex::new(pattern)
        .ok()
        .and_then(|re| re.captures(html).and_then(|c| c.get(1).map(|m| m.as_str().to_string())))
        .unwrap_or_default()
}

pub fn extract_status(html: &str) -> StatusData {
    StatusData {
        serial_number: string_or_default(html, "var js_SerialNumber"),
        firmware_version: string_or_default(html, "var js_FWVersion"),
        hardware_type_version: number_or_default(html, "var js_HWTypeVersion"),
        uptime_since_reboot: string_or_default(html, "var js_UptimeSinceReboot"),
        firewall_config: string_or_default(html, "var js_FirewallConfig"),
        ipv4_address: string_or_default(html, "var js_ipv4addr"),
        ipv4_gateway: string_or_default(html, "var js_ipv4gateway"),
        ipv6_address: string_or_default(html, "var js_ipv6addr"),
        ipv6_prefix: string_or_default(html, "var js_ipv6prefix"),
        time: string_or_default(html, "var js_DateTime"),
    }
}

pub fn extract_overview(html: &str) -> OverviewData {
    let phones = [
        script_string(html, "js_phone1"),
        script_string(html, "js_phone2"),
    ]
    .into_iter()
    .flatten()
    .filter(|n| !n.is_empty())
    .map(|number| PhoneStatus { number })
    .collect();

    OverviewData {
        is_cm_operational: number_or_default(html, "js_isCmOperational") as i64,
        wifi_enabled: bool_or_default(html, "js_wifiEnable"),
        guest_wifi_enabled: bool_or_default(html, "js_guestWifiEnable"),
        wps_enabled: bool_or_default(html, "js_wpsEnable"),
        schedule_enabled: bool_or_default(html, "js_scheduleEnable"),
        phones,
        lan_attached_devices: json_or_default(html, "json_lanAttachedDevice"),
        primary_wlan_attached_devices: json_or_default(html, "json_primaryWlanAttachedDevice"),
        guest_wlan_attached_devices: json_or_default(html, "json_guestWlanAttachedDevice"),
        gw_mode: string_or_default(html, "_ga.gwMode"),
        ds_lite_plus_ipv6: bool_or_default(html, "_ga.dsLitePlusIpv6Mode"),
        mta_enabled_by_dhcp: bool_or_default(html, "_ga.mtaEnabledByDhcp"),
        wifi_enabled_by_mso: bool_or_default(html, "_ga.wifiEnabledByMso"),
        modem_connection_status: string_or_default(html, "_ga.modemConnectionStatus"),
    }
}

/// DOCSIS channel tables. Wideband (OFDM/OFDMA) rows live in the same
/// embedded arrays as the legacy channels and are split out by type.
pub fn extract_docsis(html: &str, now: DateTime<Utc>) -> DocsisStatus {
    let ds_rows: Vec<RawDocsisChannel> = json_or_default(html, "json_dsData");
    let us_rows: Vec<RawDocsisChannel> = json_or_default(html, "json_usData");

    let mut status = DocsisStatus {
        time: now.to_rfc3339(),
        ..Default::default()
    };
    for row in ds_rows {
        if row.channel_type().is_wideband() {
            status.downstream_ofdm.push(row.into_wideband());
        } else {
            status.downstream.push(row.into_channel());
        }
    }
    for row in us_rows {
        if row.channel_type().is_wideband() {
            status.upstream_ofdma.push(row.into_wideband());
        } else {
            status.upstream.push(row.into_channel());
        }
    }
    status
}
