//! Data model for modem telemetry snapshots.
//!
//! Snapshots are immutable once extracted and always replaced wholesale on
//! refresh. Every numeric field has a defined fallback (0 / empty / false)
//! so a partially garbled page never feeds undefined values downstream.

use serde::{Deserialize, Serialize};

/// Values embedded in the login page that seed the credential handshake.
/// Valid for a single login attempt; the device may rotate them per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoMaterial {
    pub nonce: String,
    pub iv: String,
    pub salt: String,
    pub session_id: String,
}

impl CryptoMaterial {
    /// Name of the first missing field, if any. Used to fail login before
    /// any cipher work happens.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.nonce.is_empty() {
            Some("nonce")
        } else if self.iv.is_empty() {
            Some("iv")
        } else if self.salt.is_empty() {
            Some("salt")
        } else if self.session_id.is_empty() {
            Some("sessionId")
        } else {
            None
        }
    }
}

/// Encrypted login token, submitted once. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(pub String);

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "SC-QAM")]
    ScQam,
    #[serde(rename = "OFDM")]
    Ofdm,
    #[serde(rename = "OFDMA")]
    Ofdma,
}

impl ChannelType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "OFDM" => ChannelType::Ofdm,
            "OFDMA" => ChannelType::Ofdma,
            _ => ChannelType::ScQam,
        }
    }

    /// Wideband DOCSIS 3.1 channels span a frequency range.
    pub fn is_wideband(self) -> bool {
        matches!(self, ChannelType::Ofdm | ChannelType::Ofdma)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    #[serde(rename = "16QAM")]
    Qam16,
    #[serde(rename = "64QAM")]
    Qam64,
    #[serde(rename = "256QAM")]
    Qam256,
    #[serde(rename = "1024QAM")]
    Qam1024,
    #[serde(rename = "2048QAM")]
    Qam2048,
    #[serde(rename = "4096QAM")]
    Qam4096,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Modulation {
    pub fn from_raw(raw: &str) -> Self {
        match normalize_modulation(raw).as_str() {
            "16QAM" | "QAM16" => Modulation::Qam16,
            "64QAM" | "QAM64" => Modulation::Qam64,
            "256QAM" | "QAM256" => Modulation::Qam256,
            "1024QAM" | "QAM1024" => Modulation::Qam1024,
            "2048QAM" | "QAM2048" => Modulation::Qam2048,
            "4096QAM" | "QAM4096" => Modulation::Qam4096,
            _ => Modulation::Unknown,
        }
    }

    /// QAM order, for comparing encoding density. Unknown maps to 0.
    pub fn order(self) -> u32 {
        match self {
            Modulation::Qam16 => 16,
            Modulation::Qam64 => 64,
            Modulation::Qam256 => 256,
            Modulation::Qam1024 => 1024,
            Modulation::Qam2048 => 2048,
            Modulation::Qam4096 => 4096,
            Modulation::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Modulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Modulation::Qam16 => "16QAM",
            Modulation::Qam64 => "64QAM",
            Modulation::Qam256 => "256QAM",
            Modulation::Qam1024 => "1024QAM",
            Modulation::Qam2048 => "2048QAM",
            Modulation::Qam4096 => "4096QAM",
            Modulation::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Normalize the modulation spellings seen across firmware revisions:
/// `256-QAM`, `256 QAM`, `64QAM/16QAM` (keep the first alternative).
pub fn normalize_modulation(raw: &str) -> String {
    let first = raw.split('/').next().unwrap_or("");
    first.replace(['-', ' '], "").to_ascii_uppercase()
}

/// Single-carrier (legacy) channel metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub channel_id: String,
    pub channel_type: ChannelType,
    /// MHz
    pub frequency: f64,
    /// dB
    pub snr: f64,
    pub modulation: Modulation,
    pub lock_status: String,
    /// dBmV
    pub power_level: f64,
}

/// OFDM/OFDMA wideband channel metrics, spanning a frequency range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidebandChannelStatus {
    pub channel_id: String,
    pub channel_type: ChannelType,
    /// MHz
    pub frequency_start: f64,
    /// MHz
    pub frequency_end: f64,
    /// dB
    pub snr: f64,
    pub modulation: Modulation,
    pub lock_status: String,
    /// dBmV
    pub power_level: f64,
}

/// One channel row as embedded in the device's `json_dsData`/`json_usData`
/// tables. All fields are strings on the wire; anything absent defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDocsisChannel {
    #[serde(rename = "ChannelID")]
    pub channel_id: String,
    #[serde(rename = "ChannelType")]
    pub channel_type: String,
    /// Single frequency for SC-QAM, `start~end` for wideband channels.
    #[serde(rename = "Frequency")]
    pub frequency: String,
    #[serde(rename = "SNRLevel")]
    pub snr_level: String,
    #[serde(rename = "PowerLevel")]
    pub power_level: String,
    #[serde(rename = "Modulation")]
    pub modulation: String,
    #[serde(rename = "LockStatus")]
    pub lock_status: String,
}

/// Parse a numeric field, tolerating `a/b` composites (keep the first part)
/// and falling back to 0 on anything unparseable.
pub fn parse_level(raw: &str) -> f64 {
    raw.split('/')
        .next()
        .unwrap_or("")
        .trim()
        .parse()
        .unwrap_or(0.0)
}

impl RawDocsisChannel {
    pub fn channel_type(&self) -> ChannelType {
        ChannelType::from_raw(&self.channel_type)
    }

    pub fn into_channel(self) -> ChannelStatus {
        let channel_type = self.channel_type();
        ChannelStatus {
            frequency: parse_level(&self.frequency),
            snr: parse_level(&self.snr_level),
            power_level: parse_level(&self.power_level),
            modulation: Modulation::from_raw(&self.modulation),
            channel_id: self.channel_id,
            lock_status: self.lock_status,
            channel_type,
        }
    }

    pub fn into_wideband(self) -> WidebandChannelStatus {
        let channel_type = self.channel_type();
        let mut range = self.frequency.split('~');
        let start = parse_level(range.next().unwrap_or(""));
        let end = parse_level(range.next().unwrap_or(""));
        WidebandChannelStatus {
            frequency_start: start,
            frequency_end: if end > 0.0 { end } else { start },
            snr: parse_level(&self.snr_level),
            power_level: parse_level(&self.power_level),
            modulation: Modulation::from_raw(&self.modulation),
            channel_id: self.channel_id,
            lock_status: self.lock_status,
            channel_type,
        }
    }
}

/// Atomic DOCSIS snapshot over all four channel lists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocsisStatus {
    pub downstream: Vec<ChannelStatus>,
    pub downstream_ofdm: Vec<WidebandChannelStatus>,
    pub upstream: Vec<ChannelStatus>,
    pub upstream_ofdma: Vec<WidebandChannelStatus>,
    /// RFC 3339, taken when the snapshot was extracted.
    pub time: String,
}

/// Device identity and uptime snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusData {
    pub serial_number: String,
    pub firmware_version: String,
    pub hardware_type_version: f64,
    pub uptime_since_reboot: String,
    pub firewall_config: String,
    pub ipv4_address: String,
    pub ipv4_gateway: String,
    pub ipv6_address: String,
    pub ipv6_prefix: String,
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhoneStatus {
    pub number: String,
}

/// One attached LAN/WLAN device as embedded in the overview page. WLAN
/// entries additionally report a link rate; LAN entries leave it at 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachedDevice {
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "Active")]
    pub active: bool,
    #[serde(rename = "Index")]
    pub index: i64,
    #[serde(rename = "HostName")]
    pub host_name: String,
    #[serde(rename = "IPv4")]
    pub ipv4: String,
    #[serde(rename = "IPv6")]
    pub ipv6: String,
    #[serde(rename = "Interface")]
    pub interface: String,
    #[serde(rename = "IndexAP")]
    pub index_ap: i64,
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "Speed")]
    pub speed: String,
    #[serde(rename = "LinkRate")]
    pub link_rate: f64,
}

/// Gateway state and attached-device inventory snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverviewData {
    pub is_cm_operational: i64,
    pub wifi_enabled: bool,
    pub guest_wifi_enabled: bool,
    pub wps_enabled: bool,
    pub schedule_enabled: bool,
    pub phones: Vec<PhoneStatus>,
    pub lan_attached_devices: Vec<AttachedDevice>,
    pub primary_wlan_attached_devices: Vec<AttachedDevice>,
    pub guest_wlan_attached_devices: Vec<AttachedDevice>,
    pub gw_mode: String,
    pub ds_lite_plus_ipv6: bool,
    pub mta_enabled_by_dhcp: bool,
    pub wifi_enabled_by_mso: bool,
    pub modem_connection_status: String,
}
