//! DOCSIS connection diagnostics.
//!
//! Pure classification of a [`DocsisStatus`] snapshot against known-good
//! physical-layer thresholds. Verdicts are recomputed wholesale per snapshot;
//! there is no incremental diagnosis state.

use serde::Serialize;

use crate::models::{ChannelStatus, ChannelType, DocsisStatus, Modulation, WidebandChannelStatus};

/// Lock state the modem reports for a synchronized channel.
pub const LOCKED_SENTINEL: &str = "Locked";

/// Warning band above the modulation's minimum acceptable SNR.
const SNR_WARN_BAND_DB: f64 = 2.0;

/// Acceptable receive levels, dBmV. Downstream and upstream are asymmetric.
const DOWNSTREAM_POWER_DBMV: (f64, f64) = (-5.0, 5.0);
const DOWNSTREAM_POWER_EDGE_DBMV: f64 = 1.0;
const UPSTREAM_POWER_DBMV: (f64, f64) = (35.0, 49.0);
const UPSTREAM_POWER_EDGE_DBMV: f64 = 2.0;

/// Minimum acceptable SNR for a modulation order. Denser constellations
/// tolerate less noise. Unknown modulations get the 256QAM floor.
fn min_snr_db(modulation: Modulation) -> f64 {
    match modulation {
        Modulation::Qam16 => 18.0,
        Modulation::Qam64 => 24.0,
        Modulation::Qam256 | Modulation::Unknown => 30.0,
        Modulation::Qam1024 => 34.0,
        Modulation::Qam2048 => 37.0,
        Modulation::Qam4096 => 41.0,
    }
}

/// Modulation order expected on a healthy link for each channel class.
/// Anything below is degraded-but-working.
fn expected_modulation(direction: Direction, channel_type: ChannelType) -> Modulation {
    match (direction, channel_type) {
        (Direction::Downstream, ChannelType::ScQam) => Modulation::Qam256,
        (Direction::Downstream, _) => Modulation::Qam1024,
        (Direction::Upstream, ChannelType::ScQam) => Modulation::Qam64,
        (Direction::Upstream, _) => Modulation::Qam256,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downstream,
    Upstream,
}

/// Severity ordering is the derive order: red is worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Color {
    #[serde(rename = "green")]
    Green,
    #[serde(rename = "yellow")]
    Yellow,
    #[serde(rename = "red")]
    Red,
}

/// Verdict attached 1:1 to a channel. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnose {
    pub deviation: bool,
    pub color: Color,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosedChannelStatus {
    #[serde(flatten)]
    pub channel: ChannelStatus,
    pub diagnose: Diagnose,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosedWidebandChannelStatus {
    #[serde(flatten)]
    pub channel: WidebandChannelStatus,
    pub diagnose: Diagnose,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosedDocsisStatus {
    pub downstream: Vec<DiagnosedChannelStatus>,
    pub downstream_ofdm: Vec<DiagnosedWidebandChannelStatus>,
    pub upstream: Vec<DiagnosedChannelStatus>,
    pub upstream_ofdma: Vec<DiagnosedWidebandChannelStatus>,
    pub time: String,
}

impl DiagnosedDocsisStatus {
    /// True iff any channel across all four lists deviates from green.
    pub fn has_deviations(&self) -> bool {
        self.downstream.iter().any(|c| c.diagnose.deviation)
            || self.downstream_ofdm.iter().any(|c| c.diagnose.deviation)
            || self.upstream.iter().any(|c| c.diagnose.deviation)
            || self.upstream_ofdma.iter().any(|c| c.diagnose.deviation)
    }

    /// Descriptions of every deviating channel, for operator output.
    pub fn deviation_report(&self) -> Vec<String> {
        let mut report = Vec::new();
        for c in &self.downstream {
            if c.diagnose.deviation {
                report.push(format!("downstream {}", c.diagnose.description));
            }
        }
        for c in &self.downstream_ofdm {
            if c.diagnose.deviation {
                report.push(format!("downstream-ofdm {}", c.diagnose.description));
            }
        }
        for c in &self.upstream {
            if c.diagnose.deviation {
                report.push(format!("upstream {}", c.diagnose.description));
            }
        }
        for c in &self.upstream_ofdma {
            if c.diagnose.deviation {
                report.push(format!("upstream-ofdma {}", c.diagnose.description));
            }
        }
        report
    }
}

/// Flattened view over legacy and wideband channels so both run through the
/// same rule set.
struct ChannelView<'a> {
    channel_id: &'a str,
    channel_type: ChannelType,
    snr: f64,
    modulation: Modulation,
    lock_status: &'a str,
    power_level: f64,
}

impl<'a> From<&'a ChannelStatus> for ChannelView<'a> {
    fn from(c: &'a ChannelStatus) -> Self {
        ChannelView {
            channel_id: &c.channel_id,
            channel_type: c.channel_type,
            snr: c.snr,
            modulation: c.modulation,
            lock_status: &c.lock_status,
            power_level: c.power_level,
        }
    }
}

impl<'a> From<&'a WidebandChannelStatus> for ChannelView<'a> {
    fn from(c: &'a WidebandChannelStatus) -> Self {
        ChannelView {
            channel_id: &c.channel_id,
            channel_type: c.channel_type,
            snr: c.snr,
            modulation: c.modulation,
            lock_status: &c.lock_status,
            power_level: c.power_level,
        }
    }
}

/// Run every rule, keep the worst color, and name every rule that fired at
/// non-green severity so all contributing causes are visible.
fn diagnose_channel(view: ChannelView<'_>, direction: Direction) -> Diagnose {
    let mut findings: Vec<(Color, String)> = Vec::new();
    let id = view.channel_id;

    if view.lock_status != LOCKED_SENTINEL {
        findings.push((
            Color::Red,
            format!("channel {id}: not locked (reported '{}')", view.lock_status),
        ));
    }

    let min_snr = min_snr_db(view.modulation);
    if view.snr < min_snr {
        findings.push((
            Color::Red,
            format!(
                "channel {id}: SNR {} dB below minimum {min_snr} dB for {}",
                view.snr, view.modulation
            ),
        ));
    } else if view.snr < min_snr + SNR_WARN_BAND_DB {
        findings.push((
            Color::Yellow,
            format!(
                "channel {id}: SNR {} dB within warning band above minimum {min_snr} dB",
                view.snr
            ),
        ));
    }

    let ((lo, hi), edge) = match direction {
        Direction::Downstream => (DOWNSTREAM_POWER_DBMV, DOWNSTREAM_POWER_EDGE_DBMV),
        Direction::Upstream => (UPSTREAM_POWER_DBMV, UPSTREAM_POWER_EDGE_DBMV),
    };
    if view.power_level < lo || view.power_level > hi {
        findings.push((
            Color::Red,
            format!(
                "channel {id}: power level {} dBmV outside acceptable range [{lo}, {hi}]",
                view.power_level
            ),
        ));
    } else if view.power_level < lo + edge || view.power_level > hi - edge {
        findings.push((
            Color::Yellow,
            format!(
                "channel {id}: power level {} dBmV near edge of range [{lo}, {hi}]",
                view.power_level
            ),
        ));
    }

    let expected = expected_modulation(direction, view.channel_type);
    if view.modulation != Modulation::Unknown && view.modulation.order() < expected.order() {
        findings.push((
            Color::Yellow,
            format!(
                "channel {id}: modulation {} below expected {expected}",
                view.modulation
            ),
        ));
    }

    let color = findings
        .iter()
        .map(|(c, _)| *c)
        .max()
        .unwrap_or(Color::Green);
    let description = if findings.is_empty() {
        "ok".to_string()
    } else {
        findings
            .into_iter()
            .map(|(_, msg)| msg)
            .collect::<Vec<_>>()
            .join("; ")
    };

    Diagnose {
        deviation: color != Color::Green,
        color,
        description,
    }
}

/// Diagnose a full snapshot, preserving channel order in every list.
pub fn diagnose(status: &DocsisStatus) -> DiagnosedDocsisStatus {
    DiagnosedDocsisStatus {
        downstream: status
            .downstream
            .iter()
            .map(|c| DiagnosedChannelStatus {
                diagnose: diagnose_channel(c.into(), Direction::Downstream),
                channel: c.clone(),
            })
            .collect(),
        downstream_ofdm: status
            .downstream_ofdm
            .iter()
            .map(|c| DiagnosedWidebandChannelStatus {
                diagnose: diagnose_channel(c.into(), Direction::Downstream),
                channel: c.clone(),
            })
            .collect(),
        upstream: status
            .upstream
            .iter()
            .map(|c| DiagnosedChannelStatus {
                diagnose: diagnose_channel(c.into(), Direction::Upstream),
                channel: c.clone(),
            })
            .collect(),
        upstream_ofdma: status
            .upstream_ofdma
            .iter()
            .map(|c| DiagnosedWidebandChannelStatus {
                diagnose: diagnose_channel(c.into(), Direction::Upstream),
                channel: c.clone(),
            })
            .collect(),
        time: status.time.clone(),
    }
}
