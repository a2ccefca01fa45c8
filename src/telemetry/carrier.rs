//! Carrier entry builder.
//!
//! Walks classified lines once, keeping a single open entry. A carrier marker
//! (`+QENG` serving cell, `+QCAINFO` PCC/SCC) finalizes the open entry and
//! starts the next one; antenna and metric lines (`+QRSRP`, `+QRSRQ`,
//! `+QSINR`) only attach to the open entry when its technology matches.
//! Finalized entries are appended to the result and never touched again.

use serde::Serialize;
use tracing::debug;

use super::antenna::{self, AntennaReading};
use super::classifier::RawLine;
use super::metrics::{Metric, SignalMetrics, SignalQuality};

/// Radio access technology of a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Technology {
    #[serde(rename = "LTE")]
    Lte,
    #[serde(rename = "NR")]
    Nr,
}

impl Technology {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lte => "LTE",
            Self::Nr => "NR",
        }
    }

    /// Band label: `B3` for LTE, `N78` for NR.
    fn band_label(self, number: &str) -> String {
        match self {
            Self::Lte => format!("B{number}"),
            Self::Nr => format!("N{number}"),
        }
    }

    /// Technology token used by `+QRSRP`/`+QRSRQ`/`+QSINR`.
    fn from_token(token: &str) -> Option<Self> {
        match token.trim().trim_matches('"').to_ascii_uppercase().as_str() {
            "LTE" => Some(Self::Lte),
            "NR5G" | "NR" | "NR5G-SA" | "NR5G-NSA" => Some(Self::Nr),
            _ => None,
        }
    }
}

/// Primary (anchor) or secondary (carrier aggregation) carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierRole {
    Primary,
    Secondary,
}

/// One detected carrier with its readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSignalEntry {
    pub id: String,
    /// Console label, e.g. `LTE PCC` or `LTE SCC 2`.
    pub display_name: String,
    pub technology: Technology,
    pub role: CarrierRole,
    pub band: Option<String>,
    pub bandwidth_label: Option<String>,
    pub channel: Option<String>,
    pub pci: Option<String>,
    pub rx_diversity: Option<String>,
    pub metrics: SignalMetrics,
    pub quality: SignalQuality,
    pub antennas: Vec<AntennaReading>,
}

/// Deployment mode implied by the serving-cell report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    Lte,
    NrNsa,
    NrSa,
}

impl NetworkMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Lte => "LTE",
            Self::NrNsa => "5G NSA",
            Self::NrSa => "5G SA",
        }
    }
}

/// One technology section of a `+QENG: "servingcell"` report.
#[derive(Debug, Clone, PartialEq)]
pub struct ServingCell {
    pub technology: Technology,
    pub mode: NetworkMode,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub cell_id: Option<String>,
    pub tac: Option<String>,
    pub pci: Option<String>,
    pub channel: Option<String>,
    pub band: Option<String>,
    pub bandwidth_label: Option<String>,
    pub metrics: SignalMetrics,
}

/// Parse a `+QENG:` line into a serving-cell section.
///
/// Layouts (index relative to the technology token `t`):
///
/// ```text
/// LTE:      t,duplex,mcc,mnc,cellid,pci,earfcn,band,ul_bw,dl_bw,tac,rsrp,rsrq,rssi,sinr,...
/// NR5G-SA:  t,duplex,mcc,mnc,cellid,pci,tac,arfcn,band,dl_bw,rsrp,rsrq,sinr,...
/// NR5G-NSA: t,mcc,mnc,pci,rsrp,sinr,rsrq,arfcn,band,dl_bw,scs
/// ```
///
/// The `"servingcell",<state>` header alone (NSA) yields `None`.
pub fn parse_serving_cell(line: &RawLine) -> Option<ServingCell> {
    if !line.has_prefix("+QENG:") {
        return None;
    }
    let f = split_fields(line.payload()?);
    let t = f
        .iter()
        .position(|v| matches!(v.as_str(), "LTE" | "NR5G-SA" | "NR5G-NSA"))?;

    let cell = match f[t].as_str() {
        "LTE" => ServingCell {
            technology: Technology::Lte,
            mode: NetworkMode::Lte,
            mcc: numeric_field(&f, t + 2),
            mnc: numeric_field(&f, t + 3),
            cell_id: field(&f, t + 4),
            pci: numeric_field(&f, t + 5),
            channel: numeric_field(&f, t + 6),
            band: numeric_field(&f, t + 7).map(|b| Technology::Lte.band_label(&b)),
            bandwidth_label: field(&f, t + 9)
                .and_then(|bw| lte_bandwidth_from_index(&bw))
                .map(String::from),
            tac: field(&f, t + 10),
            metrics: SignalMetrics {
                rsrp: number(&f, t + 11),
                rsrq: number(&f, t + 12),
                rssi: number(&f, t + 13),
                sinr: number(&f, t + 14),
            },
        },
        "NR5G-SA" => ServingCell {
            technology: Technology::Nr,
            mode: NetworkMode::NrSa,
            mcc: numeric_field(&f, t + 2),
            mnc: numeric_field(&f, t + 3),
            cell_id: field(&f, t + 4),
            pci: numeric_field(&f, t + 5),
            tac: field(&f, t + 6),
            channel: numeric_field(&f, t + 7),
            band: numeric_field(&f, t + 8).map(|b| Technology::Nr.band_label(&b)),
            bandwidth_label: field(&f, t + 9)
                .and_then(|bw| nr_bandwidth_from_index(&bw))
                .map(String::from),
            metrics: SignalMetrics {
                rssi: None,
                rsrp: number(&f, t + 10),
                rsrq: number(&f, t + 11),
                sinr: number(&f, t + 12),
            },
        },
        _ => ServingCell {
            technology: Technology::Nr,
            mode: NetworkMode::NrNsa,
            mcc: numeric_field(&f, t + 1),
            mnc: numeric_field(&f, t + 2),
            cell_id: None,
            tac: None,
            pci: numeric_field(&f, t + 3),
            channel: numeric_field(&f, t + 7),
            band: numeric_field(&f, t + 8).map(|b| Technology::Nr.band_label(&b)),
            bandwidth_label: field(&f, t + 9)
                .and_then(|bw| nr_bandwidth_from_index(&bw))
                .map(String::from),
            metrics: SignalMetrics {
                rssi: None,
                rsrp: number(&f, t + 4),
                sinr: number(&f, t + 5),
                rsrq: number(&f, t + 6),
            },
        },
    };
    Some(cell)
}

/// Build all carrier entries from classified lines.
pub fn build_entries(lines: &[RawLine]) -> Vec<CellSignalEntry> {
    let mut builder = EntryBuilder::default();
    for line in lines {
        builder.feed(line);
    }
    builder.finish()
}

// ── Line recognition ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
struct Marker {
    kind: MarkerKind,
    technology: Technology,
    band: Option<String>,
    bandwidth_label: Option<String>,
    channel: Option<String>,
    pci: Option<String>,
    metrics: SignalMetrics,
}

enum CarrierLine {
    Marker(Marker),
    /// Per-chain values, one segment per technology token.
    Chains(Metric, Vec<(Technology, Vec<AntennaReading>)>),
}

fn recognize(line: &RawLine) -> Option<CarrierLine> {
    if let Some(cell) = parse_serving_cell(line) {
        return Some(CarrierLine::Marker(Marker {
            kind: MarkerKind::Primary,
            technology: cell.technology,
            band: cell.band,
            bandwidth_label: cell.bandwidth_label,
            channel: cell.channel,
            pci: cell.pci,
            metrics: cell.metrics,
        }));
    }
    if line.has_prefix("+QCAINFO:") {
        return parse_qcainfo(line.payload()?).map(CarrierLine::Marker);
    }
    let metric = if line.has_prefix("+QRSRP:") {
        Metric::Rsrp
    } else if line.has_prefix("+QRSRQ:") {
        Metric::Rsrq
    } else if line.has_prefix("+QSINR:") {
        Metric::Sinr
    } else {
        return None;
    };
    Some(CarrierLine::Chains(metric, chain_segments(line.payload()?)))
}

/// Parse a `+QCAINFO:` payload.
///
/// ```text
/// LTE:    "PCC"|"SCC",earfcn,bw_rb,"LTE BAND n",state,pci,rsrp,rsrq,rssi,sinr
/// NR PCC: "PCC",arfcn,bw_idx,"NR5G BAND n",pci
/// NR SCC: "SCC",arfcn,bw_idx,"NR5G BAND n",state,pci,ul_cfg,ul_bw,ul_arfcn,rsrp,rsrq,sinr
/// ```
fn parse_qcainfo(payload: &str) -> Option<Marker> {
    let f = split_fields(payload);
    let kind = match f.first()?.as_str() {
        "PCC" => MarkerKind::Primary,
        "SCC" => MarkerKind::Secondary,
        _ => return None,
    };
    let band_text = f.get(3)?.to_ascii_uppercase();
    let technology = if band_text.starts_with("LTE") {
        Technology::Lte
    } else if band_text.starts_with("NR") {
        Technology::Nr
    } else {
        return None;
    };
    let band = antenna::band_number(&band_text).map(|n| technology.band_label(&n.to_string()));

    let marker = match technology {
        Technology::Lte => Marker {
            kind,
            technology,
            band,
            bandwidth_label: field(&f, 2)
                .and_then(|rb| lte_bandwidth_from_rbs(&rb))
                .map(String::from),
            channel: numeric_field(&f, 1),
            pci: numeric_field(&f, 5),
            metrics: SignalMetrics {
                rsrp: number(&f, 6),
                rsrq: number(&f, 7),
                rssi: number(&f, 8),
                sinr: number(&f, 9),
            },
        },
        Technology::Nr => {
            let (pci, metrics) = if kind == MarkerKind::Primary {
                (numeric_field(&f, 4), SignalMetrics::default())
            } else {
                (
                    numeric_field(&f, 5),
                    SignalMetrics {
                        rssi: None,
                        rsrp: number(&f, 9),
                        rsrq: number(&f, 10),
                        sinr: number(&f, 11),
                    },
                )
            };
            Marker {
                kind,
                technology,
                band,
                bandwidth_label: field(&f, 2)
                    .and_then(|bw| nr_bandwidth_from_index(&bw))
                    .map(String::from),
                channel: numeric_field(&f, 1),
                pci,
                metrics,
            }
        }
    };
    Some(marker)
}

/// Split `v0,v1,v2,v3,LTE,v0,...,NR5G` into per-technology reading lists.
/// Values after the last technology token are dropped.
fn chain_segments(payload: &str) -> Vec<(Technology, Vec<AntennaReading>)> {
    let mut segments = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for token in payload.split(',') {
        if let Some(tech) = Technology::from_token(token) {
            segments.push((tech, antenna::parse_readings(&pending.join(","))));
            pending.clear();
        } else {
            pending.push(token);
        }
    }
    if !pending.is_empty() {
        debug!("telemetry: dropping untagged chain values {pending:?}");
    }
    segments
}

// ── Builder ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct OpenEntry {
    technology: Technology,
    role: CarrierRole,
    /// Display number for secondaries.
    ca_index: Option<usize>,
    band: Option<String>,
    bandwidth_label: Option<String>,
    channel: Option<String>,
    pci: Option<String>,
    metrics: SignalMetrics,
    readings: Vec<AntennaReading>,
}

impl OpenEntry {
    fn from_marker(marker: Marker, role: CarrierRole, ca_index: Option<usize>) -> Self {
        Self {
            technology: marker.technology,
            role,
            ca_index,
            band: marker.band,
            bandwidth_label: marker.bandwidth_label,
            channel: marker.channel,
            pci: marker.pci,
            metrics: marker.metrics,
            readings: Vec::new(),
        }
    }

    /// Fill fields still missing from a later report of the same carrier.
    fn merge(&mut self, marker: Marker) {
        self.band = self.band.take().or(marker.band);
        self.bandwidth_label = self.bandwidth_label.take().or(marker.bandwidth_label);
        self.channel = self.channel.take().or(marker.channel);
        self.pci = self.pci.take().or(marker.pci);
        for m in [Metric::Rssi, Metric::Rsrp, Metric::Rsrq, Metric::Sinr] {
            self.metrics.fill(m, marker.metrics.get(m));
        }
    }

    fn finalize(self) -> CellSignalEntry {
        let tech = self.technology.as_str();
        let (id, display_name) = match (self.role, self.ca_index) {
            (CarrierRole::Secondary, Some(n)) => (
                format!("{}-scc-{n}", tech.to_ascii_lowercase()),
                format!("{tech} SCC {n}"),
            ),
            _ => (
                format!("{}-pcc", tech.to_ascii_lowercase()),
                format!("{tech} PCC"),
            ),
        };
        let active = self.readings.iter().filter(|r| r.value_dbm.is_some()).count();
        let rx_diversity = (active > 0).then(|| format!("{active}RX"));
        let antennas =
            antenna::assign_physical(self.readings, self.technology, self.band.as_deref());

        CellSignalEntry {
            id,
            display_name,
            technology: self.technology,
            role: self.role,
            band: self.band,
            bandwidth_label: self.bandwidth_label,
            channel: self.channel,
            pci: self.pci,
            rx_diversity,
            quality: SignalQuality::from_metrics(&self.metrics),
            metrics: self.metrics,
            antennas,
        }
    }
}

#[derive(Debug, Default)]
struct EntryBuilder {
    current: Option<OpenEntry>,
    finished: Vec<CellSignalEntry>,
    /// Channel and PCI of each primary opened so far.
    primaries: Vec<(Technology, Option<String>, Option<String>)>,
    lte_scc: usize,
    nr_scc: usize,
}

impl EntryBuilder {
    fn feed(&mut self, line: &RawLine) {
        match recognize(line) {
            Some(CarrierLine::Marker(marker)) => self.on_marker(marker),
            Some(CarrierLine::Chains(metric, segments)) => self.on_chains(metric, segments),
            None => {}
        }
    }

    fn has_primary(&self, technology: Technology) -> bool {
        self.primaries.iter().any(|(t, _, _)| *t == technology)
    }

    fn on_marker(&mut self, marker: Marker) {
        let tech = marker.technology;
        match marker.kind {
            MarkerKind::Primary if self.has_primary(tech) => self.merge_into_primary(marker),
            MarkerKind::Primary => self.open_primary(marker),
            // NSA: the NR leg shows up as an SCC before any NR primary
            MarkerKind::Secondary if tech == Technology::Nr && !self.has_primary(tech) => {
                self.open_primary(marker);
            }
            MarkerKind::Secondary if self.repeats_primary(&marker) => {
                debug!("telemetry: {} SCC repeats primary, skipped", tech.as_str());
            }
            MarkerKind::Secondary => {
                let counter = match tech {
                    Technology::Lte => &mut self.lte_scc,
                    Technology::Nr => &mut self.nr_scc,
                };
                *counter += 1;
                let index = *counter;
                self.open(OpenEntry::from_marker(
                    marker,
                    CarrierRole::Secondary,
                    Some(index),
                ));
            }
        }
    }

    fn repeats_primary(&self, marker: &Marker) -> bool {
        marker.channel.is_some()
            && self.primaries.iter().any(|(t, channel, pci)| {
                *t == marker.technology && *channel == marker.channel && *pci == marker.pci
            })
    }

    fn open_primary(&mut self, marker: Marker) {
        self.primaries.push((
            marker.technology,
            marker.channel.clone(),
            marker.pci.clone(),
        ));
        self.open(OpenEntry::from_marker(marker, CarrierRole::Primary, None));
    }

    fn merge_into_primary(&mut self, marker: Marker) {
        match self.current.as_mut() {
            Some(open) if open.role == CarrierRole::Primary && open.technology == marker.technology => {
                open.merge(marker);
            }
            _ => debug!(
                "telemetry: duplicate {} primary report, skipped",
                marker.technology.as_str()
            ),
        }
    }

    fn open(&mut self, entry: OpenEntry) {
        self.close();
        self.current = Some(entry);
    }

    fn close(&mut self) {
        if let Some(open) = self.current.take() {
            self.finished.push(open.finalize());
        }
    }

    fn on_chains(&mut self, metric: Metric, segments: Vec<(Technology, Vec<AntennaReading>)>) {
        for (tech, readings) in segments {
            let Some(open) = self.current.as_mut().filter(|o| o.technology == tech) else {
                debug!(
                    "telemetry: {:?} values for {} with no open {} carrier, ignored",
                    metric,
                    tech.as_str(),
                    tech.as_str()
                );
                continue;
            };
            let best = readings
                .iter()
                .filter_map(|r| r.value_dbm)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
            open.metrics.fill(metric, best);
            if metric == Metric::Rsrp {
                open.readings = readings;
            }
        }
    }

    fn finish(mut self) -> Vec<CellSignalEntry> {
        self.close();
        self.finished
    }
}

// ── Field helpers ────────────────────────────────────────────────────

fn split_fields(payload: &str) -> Vec<String> {
    payload
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim().to_string())
        .collect()
}

/// Field `i`, or `None` when missing, empty or `-`.
fn field(fields: &[String], i: usize) -> Option<String> {
    fields
        .get(i)
        .filter(|v| !v.is_empty() && v.as_str() != "-")
        .cloned()
}

/// Like [`field`], but only for tokens that read as an unsigned integer.
/// The original text is kept so leading zeros (MNC `02`) survive.
fn numeric_field(fields: &[String], i: usize) -> Option<String> {
    field(fields, i).filter(|v| v.parse::<u64>().is_ok())
}

/// Numeric field `i`; the not-applicable marker `-32768` reads as `None`.
fn number(fields: &[String], i: usize) -> Option<f64> {
    fields
        .get(i)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && (*v - -32768.0).abs() > f64::EPSILON)
}

/// LTE `+QENG` bandwidth index (0..=5).
fn lte_bandwidth_from_index(index: &str) -> Option<&'static str> {
    match index {
        "0" => Some("1.4 MHz"),
        "1" => Some("3 MHz"),
        "2" => Some("5 MHz"),
        "3" => Some("10 MHz"),
        "4" => Some("15 MHz"),
        "5" => Some("20 MHz"),
        _ => None,
    }
}

/// LTE `+QCAINFO` bandwidth in resource blocks.
fn lte_bandwidth_from_rbs(rbs: &str) -> Option<&'static str> {
    match rbs {
        "6" => Some("1.4 MHz"),
        "15" => Some("3 MHz"),
        "25" => Some("5 MHz"),
        "50" => Some("10 MHz"),
        "75" => Some("15 MHz"),
        "100" => Some("20 MHz"),
        _ => None,
    }
}

/// NR bandwidth index (0..=14).
fn nr_bandwidth_from_index(index: &str) -> Option<&'static str> {
    const LABELS: [&str; 15] = [
        "5 MHz", "10 MHz", "15 MHz", "20 MHz", "25 MHz", "30 MHz", "40 MHz", "50 MHz", "60 MHz",
        "70 MHz", "80 MHz", "90 MHz", "100 MHz", "200 MHz", "400 MHz",
    ];
    index
        .parse::<usize>()
        .ok()
        .and_then(|i| LABELS.get(i))
        .copied()
}
