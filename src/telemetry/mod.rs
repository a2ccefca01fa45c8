//! Modem telemetry parsing.
//!
//! [`parse_telemetry`] takes the raw text returned by one batched AT request
//! and turns it into a [`TelemetrySnapshot`]. The pipeline is one-way:
//!
//! ```text
//! blob → classifier (RawLine) → carrier / fields / identifier / encoding
//!      → metrics → TelemetrySnapshot
//! ```
//!
//! Nothing is retained between calls. Malformed fields fall back to sentinels
//! and only the modem's error token fails the whole parse.

pub mod antenna;
pub mod carrier;
pub mod classifier;
pub mod encoding;
pub mod fields;
pub mod identifier;
pub mod metrics;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::TelemetryError;

use self::carrier::{CarrierRole, CellSignalEntry, NetworkMode, ServingCell, Technology};
use self::classifier::RawLine;
use self::identifier::Identifier;
use self::metrics::SignalAssessment;

/// Sentinel for SIM and identity fields.
pub const NO_VALUE: &str = "-";
/// Sentinel for operator and phone number.
pub const UNKNOWN: &str = "Unknown";
/// Sentinel for technology fields.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Whether the blob carried any data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ok,
    /// Empty, whitespace or acknowledgement-only blob.
    EmptyResponse,
}

/// Everything the console shows for one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub status: SnapshotStatus,
    pub active_sim: String,
    pub sim_state: String,
    pub phone_number: String,
    pub operator: String,
    pub imei: String,
    pub imsi: String,
    pub iccid: String,
    /// `LTE`, `5G NSA`, `5G SA` or `Not Available`.
    pub network_type: String,
    pub access_technology: String,
    pub band: String,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub cell_id: Option<Identifier>,
    pub tac: Option<Identifier>,
    pub csq_rssi_dbm: Option<i32>,
    pub temperature_c: Option<i32>,
    pub apn: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    /// Number of secondary carriers.
    pub carrier_aggregation: usize,
    pub entries: Vec<CellSignalEntry>,
    pub signal_percentage: u8,
    pub signal_assessment: SignalAssessment,
    /// Cleaned response, echo and `OK` lines removed.
    pub raw_echo: String,
    /// Unix seconds.
    pub captured_at: i64,
}

impl TelemetrySnapshot {
    /// Snapshot for a blob with nothing in it.
    fn empty(captured_at: i64) -> Self {
        Self {
            status: SnapshotStatus::EmptyResponse,
            active_sim: NO_VALUE.to_string(),
            sim_state: NO_VALUE.to_string(),
            phone_number: UNKNOWN.to_string(),
            operator: UNKNOWN.to_string(),
            imei: NO_VALUE.to_string(),
            imsi: NO_VALUE.to_string(),
            iccid: NO_VALUE.to_string(),
            network_type: NOT_AVAILABLE.to_string(),
            access_technology: NOT_AVAILABLE.to_string(),
            band: NOT_AVAILABLE.to_string(),
            mcc: None,
            mnc: None,
            cell_id: None,
            tac: None,
            csq_rssi_dbm: None,
            temperature_c: None,
            apn: None,
            ipv4: None,
            ipv6: None,
            carrier_aggregation: 0,
            entries: Vec::new(),
            signal_percentage: 0,
            signal_assessment: SignalAssessment::Unknown,
            raw_echo: String::new(),
            captured_at,
        }
    }
}

/// Parse a telemetry blob with default settings.
pub fn parse_telemetry(blob: &str) -> Result<TelemetrySnapshot, TelemetryError> {
    parse_telemetry_with(blob, &ParserConfig::default())
}

/// Parse a telemetry blob, stamping it with the current time.
pub fn parse_telemetry_with(
    blob: &str,
    config: &ParserConfig,
) -> Result<TelemetrySnapshot, TelemetryError> {
    parse_telemetry_at(blob, config, chrono::Utc::now().timestamp())
}

/// Parse a telemetry blob with an explicit capture time.
///
/// # Errors
///
/// [`TelemetryError::ModemError`] if the blob contains the modem's error
/// token. No partial snapshot is returned in that case.
pub fn parse_telemetry_at(
    blob: &str,
    config: &ParserConfig,
    captured_at: i64,
) -> Result<TelemetrySnapshot, TelemetryError> {
    let lines = classifier::classify(blob, &config.echo_prefix);

    if let Some(token) = classifier::find_error_token(&lines) {
        warn!("telemetry: modem error token: {token}");
        return Err(TelemetryError::ModemError(token.to_string()));
    }
    if lines.is_empty() {
        debug!("telemetry: empty response");
        return Ok(TelemetrySnapshot::empty(captured_at));
    }

    let snapshot = assemble(&lines, captured_at);
    debug!(
        "telemetry: {} lines, {} carriers, {} ({}%)",
        lines.len(),
        snapshot.entries.len(),
        snapshot.network_type,
        snapshot.signal_percentage
    );
    Ok(snapshot)
}

fn assemble(lines: &[RawLine], captured_at: i64) -> TelemetrySnapshot {
    let serving: Vec<ServingCell> = lines.iter().filter_map(carrier::parse_serving_cell).collect();
    let entries = carrier::build_entries(lines);

    let (access_technology, nw_band) = fields::parse_qnwinfo(lines);
    let (imei, imsi) = fields::parse_identity_numbers(lines);
    let (ipv4, ipv6) = fields::parse_wan_addresses(lines);

    let band = nw_band.or_else(|| {
        entries
            .iter()
            .find(|e| e.role == CarrierRole::Primary)
            .and_then(|e| e.band.clone())
    });

    let percentage = metrics::overall_percentage(entries.iter().filter_map(|e| e.quality.composite));
    let carrier_aggregation = entries
        .iter()
        .filter(|e| e.role == CarrierRole::Secondary)
        .count();

    TelemetrySnapshot {
        status: SnapshotStatus::Ok,
        active_sim: fields::parse_active_sim(lines).unwrap_or_else(|| NO_VALUE.to_string()),
        sim_state: fields::parse_sim_state(lines).unwrap_or_else(|| NO_VALUE.to_string()),
        phone_number: fields::parse_phone_number(lines).unwrap_or_else(|| UNKNOWN.to_string()),
        operator: fields::parse_operator(lines).unwrap_or_else(|| UNKNOWN.to_string()),
        imei: imei.unwrap_or_else(|| NO_VALUE.to_string()),
        imsi: imsi.unwrap_or_else(|| NO_VALUE.to_string()),
        iccid: fields::parse_iccid(lines).unwrap_or_else(|| NO_VALUE.to_string()),
        network_type: network_type(&serving, &entries)
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        access_technology: access_technology.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        band: band.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        mcc: serving.iter().find_map(|c| c.mcc.clone()),
        mnc: serving.iter().find_map(|c| c.mnc.clone()),
        cell_id: serving
            .iter()
            .find_map(|c| c.cell_id.as_deref().and_then(identifier::normalize_cell_id)),
        tac: serving
            .iter()
            .find_map(|c| c.tac.as_deref().and_then(identifier::normalize_cell_id)),
        csq_rssi_dbm: fields::parse_csq_rssi(lines),
        temperature_c: fields::parse_temperature(lines),
        apn: fields::parse_apn(lines),
        ipv4,
        ipv6,
        carrier_aggregation,
        entries,
        signal_percentage: percentage.unwrap_or(0),
        signal_assessment: SignalAssessment::from_percentage(percentage),
        raw_echo: classifier::raw_echo(lines),
        captured_at,
    }
}

/// Deployment mode from the serving-cell report, falling back to which
/// technologies carry a primary carrier.
fn network_type(serving: &[ServingCell], entries: &[CellSignalEntry]) -> Option<&'static str> {
    let has_mode = |mode| serving.iter().any(|c| c.mode == mode);
    if has_mode(NetworkMode::NrSa) {
        return Some(NetworkMode::NrSa.label());
    }
    if has_mode(NetworkMode::NrNsa) {
        return Some(NetworkMode::NrNsa.label());
    }
    if has_mode(NetworkMode::Lte) {
        return Some(NetworkMode::Lte.label());
    }

    let has_primary = |tech| {
        entries
            .iter()
            .any(|e| e.technology == tech && e.role == CarrierRole::Primary)
    };
    match (has_primary(Technology::Lte), has_primary(Technology::Nr)) {
        (true, true) => Some(NetworkMode::NrNsa.label()),
        (false, true) => Some(NetworkMode::NrSa.label()),
        (true, false) => Some(NetworkMode::Lte.label()),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LTE_CA_BLOB: &str = "AT+QUIMSLOT?;+CPIN?;+CNUM;+COPS?;+CGSN;+CIMI;+QCCID;+QNWINFO;+QENG=\"servingcell\";+QRSRP;+QRSRQ;+QSINR;+QCAINFO;+CSQ;+QTEMP;+CGCONTRDP;+QMAP=\"WWAN\"\r\n\
        +QUIMSLOT: 1\r\n\
        +CPIN: READY\r\n\
        +CNUM: \"\",\"+15551234567\",145\r\n\
        +COPS: 0,0,\"ROGERS ROGERS\",7\r\n\
        866834049460285\r\n\
        302720123456789\r\n\
        +QCCID: 89302720554012345678\r\n\
        +QNWINFO: \"FDD LTE\",\"302720\",\"LTE BAND 66\",66986\r\n\
        +QENG: \"servingcell\",\"NOCONN\",\"LTE\",\"FDD\",302,720,1A2B3C,101,66986,66,5,5,2F1,-95,-10,-65,15,-\r\n\
        +QRSRP: -95,-97,-99,-101,LTE\r\n\
        +QRSRQ: -10,-11,-12,-13,LTE\r\n\
        +QSINR: 15,12,9,7,LTE\r\n\
        +QCAINFO: \"PCC\",66986,100,\"LTE BAND 66\",1,101,-95,-10,-65,15\r\n\
        +QCAINFO: \"SCC\",5110,50,\"LTE BAND 12\",1,220,-104,-12,-72,6\r\n\
        +CSQ: 24,99\r\n\
        +QTEMP: \"cpu0-a7-usr\",\"44\"\r\n\
        +CGCONTRDP: 1,5,\"ltemobile.apn\",\"10.64.12.7.255.255.255.0\"\r\n\
        +QMAP: \"WWAN\",1,1,\"IPV4\",\"10.64.12.7\"\r\n\
        OK\r\n";

    const NSA_BLOB: &str = "AT+QENG=\"servingcell\";+QCAINFO;+QRSRP\r\n\
        +QENG: \"servingcell\",\"NOCONN\"\r\n\
        +QENG: \"LTE\",\"FDD\",310,260,1A2B3C,101,66986,66,5,5,2F1,-95,-10,-65,15,0,-,-\r\n\
        +QENG: \"NR5G-NSA\",310,260,512,-88,22,-11,648672,77,12,1\r\n\
        +QCAINFO: \"PCC\",66986,100,\"LTE BAND 66\",1,101,-95,-10,-65,15\r\n\
        +QCAINFO: \"SCC\",648672,12,\"NR5G BAND 77\",1,512,0,-,-\r\n\
        +QRSRP: -95,-97,-99,-101,LTE,-88,-32768,-93,-32768,NR5G\r\n\
        OK\r\n";

    fn parse(blob: &str) -> TelemetrySnapshot {
        parse_telemetry_at(blob, &ParserConfig::default(), 1_700_000_000).unwrap()
    }

    #[test]
    fn test_full_lte_batch() {
        let s = parse(LTE_CA_BLOB);
        assert_eq!(s.status, SnapshotStatus::Ok);
        assert_eq!(s.active_sim, "SIM 1");
        assert_eq!(s.sim_state, "READY");
        assert_eq!(s.phone_number, "+15551234567");
        assert_eq!(s.operator, "Rogers");
        assert_eq!(s.imei, "866834049460285");
        assert_eq!(s.imsi, "302720123456789");
        assert_eq!(s.iccid, "89302720554012345678");
        assert_eq!(s.network_type, "LTE");
        assert_eq!(s.access_technology, "LTE");
        assert_eq!(s.band, "B66");
        assert_eq!(s.mcc.as_deref(), Some("302"));
        assert_eq!(s.mnc.as_deref(), Some("720"));
        assert_eq!(s.cell_id.as_ref().map(|c| c.hex.as_str()), Some("1A2B3C"));
        assert_eq!(s.tac.as_ref().and_then(|t| t.decimal), Some(0x2F1));
        assert_eq!(s.csq_rssi_dbm, Some(-65));
        assert_eq!(s.temperature_c, Some(44));
        assert_eq!(s.apn.as_deref(), Some("ltemobile.apn"));
        assert_eq!(s.ipv4.as_deref(), Some("10.64.12.7"));
        assert_eq!(s.ipv6, None);
        assert_eq!(s.captured_at, 1_700_000_000);
    }

    #[test]
    fn test_lte_batch_signal_aggregation() {
        let s = parse(LTE_CA_BLOB);
        assert_eq!(s.entries.len(), 2);
        assert_eq!(s.carrier_aggregation, 1);
        // PCC: rsrp 57%, sinr 56% → 56.5; SCC: rsrp 44%, sinr 36% → 40
        assert_eq!(s.entries[0].quality.composite, Some(56.5));
        assert_eq!(s.entries[1].quality.composite, Some(40.0));
        assert_eq!(s.signal_percentage, 48);
        assert_eq!(s.signal_assessment, SignalAssessment::Fair);
    }

    #[test]
    fn test_raw_echo_drops_echo_and_ok() {
        let s = parse(LTE_CA_BLOB);
        assert!(s.raw_echo.starts_with("+QUIMSLOT: 1\n+CPIN: READY"));
        assert!(!s.raw_echo.contains("AT+"));
        assert!(!s.raw_echo.lines().any(|l| l == "OK"));
    }

    #[test]
    fn test_nsa_network_type() {
        let s = parse(NSA_BLOB);
        assert_eq!(s.network_type, "5G NSA");
        assert_eq!(s.entries.len(), 2);
        assert_eq!(s.carrier_aggregation, 0);
        assert_eq!(s.cell_id.as_ref().and_then(|c| c.parent_id), Some(0x1A2B));
        // no +QNWINFO: band comes from the first primary
        assert_eq!(s.band, "B66");
        assert_eq!(s.access_technology, NOT_AVAILABLE);
    }

    #[test]
    fn test_sa_network_type() {
        let blob = "+QENG: \"servingcell\",\"NOCONN\",\"NR5G-SA\",\"TDD\",310,260,F3C2A1B04,512,5A1B,520110,41,12,-92,-11,16,1,-\r\nOK";
        let s = parse(blob);
        assert_eq!(s.network_type, "5G SA");
        assert_eq!(s.band, "N41");
        assert_eq!(s.tac.as_ref().map(|t| t.hex.as_str()), Some("5A1B"));
        assert_eq!(s.entries[0].technology, Technology::Nr);
    }

    #[test]
    fn test_ok_only_is_empty_response() {
        let s = parse("OK");
        assert_eq!(s.status, SnapshotStatus::EmptyResponse);
        assert_eq!(s.active_sim, "-");
        assert_eq!(s.sim_state, "-");
        assert_eq!(s.operator, UNKNOWN);
        assert_eq!(s.network_type, NOT_AVAILABLE);
        assert_eq!(s.signal_assessment, SignalAssessment::Unknown);
        assert!(s.entries.is_empty());
    }

    #[test]
    fn test_whitespace_is_empty_response() {
        assert_eq!(parse("  \r\n\t").status, SnapshotStatus::EmptyResponse);
        assert_eq!(parse("").status, SnapshotStatus::EmptyResponse);
    }

    #[test]
    fn test_error_token_is_hard_failure() {
        let err = parse_telemetry("AT+CSQ\r\n+CSQ: 20,99\r\nERROR\r\n").unwrap_err();
        assert_eq!(err, TelemetryError::ModemError("ERROR".into()));

        let err = parse_telemetry("+CME ERROR: 10\r\n").unwrap_err();
        assert_eq!(err, TelemetryError::ModemError("+CME ERROR: 10".into()));
    }

    #[test]
    fn test_garbage_numbers_do_not_abort() {
        let s = parse(
            "+QENG: \"servingcell\",\"NOCONN\",\"LTE\",\"FDD\",302,720,1\u{e9}A,266,2050,4,5,5,61E4,-102,-11,-70,10,-\r\n\
             +CSQ: 2000000000,99\r\n\
             OK",
        );
        assert_eq!(s.status, SnapshotStatus::Ok);
        let cell = s.cell_id.unwrap();
        assert_eq!(cell.hex, "1\u{e9}A");
        assert_eq!(cell.parent_id, None);
        assert_eq!(s.csq_rssi_dbm, None);
        assert_eq!(s.entries[0].band.as_deref(), Some("B4"));
    }

    #[test]
    fn test_no_carriers_is_no_signal() {
        let s = parse("+QUIMSLOT: 1\r\n+CPIN: READY\r\nOK");
        assert_eq!(s.status, SnapshotStatus::Ok);
        assert_eq!(s.signal_percentage, 0);
        assert_eq!(s.signal_assessment, SignalAssessment::NoSignal);
        assert_eq!(s.imei, NO_VALUE);
        assert_eq!(s.phone_number, UNKNOWN);
        assert_eq!(s.network_type, NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse(LTE_CA_BLOB);
        let second = parse(LTE_CA_BLOB);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_custom_echo_prefix() {
        let config = ParserConfig {
            echo_prefix: "CMD".into(),
        };
        let blob = "CMD+QUIMSLOT?\r\n+QUIMSLOT: 2\r\nOK\r\n";
        let s = parse_telemetry_at(blob, &config, 0).unwrap();
        assert_eq!(s.active_sim, "SIM 2");
        assert!(!s.raw_echo.contains("CMD"));
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let json = serde_json::to_value(parse(NSA_BLOB)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["network_type"], "5G NSA");
        assert_eq!(json["entries"][1]["technology"], "NR");
        assert_eq!(json["entries"][0]["role"], "primary");
    }
}
