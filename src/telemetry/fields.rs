//! Single-line status fields: SIM, identity, operator, network info, RSSI,
//! temperature and data-session details.
//!
//! Every parser takes the classified lines and returns `None` when its line is
//! missing or malformed; the snapshot substitutes the sentinel.

use tracing::debug;

use super::classifier::RawLine;
use super::encoding;

// ── Parsers ──────────────────────────────────────────────────────────

/// `+QUIMSLOT: 1` → `SIM 1`.
pub fn parse_active_sim(lines: &[RawLine]) -> Option<String> {
    let slot = payload_of(lines, "+QUIMSLOT:")?;
    let slot: u8 = slot.parse().ok()?;
    Some(format!("SIM {slot}"))
}

/// `+CPIN: READY` → `READY`.
pub fn parse_sim_state(lines: &[RawLine]) -> Option<String> {
    payload_of(lines, "+CPIN:")
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Own number from `+CNUM: "<alpha>","<number>",<type>`.
///
/// The number may be UCS-2 hex depending on the character set.
pub fn parse_phone_number(lines: &[RawLine]) -> Option<String> {
    let data = payload_of(lines, "+CNUM:")?;
    let number = data.split(',').nth(1)?.trim().trim_matches('"');
    if number.is_empty() {
        return None;
    }
    Some(encoding::decode_number(number).decoded)
}

/// Parse `+COPS: 0,0,"ROGERS ROGERS",7` → `Rogers`.
///
/// Operator names sent as UCS-2 hex are decoded first.
pub fn parse_operator(lines: &[RawLine]) -> Option<String> {
    let data = payload_of(lines, "+COPS:")?;
    // Find the quoted operator name
    let start = data.find('"')? + 1;
    let end = data[start..].find('"')? + start;
    let mut name = data[start..end].trim().to_string();
    if name.is_empty() {
        return None;
    }
    if looks_like_hex_text(&name) {
        name = encoding::decode(&name).decoded;
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() >= 2 && words[0].eq_ignore_ascii_case(words[1]) {
        // "ROGERS ROGERS" → "Rogers"
        Some(titlecase(words[0]))
    } else {
        Some(words.iter().map(|w| titlecase(w)).collect::<Vec<_>>().join(" "))
    }
}

/// Parse `+QCCID: 89302720...` → ICCID.
pub fn parse_iccid(lines: &[RawLine]) -> Option<String> {
    payload_of(lines, "+QCCID:")
        .or_else(|| payload_of(lines, "+ICCID:"))
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse `+QNWINFO: "FDD LTE","302720","LTE BAND 4",2050` → (technology, band).
pub fn parse_qnwinfo(lines: &[RawLine]) -> (Option<String>, Option<String>) {
    let Some(data) = payload_of(lines, "+QNWINFO:") else {
        return (None, None);
    };

    let parts: Vec<&str> = data
        .split(',')
        .map(|s| s.trim().trim_matches('"'))
        .collect();

    let technology = parts
        .first()
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("No Service"))
        .map(|s| {
            if s.contains("NR") {
                "NR5G".to_string()
            } else if s.contains("LTE") {
                "LTE".to_string()
            } else {
                (*s).to_string()
            }
        });

    let band = parts.get(2).filter(|s| !s.is_empty()).map(|s| {
        if let Some(rest) = s.strip_prefix("LTE BAND ") {
            format!("B{rest}")
        } else if let Some(rest) = s.strip_prefix("NR5G BAND ") {
            format!("N{rest}")
        } else if let Some(rest) = s.strip_prefix("WCDMA BAND ") {
            format!("B{rest}")
        } else {
            (*s).to_string()
        }
    });

    (technology, band)
}

/// `+CSQ` RSSI in dBm, or `None` when absent or not detectable.
pub fn parse_csq_rssi(lines: &[RawLine]) -> Option<i32> {
    match parse_csq(lines) {
        Ok(dbm) => Some(dbm),
        Err(e) => {
            debug!("telemetry: {e}");
            None
        }
    }
}

/// Parse `+CSQ: <rssi>,<ber>` → RSSI in dBm.
fn parse_csq(lines: &[RawLine]) -> Result<i32, String> {
    let data = payload_of(lines, "+CSQ:").ok_or("no +CSQ in response")?;

    let rssi_raw: i32 = data
        .split(',')
        .next()
        .ok_or("no RSSI value")?
        .trim()
        .parse()
        .map_err(|e| format!("bad RSSI: {e}"))?;

    if rssi_raw == 99 {
        return Err("RSSI not detectable (99)".into());
    }
    if !(0..=31).contains(&rssi_raw) {
        return Err(format!("RSSI {rssi_raw} out of range 0..=31"));
    }

    Ok(-113 + 2 * rssi_raw)
}

/// Hottest valid sensor across all `+QTEMP:` lines.
///
/// Handles both `+QTEMP: "cpu0-a7-usr","41"` and the older
/// `+QTEMP: 38,40,39` form. Sensors report `-273` when unavailable.
pub fn parse_temperature(lines: &[RawLine]) -> Option<i32> {
    lines
        .iter()
        .filter(|l| l.has_prefix("+QTEMP:"))
        .filter_map(RawLine::payload)
        .flat_map(|data| data.split(','))
        .filter_map(|v| v.trim().trim_matches('"').parse::<i32>().ok())
        .filter(|c| (-40..=150).contains(c))
        .max()
}

/// APN of the first `+CGCONTRDP: <cid>,<bearer>,"<apn>",...` context.
pub fn parse_apn(lines: &[RawLine]) -> Option<String> {
    lines
        .iter()
        .filter(|l| l.has_prefix("+CGCONTRDP:"))
        .filter_map(RawLine::payload)
        .filter_map(|data| data.split(',').nth(2))
        .map(|apn| apn.trim().trim_matches('"'))
        .find(|apn| !apn.is_empty())
        .map(String::from)
}

/// WAN addresses from `+QMAP: "WWAN",1,1,"IPV4","10.0.0.2"` lines →
/// (ipv4, ipv6). Unassigned addresses are skipped.
pub fn parse_wan_addresses(lines: &[RawLine]) -> (Option<String>, Option<String>) {
    let mut ipv4 = None;
    let mut ipv6 = None;
    for data in lines
        .iter()
        .filter(|l| l.has_prefix("+QMAP:"))
        .filter_map(RawLine::payload)
    {
        let parts: Vec<&str> = data
            .split(',')
            .map(|s| s.trim().trim_matches('"'))
            .collect();
        if !parts.first().is_some_and(|p| p.eq_ignore_ascii_case("WWAN")) {
            continue;
        }
        let (Some(family), Some(addr)) = (parts.get(3), parts.get(4)) else {
            continue;
        };
        if is_unassigned(addr) {
            continue;
        }
        match family.to_ascii_uppercase().as_str() {
            "IPV4" => ipv4 = ipv4.or_else(|| Some((*addr).to_string())),
            "IPV6" => ipv6 = ipv6.or_else(|| Some((*addr).to_string())),
            _ => {}
        }
    }
    (ipv4, ipv6)
}

/// IMEI and IMSI from bare 15-digit lines.
///
/// Neither `+CGSN` nor `+CIMI` prefixes its answer, so each bare line is
/// matched to a command by its position: the n-th bare line after an echo
/// answers the n-th identity command named in that echo. Without an echo the
/// batch order (`+CGSN` then `+CIMI`) is assumed.
pub fn parse_identity_numbers(lines: &[RawLine]) -> (Option<String>, Option<String>) {
    let mut imei = None;
    let mut imsi = None;
    let mut group: Option<&str> = None;
    let mut position = 0usize;

    for line in lines {
        let echo = line.originating_command.as_deref();
        if echo != group {
            group = echo;
            position = 0;
        }
        // Some firmware prefixes the IMEI
        if let Some(v) = line.text.strip_prefix("+CGSN:") {
            imei = imei.or_else(|| Some(v.trim().trim_matches('"').to_string()));
            position += 1;
            continue;
        }
        if !is_identity_number(&line.text) {
            continue;
        }
        let slots = identity_slots(echo);
        match slots.get(position) {
            Some(IdentitySlot::Imei) => imei = imei.or_else(|| Some(line.text.clone())),
            Some(IdentitySlot::Imsi) => imsi = imsi.or_else(|| Some(line.text.clone())),
            None => debug!("telemetry: unassigned identity line {}", line.text),
        }
        position += 1;
    }
    (imei, imsi)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentitySlot {
    Imei,
    Imsi,
}

/// Identity commands named in an echo, in echo order.
fn identity_slots(echo: Option<&str>) -> Vec<IdentitySlot> {
    const DEFAULT: [IdentitySlot; 2] = [IdentitySlot::Imei, IdentitySlot::Imsi];
    let Some(echo) = echo else {
        return DEFAULT.to_vec();
    };
    let upper = echo.to_ascii_uppercase();
    let mut found: Vec<(usize, IdentitySlot)> = [
        ("+CGSN", IdentitySlot::Imei),
        ("+GSN", IdentitySlot::Imei),
        ("+CIMI", IdentitySlot::Imsi),
    ]
    .into_iter()
    .filter_map(|(needle, slot)| upper.find(needle).map(|pos| (pos, slot)))
    .collect();
    if found.is_empty() {
        return DEFAULT.to_vec();
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.dedup_by_key(|(_, slot)| *slot);
    found.into_iter().map(|(_, slot)| slot).collect()
}

fn is_identity_number(text: &str) -> bool {
    text.len() == 15 && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_unassigned(addr: &str) -> bool {
    addr.is_empty()
        || addr == "0.0.0.0"
        || addr.split(':').all(|g| g.trim_start_matches('0').is_empty())
}

/// Operator names only get hex-decoded when the whole field is hex in
/// UCS-2-sized units; otherwise names like `FACE` would be mangled.
fn looks_like_hex_text(s: &str) -> bool {
    s.len() >= 8 && s.len() % 4 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Payload of the first line with `prefix`.
fn payload_of<'a>(lines: &'a [RawLine], prefix: &str) -> Option<&'a str> {
    lines
        .iter()
        .find(|l| l.has_prefix(prefix))
        .and_then(RawLine::payload)
}

/// Title-case a word: "ROGERS" → "Rogers".
fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => {
            let upper: String = c.to_uppercase().collect();
            upper + &chars.as_str().to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::classifier::classify;
    use crate::telemetry::encoding::encode_ucs2;

    fn lines(blob: &str) -> Vec<RawLine> {
        classify(blob, "AT")
    }

    #[test]
    fn test_parse_csq_valid() {
        assert_eq!(parse_csq(&lines("+CSQ: 20,99\r\nOK")).unwrap(), -73);
        assert_eq!(parse_csq_rssi(&lines("+CSQ: 0,99")), Some(-113));
    }

    #[test]
    fn test_parse_csq_not_detectable() {
        assert!(parse_csq(&lines("+CSQ: 99,99\r\nOK")).is_err());
        assert_eq!(parse_csq_rssi(&lines("+CSQ: 99,99")), None);
    }

    #[test]
    fn test_parse_csq_no_response() {
        assert!(parse_csq(&lines("OK")).is_err());
        assert!(parse_csq(&lines("+CSQ: x,99")).is_err());
    }

    #[test]
    fn test_parse_csq_out_of_range() {
        assert_eq!(parse_csq(&lines("+CSQ: 31,99")).unwrap(), -51);
        assert!(parse_csq(&lines("+CSQ: 32,99")).is_err());
        assert!(parse_csq(&lines("+CSQ: -1,99")).is_err());
        assert_eq!(parse_csq_rssi(&lines("+CSQ: 2000000000,99\r\nOK")), None);
    }

    #[test]
    fn test_parse_active_sim_and_state() {
        let l = lines("+QUIMSLOT: 2\r\n+CPIN: READY\r\n");
        assert_eq!(parse_active_sim(&l).as_deref(), Some("SIM 2"));
        assert_eq!(parse_sim_state(&l).as_deref(), Some("READY"));
        assert!(parse_active_sim(&lines("+QUIMSLOT: ?")).is_none());
        assert_eq!(
            parse_sim_state(&lines("+CPIN: SIM PIN")).as_deref(),
            Some("SIM PIN")
        );
    }

    #[test]
    fn test_parse_cops_rogers() {
        let l = lines("+COPS: 0,0,\"ROGERS ROGERS\",7\r\nOK");
        assert_eq!(parse_operator(&l).as_deref(), Some("Rogers"));
    }

    #[test]
    fn test_parse_cops_multi_word() {
        let l = lines("+COPS: 0,0,\"VERIZON WIRELESS\",7");
        assert_eq!(parse_operator(&l).as_deref(), Some("Verizon Wireless"));
    }

    #[test]
    fn test_parse_cops_ucs2() {
        let raw = format!("+COPS: 0,0,\"{}\",7", encode_ucs2("TELUS"));
        assert_eq!(parse_operator(&lines(&raw)).as_deref(), Some("Telus"));
    }

    #[test]
    fn test_parse_cops_no_operator() {
        assert!(parse_operator(&lines("+COPS: 0")).is_none());
        assert!(parse_operator(&lines("+COPS: 0,0,\"\",7")).is_none());
    }

    #[test]
    fn test_parse_phone_number() {
        let l = lines("+CNUM: \"\",\"+15551234567\",145");
        assert_eq!(parse_phone_number(&l).as_deref(), Some("+15551234567"));

        let raw = format!("+CNUM: \"\",\"{}\",145", encode_ucs2("+15551234567"));
        assert_eq!(parse_phone_number(&lines(&raw)).as_deref(), Some("+15551234567"));

        assert!(parse_phone_number(&lines("+CNUM: \"\",\"\",129")).is_none());
    }

    #[test]
    fn test_parse_qccid() {
        let l = lines("+QCCID: 89302720554012345678\r\nOK");
        assert_eq!(parse_iccid(&l).as_deref(), Some("89302720554012345678"));
    }

    #[test]
    fn test_parse_qnwinfo() {
        let l = lines("+QNWINFO: \"FDD LTE\",\"302720\",\"LTE BAND 4\",2050");
        let (tech, band) = parse_qnwinfo(&l);
        assert_eq!(tech.as_deref(), Some("LTE"));
        assert_eq!(band.as_deref(), Some("B4"));
    }

    #[test]
    fn test_parse_qnwinfo_nr() {
        let l = lines("+QNWINFO: \"TDD NR5G\",\"310260\",\"NR5G BAND 41\",520110");
        let (tech, band) = parse_qnwinfo(&l);
        assert_eq!(tech.as_deref(), Some("NR5G"));
        assert_eq!(band.as_deref(), Some("N41"));
    }

    #[test]
    fn test_parse_qnwinfo_wcdma() {
        let l = lines("+QNWINFO: \"WCDMA\",\"302720\",\"WCDMA BAND 2\",9800");
        let (tech, band) = parse_qnwinfo(&l);
        assert_eq!(tech.as_deref(), Some("WCDMA"));
        assert_eq!(band.as_deref(), Some("B2"));
    }

    #[test]
    fn test_parse_qnwinfo_no_service() {
        assert_eq!(parse_qnwinfo(&lines("+QNWINFO: No Service")), (None, None));
    }

    #[test]
    fn test_parse_temperature() {
        let l = lines(
            "+QTEMP: \"modem-lte-sub6-pa1\",\"37\"\r\n\
             +QTEMP: \"cpu0-a7-usr\",\"44\"\r\n\
             +QTEMP: \"modem-ambient-usr\",\"-273\"\r\n",
        );
        assert_eq!(parse_temperature(&l), Some(44));
        assert_eq!(parse_temperature(&lines("+QTEMP: 38,40,39")), Some(40));
        assert_eq!(parse_temperature(&lines("+QTEMP: \"x\",\"-273\"")), None);
    }

    #[test]
    fn test_parse_apn() {
        let l = lines(
            "+CGCONTRDP: 1,5,\"ims\",\"\",\"\"\r\n+CGCONTRDP: 2,6,\"ltemobile.apn\",\"10.1.2.3\"",
        );
        assert_eq!(parse_apn(&l).as_deref(), Some("ims"));
        assert!(parse_apn(&lines("+CGCONTRDP: 1,5,\"\"")).is_none());
    }

    #[test]
    fn test_parse_wan_addresses() {
        let l = lines(
            "+QMAP: \"WWAN\",1,1,\"IPV4\",\"10.64.12.7\"\r\n\
             +QMAP: \"WWAN\",1,1,\"IPV6\",\"2607:fb90:1234::1\"",
        );
        let (v4, v6) = parse_wan_addresses(&l);
        assert_eq!(v4.as_deref(), Some("10.64.12.7"));
        assert_eq!(v6.as_deref(), Some("2607:fb90:1234::1"));
    }

    #[test]
    fn test_parse_wan_addresses_unassigned() {
        let l = lines(
            "+QMAP: \"WWAN\",0,1,\"IPV4\",\"0.0.0.0\"\r\n\
             +QMAP: \"WWAN\",0,1,\"IPV6\",\"0:0:0:0:0:0:0:0\"",
        );
        assert_eq!(parse_wan_addresses(&l), (None, None));
    }

    #[test]
    fn test_identity_numbers_follow_echo_order() {
        let l = lines("AT+CIMI;+CGSN\r\n302720123456789\r\n866834049460285\r\nOK");
        let (imei, imsi) = parse_identity_numbers(&l);
        assert_eq!(imei.as_deref(), Some("866834049460285"));
        assert_eq!(imsi.as_deref(), Some("302720123456789"));
    }

    #[test]
    fn test_identity_numbers_separate_echoes() {
        let l = lines("AT+CGSN\r\n866834049460285\r\nOK\r\nAT+CIMI\r\n302720123456789\r\nOK");
        let (imei, imsi) = parse_identity_numbers(&l);
        assert_eq!(imei.as_deref(), Some("866834049460285"));
        assert_eq!(imsi.as_deref(), Some("302720123456789"));
    }

    #[test]
    fn test_identity_numbers_without_echo() {
        let l = lines("866834049460285\r\n302720123456789\r\n");
        let (imei, imsi) = parse_identity_numbers(&l);
        assert_eq!(imei.as_deref(), Some("866834049460285"));
        assert_eq!(imsi.as_deref(), Some("302720123456789"));
    }

    #[test]
    fn test_identity_numbers_prefixed_imei() {
        let l = lines("AT+CGSN;+CIMI\r\n+CGSN: \"866834049460285\"\r\n302720123456789\r\n");
        let (imei, imsi) = parse_identity_numbers(&l);
        assert_eq!(imei.as_deref(), Some("866834049460285"));
        assert_eq!(imsi.as_deref(), Some("302720123456789"));
    }

    #[test]
    fn test_titlecase() {
        assert_eq!(titlecase("ROGERS"), "Rogers");
        assert_eq!(titlecase(""), "");
    }
}
