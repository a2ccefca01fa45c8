//! Per-antenna readings and logical→physical port mapping.
//!
//! The modem reports receive chains in logical order; which physical port
//! each chain lands on depends on the RF path the band uses. The mapping is
//! plain data: one 4-entry permutation per layout, picked by band number.

use serde::Serialize;

use super::carrier::Technology;

/// Number of physical antenna ports on the module.
pub const ANTENNA_PORTS: u8 = 4;

/// Value the modem prints for a chain that is not in use.
const NOT_APPLICABLE: &str = "-32768";

/// NR FDD bands routed through the 2×2 low-band path.
const NR_FDD_2X2_BANDS: &[u32] = &[5, 8, 12, 13, 14, 18, 20, 26, 28, 29, 71];

/// NR TDD bands.
const NR_TDD_BANDS: &[u32] = &[34, 38, 39, 40, 41, 46, 47, 48, 77, 78, 79];

/// Receive-path layout, each with a fixed logical→physical permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AntennaLayout {
    Lte,
    NrFdd2x2,
    NrFdd4x4,
    NrTdd,
}

impl AntennaLayout {
    /// Physical port for each logical index.
    pub fn port_map(self) -> [u8; 4] {
        match self {
            Self::Lte => [0, 1, 2, 3],
            Self::NrFdd2x2 => [1, 0, 3, 2],
            Self::NrFdd4x4 => [0, 1, 3, 2],
            Self::NrTdd => [2, 3, 0, 1],
        }
    }

    /// Pick the layout for a carrier. Unrecognized NR bands use 4×4 FDD.
    pub fn for_band(technology: Technology, band: Option<&str>) -> Self {
        match technology {
            Technology::Lte => Self::Lte,
            Technology::Nr => match band.and_then(band_number) {
                Some(n) if NR_TDD_BANDS.contains(&n) => Self::NrTdd,
                Some(n) if NR_FDD_2X2_BANDS.contains(&n) => Self::NrFdd2x2,
                _ => Self::NrFdd4x4,
            },
        }
    }

    fn physical(self, logical: u8) -> Option<u8> {
        self.port_map().get(usize::from(logical)).copied()
    }

    fn logical(self, physical: u8) -> Option<u8> {
        self.port_map()
            .iter()
            .position(|&p| p == physical)
            .and_then(|i| u8::try_from(i).ok())
    }
}

/// One receive chain reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AntennaReading {
    pub logical_index: u8,
    /// Derived from the layout; `None` if the logical index has no port.
    pub physical_index: Option<u8>,
    /// `None` when the modem reported the chain as not applicable.
    pub value_dbm: Option<f64>,
    /// Placeholder for a port with no reading.
    pub not_used: bool,
}

impl AntennaReading {
    /// Human-readable value for the console.
    pub fn label(&self) -> String {
        match self.value_dbm {
            _ if self.not_used => "Not Used".to_string(),
            Some(v) => format!("{v} dBm"),
            None => "-".to_string(),
        }
    }
}

/// Parse a comma list of per-chain values, optionally parenthesized.
///
/// `-32768`, `-`, `NA` or anything non-numeric become `None`.
pub fn parse_readings(list: &str) -> Vec<AntennaReading> {
    let inner = list
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .enumerate()
        .filter_map(|(i, raw)| {
            let logical_index = u8::try_from(i).ok()?;
            Some(AntennaReading {
                logical_index,
                physical_index: None,
                value_dbm: parse_value(raw),
                not_used: false,
            })
        })
        .collect()
}

/// Assign physical ports and normalize the list for display.
///
/// Readings without a value are dropped. NR carriers get a "Not Used"
/// placeholder for every port without a real reading so the list always has
/// four ports. Sorted by physical index, unmapped readings last.
pub fn assign_physical(
    readings: Vec<AntennaReading>,
    technology: Technology,
    band: Option<&str>,
) -> Vec<AntennaReading> {
    let layout = AntennaLayout::for_band(technology, band);
    let mut mapped: Vec<AntennaReading> = readings
        .into_iter()
        .filter(|r| r.value_dbm.is_some())
        .map(|r| AntennaReading {
            physical_index: layout.physical(r.logical_index),
            ..r
        })
        .collect();

    if technology == Technology::Nr {
        for port in 0..ANTENNA_PORTS {
            if mapped.iter().any(|r| r.physical_index == Some(port)) {
                continue;
            }
            mapped.push(AntennaReading {
                logical_index: layout.logical(port).unwrap_or(port),
                physical_index: Some(port),
                value_dbm: None,
                not_used: true,
            });
        }
    }

    mapped.sort_by_key(|r| (r.physical_index.is_none(), r.physical_index, r.logical_index));
    mapped
}

/// Extract a band number from `N77`, `n77`, `B3`, `NR5G BAND 77`, `LTE BAND 3`
/// or a bare `77`.
pub fn band_number(band: &str) -> Option<u32> {
    let digits: String = band
        .trim()
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

fn parse_value(raw: &str) -> Option<f64> {
    let v = raw.trim().trim_matches(|c: char| c == '(' || c == ')' || c == '"');
    if v == NOT_APPLICABLE || v == "-" || v.eq_ignore_ascii_case("NA") {
        return None;
    }
    v.parse::<f64>().ok().filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_readings_parenthesized() {
        let r = parse_readings("(-95,-97,-32768,-110)");
        assert_eq!(r.len(), 4);
        assert_eq!(r[0].value_dbm, Some(-95.0));
        assert_eq!(r[2].value_dbm, None);
        assert_eq!(r[3].logical_index, 3);
    }

    #[test]
    fn test_parse_readings_plain_and_garbage() {
        let r = parse_readings("-88, NA, x, -");
        assert_eq!(r.len(), 4);
        assert_eq!(r[0].value_dbm, Some(-88.0));
        assert!(r[1..].iter().all(|a| a.value_dbm.is_none()));
        assert!(parse_readings("()").is_empty());
    }

    #[test]
    fn test_band_number() {
        assert_eq!(band_number("N77"), Some(77));
        assert_eq!(band_number("n41"), Some(41));
        assert_eq!(band_number("NR5G BAND 78"), Some(78));
        assert_eq!(band_number("LTE BAND 3"), Some(3));
        assert_eq!(band_number("B66"), Some(66));
        assert_eq!(band_number("71"), Some(71));
        assert_eq!(band_number("NR"), None);
    }

    #[test]
    fn test_layout_selection() {
        assert_eq!(AntennaLayout::for_band(Technology::Lte, Some("B3")), AntennaLayout::Lte);
        assert_eq!(AntennaLayout::for_band(Technology::Nr, Some("N77")), AntennaLayout::NrTdd);
        assert_eq!(AntennaLayout::for_band(Technology::Nr, Some("N71")), AntennaLayout::NrFdd2x2);
        assert_eq!(AntennaLayout::for_band(Technology::Nr, Some("N66")), AntennaLayout::NrFdd4x4);
        assert_eq!(AntennaLayout::for_band(Technology::Nr, Some("unknown")), AntennaLayout::NrFdd4x4);
        assert_eq!(AntennaLayout::for_band(Technology::Nr, None), AntennaLayout::NrFdd4x4);
    }

    #[test]
    fn test_port_maps_are_permutations() {
        for layout in [
            AntennaLayout::Lte,
            AntennaLayout::NrFdd2x2,
            AntennaLayout::NrFdd4x4,
            AntennaLayout::NrTdd,
        ] {
            let mut ports = layout.port_map().to_vec();
            ports.sort_unstable();
            assert_eq!(ports, vec![0, 1, 2, 3], "{layout:?}");
        }
    }

    #[test]
    fn test_nr_tdd_two_readings_pads_to_four() {
        let readings = parse_readings("-90,-32768,-101,-32768");
        let out = assign_physical(readings, Technology::Nr, Some("N77"));
        assert_eq!(out.len(), 4);

        let physical: Vec<Option<u8>> = out.iter().map(|r| r.physical_index).collect();
        assert_eq!(physical, vec![Some(0), Some(1), Some(2), Some(3)]);

        // logical 2 -> port 0, logical 0 -> port 2
        assert_eq!(out[0].value_dbm, Some(-101.0));
        assert_eq!(out[0].logical_index, 2);
        assert_eq!(out[2].value_dbm, Some(-90.0));
        assert_eq!(out[2].logical_index, 0);

        assert!(out[1].not_used && out[3].not_used);
        assert_eq!(out[1].label(), "Not Used");
        assert_eq!(out[1].logical_index, 3);
    }

    #[test]
    fn test_lte_drops_unused_without_placeholders() {
        let readings = parse_readings("-95,-97,-32768,-32768");
        let out = assign_physical(readings, Technology::Lte, Some("B3"));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| !r.not_used));
        assert_eq!(out[0].label(), "-95 dBm");
    }

    #[test]
    fn test_extra_chain_sorts_last() {
        let readings = parse_readings("-90,-91,-92,-93,-94");
        let out = assign_physical(readings, Technology::Nr, Some("N2"));
        assert_eq!(out.len(), 5);
        assert_eq!(out[4].physical_index, None);
        assert_eq!(out[4].logical_index, 4);
        // 4x4 FDD: logical 3 -> port 2
        assert_eq!(out[2].value_dbm, Some(-93.0));
    }
}
