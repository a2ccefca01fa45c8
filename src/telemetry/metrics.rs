//! Signal metric normalization.
//!
//! Raw dBm/dB readings are mapped to 0-100 percentages with fixed linear
//! curves. Any detectable value shows at least 15%; values past the metric's
//! cutoff are a hard 0%. Only RSRP and SINR feed the composite score, RSSI
//! and RSRQ are informational.

use serde::Serialize;

/// Minimum percentage shown for a value that is above the hard-zero cutoff.
const MIN_DETECTABLE_PCT: f64 = 15.0;

/// Radio measurements reported by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Rssi,
    Rsrp,
    Rsrq,
    Sinr,
}

#[derive(Debug, Clone, Copy)]
enum Cutoff {
    AtOrBelow(f64),
    Below(f64),
}

#[derive(Debug, Clone, Copy)]
struct Curve {
    floor: f64,
    ceiling: f64,
    cutoff: Cutoff,
}

impl Metric {
    fn curve(self) -> Curve {
        match self {
            Self::Rssi => Curve {
                floor: -110.0,
                ceiling: -30.0,
                cutoff: Cutoff::AtOrBelow(-110.0),
            },
            Self::Rsrp => Curve {
                floor: -135.0,
                ceiling: -65.0,
                cutoff: Cutoff::Below(-140.0),
            },
            Self::Rsrq => Curve {
                floor: -20.0,
                ceiling: -8.0,
                cutoff: Cutoff::Below(-20.0),
            },
            Self::Sinr => Curve {
                floor: -10.0,
                ceiling: 35.0,
                cutoff: Cutoff::Below(-10.0),
            },
        }
    }
}

/// Raw readings for one carrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalMetrics {
    pub rssi: Option<f64>,
    pub rsrp: Option<f64>,
    pub rsrq: Option<f64>,
    pub sinr: Option<f64>,
}

impl SignalMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Rssi => self.rssi,
            Metric::Rsrp => self.rsrp,
            Metric::Rsrq => self.rsrq,
            Metric::Sinr => self.sinr,
        }
    }

    /// Set `metric` only if it has no value yet.
    pub fn fill(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Rssi => &mut self.rssi,
            Metric::Rsrp => &mut self.rsrp,
            Metric::Rsrq => &mut self.rsrq,
            Metric::Sinr => &mut self.sinr,
        };
        if slot.is_none() {
            *slot = value;
        }
    }
}

/// Percentages computed when a carrier entry is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalQuality {
    pub rssi_pct: Option<u8>,
    pub rsrp_pct: Option<u8>,
    pub rsrq_pct: Option<u8>,
    pub sinr_pct: Option<u8>,
    /// Mean of the RSRP and SINR percentages.
    pub composite: Option<f64>,
}

impl SignalQuality {
    pub fn from_metrics(metrics: &SignalMetrics) -> Self {
        let pct = |m: Metric| metrics.get(m).map(|v| normalize(m, v));
        let rsrp_pct = pct(Metric::Rsrp);
        let sinr_pct = pct(Metric::Sinr);
        Self {
            rssi_pct: pct(Metric::Rssi),
            rsrp_pct,
            rsrq_pct: pct(Metric::Rsrq),
            sinr_pct,
            composite: composite_score(rsrp_pct, sinr_pct),
        }
    }
}

/// Overall quality verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAssessment {
    Excellent,
    Good,
    Fair,
    Poor,
    NoSignal,
    Unknown,
}

impl SignalAssessment {
    /// Classify an overall percentage. `None` means no carrier produced a
    /// score.
    pub fn from_percentage(percentage: Option<u8>) -> Self {
        match percentage {
            Some(p) if p >= 80 => Self::Excellent,
            Some(p) if p >= 60 => Self::Good,
            Some(p) if p >= 40 => Self::Fair,
            Some(_) => Self::Poor,
            None => Self::NoSignal,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::NoSignal => "No Signal",
            Self::Unknown => "Unknown",
        }
    }
}

/// Map a raw reading to a 0-100 percentage.
#[allow(clippy::cast_sign_loss)]
pub fn normalize(metric: Metric, value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    let curve = metric.curve();
    let cut = match curve.cutoff {
        Cutoff::AtOrBelow(limit) => value <= limit,
        Cutoff::Below(limit) => value < limit,
    };
    if cut {
        return 0;
    }
    let linear = (value - curve.floor) / (curve.ceiling - curve.floor) * 100.0;
    let pct = linear.clamp(0.0, 100.0).max(MIN_DETECTABLE_PCT);
    pct.round() as u8
}

/// Per-carrier composite: mean of whichever of RSRP/SINR percentages exist.
pub fn composite_score(rsrp_pct: Option<u8>, sinr_pct: Option<u8>) -> Option<f64> {
    match (rsrp_pct, sinr_pct) {
        (Some(r), Some(s)) => Some((f64::from(r) + f64::from(s)) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(f64::from(v)),
        (None, None) => None,
    }
}

/// Overall percentage: mean of per-carrier composites, rounded.
pub fn overall_percentage<I>(composites: I) -> Option<u8>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = composites
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), c| (sum + c, count + 1));
    if count == 0 {
        return None;
    }
    let mean = (sum / f64::from(count)).clamp(0.0, 100.0);
    #[allow(clippy::cast_sign_loss)]
    let rounded = mean.round() as u8;
    Some(rounded)
}
