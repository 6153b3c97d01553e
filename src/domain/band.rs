//! Risk Bands
//!
//! Ten equal-width deciles of the risk value, `[0.0,0.1) ... [0.9,1.0]`,
//! and the per-band occupancy histogram (days spent in each band).

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::error::ValuationError;

/// Number of decile bands
pub const BAND_COUNT: usize = 10;

/// One decile of the risk range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RiskBand(usize);

impl RiskBand {
    /// Band for a band index (0..=9)
    pub fn new(index: usize) -> Option<Self> {
        (index < BAND_COUNT).then_some(Self(index))
    }

    /// Band containing a risk value. Risk 1.0 belongs to the top band.
    pub fn from_risk(risk: f64) -> Self {
        let clamped = if risk.is_finite() { risk.clamp(0.0, 1.0) } else { 0.0 };
        let index = ((clamped * BAND_COUNT as f64).floor() as usize).min(BAND_COUNT - 1);
        Self(index)
    }

    /// Parse a label like `"0.3-0.4"`
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().find(|band| band.label() == label)
    }

    /// All ten bands, lowest first
    pub fn all() -> impl Iterator<Item = RiskBand> {
        (0..BAND_COUNT).map(RiskBand)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    /// Lower risk edge (inclusive)
    pub fn lower(&self) -> f64 {
        self.0 as f64 / BAND_COUNT as f64
    }

    /// Upper risk edge (exclusive, except for the top band)
    pub fn upper(&self) -> f64 {
        (self.0 + 1) as f64 / BAND_COUNT as f64
    }

    /// Canonical label, e.g. `"0.0-0.1"`
    pub fn label(&self) -> String {
        format!("{:.1}-{:.1}", self.lower(), self.upper())
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for RiskBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// Days an asset has spent in each risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandHistogram {
    days: [u64; BAND_COUNT],
}

impl BandHistogram {
    pub fn new(days: [u64; BAND_COUNT]) -> Self {
        Self { days }
    }

    /// Build from a label -> days mapping. All ten labels must be present.
    pub fn from_labels(map: &BTreeMap<String, u64>) -> Result<Self, ValuationError> {
        let mut days = [0u64; BAND_COUNT];
        for band in RiskBand::all() {
            let label = band.label();
            days[band.index()] = *map.get(&label).ok_or_else(|| {
                ValuationError::invalid(format!("band histogram missing label '{}'", label))
            })?;
        }

        if let Some(unknown) = map.keys().find(|label| RiskBand::from_label(label).is_none()) {
            return Err(ValuationError::invalid(format!(
                "band histogram has unknown label '{}'",
                unknown
            )));
        }

        Ok(Self { days })
    }

    /// Occupancy histogram from a daily risk history, one sample per day.
    /// Non-finite samples are skipped.
    pub fn from_risk_series<I>(daily_risks: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut days = [0u64; BAND_COUNT];
        for risk in daily_risks.into_iter().filter(|r| r.is_finite()) {
            days[RiskBand::from_risk(risk).index()] += 1;
        }
        Self { days }
    }

    pub fn days(&self, band: RiskBand) -> u64 {
        self.days[band.index()]
    }

    /// Raw counts, lowest band first
    pub fn counts(&self) -> &[u64; BAND_COUNT] {
        &self.days
    }

    /// Total tracked lifetime in days
    pub fn total_days(&self) -> u64 {
        self.days.iter().sum()
    }

    /// Label -> days mapping with every label present
    pub fn to_labels(&self) -> BTreeMap<String, u64> {
        RiskBand::all()
            .map(|band| (band.label(), self.days(band)))
            .collect()
    }
}
