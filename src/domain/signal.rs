use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk zone a value falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Low,
    Medium,
    High,
}

impl Zone {
    /// Directional bias implied by the zone
    pub fn bias(&self) -> Bias {
        match self {
            Zone::Low => Bias::Long,
            Zone::Medium => Bias::Neutral,
            Zone::High => Bias::Short,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Low => write!(f, "low"),
            Zone::Medium => write!(f, "medium"),
            Zone::High => write!(f, "high"),
        }
    }
}

/// Directional bias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Long,
    Neutral,
    Short,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Long => write!(f, "long"),
            Bias::Neutral => write!(f, "neutral"),
            Bias::Short => write!(f, "short"),
        }
    }
}

/// Classified trading signal for one risk value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub zone: Zone,
    pub bias: Bias,
    /// Blend of cheapness and rarity, 0-100
    pub composite_score: u8,
    /// Estimated win rate, 0.0-1.0
    pub win_rate_estimate: f64,
}

impl Signal {
    /// Validates the signal meets basic criteria
    pub fn validate(&self) -> Result<(), String> {
        if self.win_rate_estimate.is_nan()
            || self.win_rate_estimate < 0.0
            || self.win_rate_estimate > 1.0
        {
            return Err(format!("Invalid win rate: {}", self.win_rate_estimate));
        }
        if self.composite_score > 100 {
            return Err(format!("Invalid composite score: {}", self.composite_score));
        }
        if self.zone.bias() != self.bias {
            return Err(format!("Bias {} does not match zone {}", self.bias, self.zone));
        }
        Ok(())
    }
}
