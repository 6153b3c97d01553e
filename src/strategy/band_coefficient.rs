//! Band Coefficient Calculator
//!
//! Derives a rarity weight per risk decile from the band occupancy histogram.
//! The most-occupied band gets the minimum weight (1.0), the rarest band the
//! maximum (1.6), and everything else is interpolated linearly on day count:
//!
//! coefficient = max - (d - days_min) / (days_max - days_min) * (max - min)
//!
//! A histogram with no spread (all counts equal, including no history at all)
//! yields the minimum weight for every band.

use serde::Serialize;

use crate::domain::{BandHistogram, RiskBand, BAND_COUNT};
use crate::strategy::params::BandConfig;

/// Rarity weight per band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandCoefficients {
    values: [f64; BAND_COUNT],
}

impl BandCoefficients {
    pub fn get(&self, band: RiskBand) -> f64 {
        self.values[band.index()]
    }

    /// Coefficient of the band containing `risk`
    pub fn for_risk(&self, risk: f64) -> f64 {
        self.get(RiskBand::from_risk(risk))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskBand, f64)> + '_ {
        RiskBand::all().map(move |band| (band, self.get(band)))
    }
}

/// Histogram -> rarity weights
#[derive(Debug, Clone, Default)]
pub struct BandCoefficientCalculator {
    config: BandConfig,
}

impl BandCoefficientCalculator {
    pub fn new(config: BandConfig) -> Self {
        Self { config }
    }

    pub fn coefficients(&self, histogram: &BandHistogram) -> BandCoefficients {
        let counts = histogram.counts();
        let days_max = counts.iter().copied().max().unwrap_or(0);
        let days_min = counts.iter().copied().min().unwrap_or(0);

        if days_max == days_min {
            return BandCoefficients {
                values: [self.config.min_coefficient; BAND_COUNT],
            };
        }

        let spread = (days_max - days_min) as f64;
        let mut values = [self.config.min_coefficient; BAND_COUNT];
        for (value, &days) in values.iter_mut().zip(counts.iter()) {
            *value = if days == days_max {
                self.config.min_coefficient
            } else if days == days_min {
                self.config.max_coefficient
            } else {
                let fraction = (days - days_min) as f64 / spread;
                (self.config.max_coefficient - fraction * self.config.span())
                    .clamp(self.config.min_coefficient, self.config.max_coefficient)
            };
        }

        BandCoefficients { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn calculator() -> BandCoefficientCalculator {
        BandCoefficientCalculator::default()
    }

    fn band(index: usize) -> RiskBand {
        RiskBand::new(index).unwrap()
    }

    #[test]
    fn test_equal_counts_all_one() {
        let coefficients = calculator().coefficients(&BandHistogram::new([42; BAND_COUNT]));
        assert!(coefficients.iter().all(|(_, c)| c == 1.0));

        // No history at all
        let coefficients = calculator().coefficients(&BandHistogram::default());
        assert!(coefficients.iter().all(|(_, c)| c == 1.0));
    }

    #[test]
    fn test_unique_min_and_max_exact() {
        let histogram = BandHistogram::new([10, 20, 30, 40, 50, 60, 70, 80, 90, 5]);
        let coefficients = calculator().coefficients(&histogram);

        assert_eq!(coefficients.get(band(9)), 1.6);
        assert_eq!(coefficients.get(band(8)), 1.0);
        // 50 days: (50 - 5) / (90 - 5) of the way from rare to common
        assert_relative_eq!(
            coefficients.get(band(4)),
            1.6 - 45.0 / 85.0 * 0.6,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sparse_history_scenario() {
        let mut map: BTreeMap<String, u64> = RiskBand::all().map(|b| (b.label(), 0)).collect();
        map.insert("0.0-0.1".to_string(), 61);
        map.insert("0.5-0.6".to_string(), 158);
        map.insert("0.9-1.0".to_string(), 126);
        let histogram = BandHistogram::from_labels(&map).unwrap();

        let coefficients = calculator().coefficients(&histogram);

        assert_eq!(coefficients.get(band(5)), 1.0);
        for index in [1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(coefficients.get(band(index)), 1.6);
        }
        assert_relative_eq!(coefficients.get(band(0)), 1.6 - 61.0 / 158.0 * 0.6, epsilon = 1e-12);
        assert_relative_eq!(coefficients.get(band(9)), 1.6 - 126.0 / 158.0 * 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_ties_share_boundary_value() {
        let histogram = BandHistogram::new([100, 100, 3, 3, 50, 50, 50, 50, 50, 50]);
        let coefficients = calculator().coefficients(&histogram);

        assert_eq!(coefficients.get(band(0)), 1.0);
        assert_eq!(coefficients.get(band(1)), 1.0);
        assert_eq!(coefficients.get(band(2)), 1.6);
        assert_eq!(coefficients.get(band(3)), 1.6);
    }

    #[test]
    fn test_coefficients_within_range() {
        let histogram = BandHistogram::new([7, 300, 12, 0, 45, 45, 199, 2, 88, 150]);
        let coefficients = calculator().coefficients(&histogram);
        assert!(coefficients.iter().all(|(_, c)| (1.0..=1.6).contains(&c)));
    }

    #[test]
    fn test_for_risk_uses_band() {
        let histogram = BandHistogram::new([0, 0, 0, 0, 0, 158, 0, 0, 0, 0]);
        let coefficients = calculator().coefficients(&histogram);
        assert_eq!(coefficients.for_risk(0.55), 1.0);
        assert_eq!(coefficients.for_risk(0.95), 1.6);
    }

    #[test]
    fn test_custom_range() {
        let calc = BandCoefficientCalculator::new(BandConfig {
            min_coefficient: 1.0,
            max_coefficient: 2.0,
        });
        let coefficients = calc.coefficients(&BandHistogram::new([0, 10, 10, 10, 10, 10, 10, 10, 10, 5]));
        assert_eq!(coefficients.get(band(0)), 2.0);
        assert_relative_eq!(coefficients.get(band(9)), 1.5, epsilon = 1e-12);
    }
}
