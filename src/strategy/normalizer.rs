//! Price Normalizer
//!
//! Maps a market price to a risk value in [0,1] using the symbol's
//! calibration method.
//!
//! - LOG_BOUNDS: risk = (ln p - ln min) / (ln max - ln min), clamped
//! - GRID: linear interpolation between the bracketing grid points
//! - POLYNOMIAL: bounded numeric root search on price(r) - p over [0,1]
//!
//! The polynomial search first splits [0,1] at the curve's critical points
//! (roots of the derivative, found the same way one degree down), so each
//! piece is monotonic and holds at most one root. A dip narrower than any
//! fixed sampling step is still bracketed.
//!
//! A quartic is not guaranteed monotonic on [0,1], so a price can have several
//! roots. The tie-break is deterministic: the root closest to a prior risk for
//! the symbol if one is known, else the smallest root.

use std::cmp::Ordering;

use crate::domain::{
    CalibrationModel, PriceBounds, PriceGrid, QuarticCoefficients, SymbolCalibration,
    ValuationError,
};
use crate::strategy::params::NormalizerConfig;

/// Price -> risk mapper
#[derive(Debug, Clone, Default)]
pub struct PriceNormalizer {
    config: NormalizerConfig,
}

impl PriceNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Convert `price` to a risk value under `calibration`.
    ///
    /// `prior_risk` is only consulted for polynomial calibrations with more
    /// than one matching root.
    pub fn price_to_risk(
        &self,
        calibration: &SymbolCalibration,
        price: f64,
        prior_risk: Option<f64>,
    ) -> Result<f64, ValuationError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ValuationError::invalid(format!(
                "price must be finite and > 0, got {}",
                price
            )));
        }

        match calibration.model() {
            CalibrationModel::LogBounds(bounds) => Ok(log_bounds_risk(bounds, price)),
            CalibrationModel::Grid(grid) => Ok(grid_risk(grid, price)),
            CalibrationModel::Polynomial(poly) => self.polynomial_risk(poly, price, prior_risk),
        }
    }

    fn polynomial_risk(
        &self,
        poly: &QuarticCoefficients,
        price: f64,
        prior_risk: Option<f64>,
    ) -> Result<f64, ValuationError> {
        let breaks = monotonic_breaks(poly);
        let (lowest, highest) = breaks
            .iter()
            .map(|&r| poly.evaluate(r))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            });
        let tolerance = self.config.tolerance * price;

        if price < lowest - tolerance || price > highest + tolerance {
            let risk = if price < lowest { 0.0 } else { 1.0 };
            tracing::debug!(
                price,
                lowest,
                highest,
                risk,
                "Polynomial price outside curve range, clamped"
            );
            return Ok(risk);
        }

        let roots = self.roots_between(poly, price, &breaks)?;

        let chosen = match prior_risk.filter(|p| p.is_finite()) {
            Some(prior) => roots.iter().copied().min_by(|a, b| {
                (a - prior)
                    .abs()
                    .partial_cmp(&(b - prior).abs())
                    .unwrap_or(Ordering::Equal)
            }),
            None => roots.first().copied(),
        };

        if roots.len() > 1 {
            tracing::debug!(
                price,
                ?roots,
                ?prior_risk,
                ?chosen,
                "Non-monotonic polynomial: multiple roots"
            );
        }

        chosen.ok_or(ValuationError::NumericNonConvergence {
            iterations: self.config.max_iterations,
            target: price,
        })
    }

    /// All risks in [0,1] where price(r) matches `price` within tolerance,
    /// in ascending order.
    pub fn polynomial_roots(
        &self,
        poly: &QuarticCoefficients,
        price: f64,
    ) -> Result<Vec<f64>, ValuationError> {
        self.roots_between(poly, price, &monotonic_breaks(poly))
    }

    /// Bisect the residual on each monotonic piece between consecutive breaks
    fn roots_between(
        &self,
        poly: &QuarticCoefficients,
        price: f64,
        breaks: &[f64],
    ) -> Result<Vec<f64>, ValuationError> {
        let tolerance = self.config.tolerance * price.abs();
        let residual = |r: f64| poly.evaluate(r) - price;

        let mut roots = Vec::new();

        for piece in breaks.windows(2) {
            let (lo, hi) = (piece[0], piece[1]);
            let (f_lo, f_hi) = (residual(lo), residual(hi));

            if f_lo.abs() <= tolerance {
                push_root(&mut roots, lo);
            } else if f_hi.abs() > tolerance && f_lo.signum() != f_hi.signum() {
                let root = self.bisect(&residual, lo, hi, f_lo, tolerance, price)?;
                push_root(&mut roots, root);
            }
            if f_hi.abs() <= tolerance {
                push_root(&mut roots, hi);
            }
        }

        Ok(roots)
    }

    fn bisect<F>(
        &self,
        residual: &F,
        mut lo: f64,
        mut hi: f64,
        mut f_lo: f64,
        tolerance: f64,
        target: f64,
    ) -> Result<f64, ValuationError>
    where
        F: Fn(f64) -> f64,
    {
        for _ in 0..self.config.max_iterations {
            let mid = 0.5 * (lo + hi);
            let f_mid = residual(mid);
            if f_mid.abs() <= tolerance {
                return Ok(mid);
            }
            if f_mid.signum() == f_lo.signum() {
                lo = mid;
                f_lo = f_mid;
            } else {
                hi = mid;
            }
        }

        Err(ValuationError::NumericNonConvergence {
            iterations: self.config.max_iterations,
            target,
        })
    }
}

/// Roots closer than this are the same root reached from both sides of a break
const ROOT_SEPARATION: f64 = 1e-9;

/// Bisection cap for critical points; halving [0,1] this often reaches f64 resolution
const CRITICAL_POINT_ITERATIONS: usize = 128;

/// 0, every critical point of price(r) inside (0,1), and 1, ascending.
/// The curve is monotonic between consecutive entries.
fn monotonic_breaks(poly: &QuarticCoefficients) -> Vec<f64> {
    let derivative = derivative(&poly.as_array());
    let mut breaks = vec![0.0];
    breaks.extend(unit_roots(&derivative).into_iter().filter(|&r| r > 0.0 && r < 1.0));
    breaks.push(1.0);
    breaks
}

/// Coefficients of the derivative, highest degree first
fn derivative(coefficients: &[f64]) -> Vec<f64> {
    let degree = coefficients.len().saturating_sub(1);
    coefficients[..degree]
        .iter()
        .enumerate()
        .map(|(i, c)| c * (degree - i) as f64)
        .collect()
}

/// Append `r` unless it repeats the previous root
fn push_root(roots: &mut Vec<f64>, r: f64) {
    if roots.last().map_or(true, |&last| r - last > ROOT_SEPARATION) {
        roots.push(r);
    }
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

/// Real roots on [0,1] of a polynomial (highest degree first), ascending.
///
/// Recurses on the derivative so every interval searched is monotonic, which
/// makes a sign change at its ends the only way it can hold a root.
fn unit_roots(coefficients: &[f64]) -> Vec<f64> {
    let first = coefficients.iter().position(|c| *c != 0.0);
    let coefficients = match first {
        Some(i) => &coefficients[i..],
        None => return Vec::new(),
    };

    match coefficients.len() {
        0 | 1 => Vec::new(),
        2 => {
            let r = -coefficients[1] / coefficients[0];
            if (0.0..=1.0).contains(&r) {
                vec![r]
            } else {
                Vec::new()
            }
        }
        _ => {
            let mut breaks = vec![0.0];
            breaks.extend(
                unit_roots(&derivative(coefficients))
                    .into_iter()
                    .filter(|&r| r > 0.0 && r < 1.0),
            );
            breaks.push(1.0);

            let mut roots = Vec::new();
            for piece in breaks.windows(2) {
                let (mut lo, mut hi) = (piece[0], piece[1]);
                let mut f_lo = horner(coefficients, lo);
                let f_hi = horner(coefficients, hi);

                let root = if f_lo == 0.0 {
                    Some(lo)
                } else if f_hi == 0.0 {
                    Some(hi)
                } else if f_lo.signum() != f_hi.signum() {
                    for _ in 0..CRITICAL_POINT_ITERATIONS {
                        let mid = 0.5 * (lo + hi);
                        if mid <= lo || mid >= hi {
                            break;
                        }
                        let f_mid = horner(coefficients, mid);
                        if f_mid == 0.0 {
                            lo = mid;
                            hi = mid;
                            break;
                        }
                        if f_mid.signum() == f_lo.signum() {
                            lo = mid;
                            f_lo = f_mid;
                        } else {
                            hi = mid;
                        }
                    }
                    Some(0.5 * (lo + hi))
                } else {
                    None
                };

                if let Some(r) = root {
                    push_root(&mut roots, r);
                }
            }
            roots
        }
    }
}

/// Logarithmic normalization. Exact 0 at or below min, exact 1 at or above max.
pub fn log_bounds_risk(bounds: &PriceBounds, price: f64) -> f64 {
    if price <= bounds.min_price {
        return 0.0;
    }
    if price >= bounds.max_price {
        return 1.0;
    }
    ((price.ln() - bounds.min_price.ln()) / bounds.log_span()).clamp(0.0, 1.0)
}

/// Grid interpolation. Exact grid prices return the stored risk; duplicate
/// prices resolve to the lowest index.
pub fn grid_risk(grid: &PriceGrid, price: f64) -> f64 {
    let points = grid.points();
    let idx = points.partition_point(|p| p.price < price);

    if idx == points.len() {
        return 1.0;
    }
    if points[idx].price == price {
        return points[idx].risk;
    }
    if idx == 0 {
        return 0.0;
    }

    let lo = points[idx - 1];
    let hi = points[idx];
    lo.risk + (price - lo.price) / (hi.price - lo.price) * (hi.risk - lo.risk)
}
