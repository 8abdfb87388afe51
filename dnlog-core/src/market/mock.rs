//! Moneyness mock for running without exchange access.
//!
//! Estimates delta from spot/strike with a piecewise-linear rule. Good enough
//! to exercise the rehedge flow; not a pricing model.

use super::{DeltaSource, MarketError};

#[derive(Debug, Clone)]
pub struct MockDeltaSource {
    spot: f64,
}

impl MockDeltaSource {
    pub fn new(spot: f64) -> Self {
        Self { spot }
    }

    /// Delta estimate for a strike and right, reported as a magnitude.
    pub fn estimate(&self, strike: f64, is_call: bool) -> f64 {
        let moneyness = self.spot / strike;
        let delta = if is_call {
            if moneyness > 1.05 {
                0.70 + (moneyness - 1.05) * 0.5
            } else if moneyness > 0.95 {
                0.50 + (moneyness - 1.0) * 2.0
            } else {
                0.30 + (moneyness - 0.9) * 2.0
            }
        } else if moneyness < 0.95 {
            0.70 + (1.0 - moneyness) * 0.5
        } else if moneyness > 1.05 {
            0.30 - (moneyness - 1.0) * 0.5
        } else {
            0.50 - (moneyness - 1.0) * 2.0
        };
        delta.clamp(0.0, 1.0)
    }
}

impl Default for MockDeltaSource {
    fn default() -> Self {
        Self::new(67_000.0)
    }
}

/// Strike and right from the tail of a symbol (`...-70000-C`).
fn parse_tail(symbol: &str) -> Option<(f64, bool)> {
    let mut parts = symbol.rsplit('-');
    let is_call = match parts.next()? {
        "C" => true,
        "P" => false,
        _ => return None,
    };
    let strike: f64 = parts.next()?.parse().ok()?;
    (strike > 0.0).then_some((strike, is_call))
}

impl DeltaSource for MockDeltaSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_delta(&self, symbol: &str) -> Result<f64, MarketError> {
        Ok(match parse_tail(symbol) {
            Some((strike, is_call)) => self.estimate(strike, is_call),
            None => 0.5,
        })
    }
}
