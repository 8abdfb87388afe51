//! Hedge math. Pure functions with no I/O.
//!
//! Sign convention: a long call has positive delta and is offset by a short
//! (negative) perp hedge; a long put has negative delta and is offset by a long
//! (positive) perp hedge.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::OptionType;

/// Which way the perp hedge has to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HedgeDirection {
    /// Move the hedge number up: cover a short or add to a long.
    Buy,
    /// Move the hedge number down: add to a short or sell a long.
    Sell,
}

impl fmt::Display for HedgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeDirection::Buy => f.write_str("BUY"),
            HedgeDirection::Sell => f.write_str("SELL"),
        }
    }
}

/// Outcome of comparing the held hedge with the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RehedgeDecision {
    pub target_hedge: f64,
    pub current_hedge: f64,
    /// `target_hedge - current_hedge`
    pub diff: f64,
    /// `|diff|`, the size of the trade if one is needed.
    pub amount: f64,
    pub needed: bool,
    /// Present only when `needed`.
    pub direction: Option<HedgeDirection>,
}

/// Hedge that neutralizes the option at inception.
///
/// Like `target_hedge`, the side comes from `option_type`: a call is always
/// hedged short and a put always long, whatever sign the entry delta was
/// reported with.
pub fn entry_hedge(size: f64, entry_delta: f64, option_type: OptionType) -> f64 {
    signed_hedge(size * entry_delta.abs(), option_type)
}

/// Hedge that neutralizes the option at an observed delta.
///
/// Operators often report delta magnitudes without a sign, so the sign is
/// re-derived from `option_type` and only `|observed_delta|` is used.
pub fn target_hedge(size: f64, observed_delta: f64, option_type: OptionType) -> f64 {
    signed_hedge(size * observed_delta.abs(), option_type)
}

fn signed_hedge(exposure: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => -exposure,
        OptionType::Put => exposure,
    }
}

/// Perp side a signed hedge represents.
pub fn hedge_side(hedge: f64) -> &'static str {
    if hedge < 0.0 {
        "SHORT"
    } else if hedge > 0.0 {
        "LONG"
    } else {
        "FLAT"
    }
}

/// Band rule: rehedge only when `|target - current| > band` (strict).
pub fn rehedge_decision(current_hedge: f64, target_hedge: f64, band: f64) -> RehedgeDecision {
    let diff = target_hedge - current_hedge;
    let amount = diff.abs();
    let needed = amount > band;
    let direction = needed.then(|| {
        if diff > 0.0 {
            HedgeDirection::Buy
        } else {
            HedgeDirection::Sell
        }
    });

    RehedgeDecision {
        target_hedge,
        current_hedge,
        diff,
        amount,
        needed,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn entry_hedge_call_is_short() {
        let h = entry_hedge(0.1, 0.5, OptionType::Call);
        assert!((h - -0.05).abs() < EPS);
    }

    #[test]
    fn entry_hedge_put_is_long() {
        let h = entry_hedge(0.1, 0.4, OptionType::Put);
        assert!((h - 0.04).abs() < EPS);
    }

    #[test]
    fn entry_hedge_put_with_signed_delta_is_still_long() {
        let h = entry_hedge(0.1, -0.4, OptionType::Put);
        assert!((h - 0.04).abs() < EPS);
    }

    #[test]
    fn target_hedge_ignores_reported_sign() {
        let from_signed = target_hedge(0.2, -0.35, OptionType::Put);
        let from_magnitude = target_hedge(0.2, 0.35, OptionType::Put);
        assert_eq!(from_signed, from_magnitude);
        assert!((from_signed - 0.07).abs() < EPS);

        let call = target_hedge(0.2, -0.35, OptionType::Call);
        assert!((call - -0.07).abs() < EPS);
    }

    #[test]
    fn diff_equal_to_band_does_not_trigger() {
        let d = rehedge_decision(0.0, 0.5, 0.5);
        assert!(!d.needed);
        assert_eq!(d.direction, None);
        assert_eq!(d.amount, 0.5);
    }

    #[test]
    fn diff_just_past_band_triggers() {
        let just_over = f64::from_bits(0.5f64.to_bits() + 1);
        let d = rehedge_decision(0.0, just_over, 0.5);
        assert!(d.needed);
        assert_eq!(d.direction, Some(HedgeDirection::Buy));
    }

    #[test]
    fn side_follows_hedge_sign() {
        assert_eq!(hedge_side(-0.05), "SHORT");
        assert_eq!(hedge_side(0.02), "LONG");
        assert_eq!(hedge_side(0.0), "FLAT");
    }

    #[test]
    fn short_growing_shorter_sells() {
        // Held -0.05, target -0.055: add to the short.
        let d = rehedge_decision(-0.05, -0.055, 0.0038);
        assert!(d.needed);
        assert_eq!(d.direction, Some(HedgeDirection::Sell));
        assert!((d.amount - 0.005).abs() < EPS);
    }

    #[test]
    fn short_shrinking_buys() {
        let d = rehedge_decision(-0.06, -0.05, 0.005);
        assert!(d.needed);
        assert_eq!(d.direction, Some(HedgeDirection::Buy));
        assert!((d.diff - 0.01).abs() < EPS);
    }

    #[test]
    fn long_hedge_growing_buys() {
        let d = rehedge_decision(0.04, 0.06, 0.01);
        assert_eq!(d.direction, Some(HedgeDirection::Buy));
    }

    #[test]
    fn inside_band_keeps_deviation() {
        let d = rehedge_decision(-0.055, -0.052, 0.0038);
        assert!(!d.needed);
        assert!((d.diff - 0.003).abs() < EPS);
        assert!((d.amount - 0.003).abs() < EPS);
    }

    #[test]
    fn direction_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&HedgeDirection::Sell).unwrap(), "\"SELL\"");
    }
}
