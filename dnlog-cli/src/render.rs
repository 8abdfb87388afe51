//! Plain-text output: position tables, details and rehedge decisions.

use std::io::{self, Write};

use chrono::NaiveDateTime;
use dnlog_core::{
    hedge_side, ArchivedPosition, HedgeDirection, Listing, NewPosition, Observation, Position,
    StoreHealth,
};

const RULE: &str = "----------------------------------------";

fn stamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Warn when a listing came from a store that could not be read.
pub fn health_warning<W: Write>(out: &mut W, what: &str, health: &StoreHealth) -> io::Result<()> {
    if let StoreHealth::Unreadable(reason) = health {
        writeln!(out, "WARNING: {what} store is {}: {reason}", health.describe())?;
        writeln!(out, "         It will be set aside (not deleted) on the next save.")?;
    }
    Ok(())
}

pub fn positions<W: Write>(out: &mut W, listing: &Listing<Position>) -> io::Result<()> {
    health_warning(out, "active", &listing.health)?;
    if listing.is_empty() {
        return writeln!(out, "No active positions.");
    }

    writeln!(
        out,
        "{:<3} {:<18} {:<20} {:>8} {:>8} {:>11} {:>6} {:>8} {:>4}",
        "#", "ID", "CONTRACT", "SIZE", "BAND", "HEDGE", "SIDE", "LAST D", "RH"
    )?;
    for (i, p) in listing.items.iter().enumerate() {
        writeln!(
            out,
            "{:<3} {:<18} {:<20} {:>8.4} {:>8.5} {:>+11.5} {:>6} {:>8.4} {:>4}",
            i + 1,
            p.id.as_str(),
            p.contract_name,
            p.size,
            p.band,
            p.current_hedge,
            p.hedge_side(),
            p.last_delta,
            p.rehedge_count
        )?;
    }
    Ok(())
}

pub fn history<W: Write>(out: &mut W, listing: &Listing<ArchivedPosition>) -> io::Result<()> {
    health_warning(out, "history", &listing.health)?;
    if listing.is_empty() {
        return writeln!(out, "No closed positions.");
    }

    writeln!(
        out,
        "{:<18} {:<20} {:<16} {:<16} {:>11} {:>4}",
        "ID", "CONTRACT", "OPENED", "CLOSED", "FINAL HEDGE", "RH"
    )?;
    for a in &listing.items {
        let p = &a.position;
        writeln!(
            out,
            "{:<18} {:<20} {:<16} {:<16} {:>+11.5} {:>4}",
            p.id.as_str(),
            p.contract_name,
            stamp(&p.created_at),
            stamp(&a.closed_at),
            p.current_hedge,
            p.rehedge_count
        )?;
    }
    Ok(())
}

pub fn detail<W: Write>(out: &mut W, p: &Position) -> io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "{} ({})  id {}",
        p.contract_name,
        p.option_type.as_str().to_uppercase(),
        p.id
    )?;
    writeln!(out, "  Strike: {:.0} | Size: {} | Expiry: {}", p.strike, p.size, p.expiry)?;
    writeln!(out, "  Entry delta: {:.4} | Band: {}", p.entry_delta, p.band)?;
    writeln!(out, "  Current hedge: {:+.5} ({})", p.current_hedge, p.hedge_side())?;
    writeln!(
        out,
        "  Last delta: {:.4} | Net exposure: {:+.5} | Rehedges: {}",
        p.last_delta,
        p.net_exposure(),
        p.rehedge_count
    )?;
    writeln!(
        out,
        "  Exchange symbol: {}",
        p.exchange_symbol.as_deref().unwrap_or("n/a")
    )?;
    writeln!(out, "{RULE}")
}

/// The perp trade to place before a new position is recorded.
pub fn starting_hedge<W: Write>(out: &mut W, intent: &NewPosition) -> io::Result<()> {
    let hedge = intent.starting_hedge();
    writeln!(out, "{RULE}")?;
    writeln!(out, "Starting hedge")?;
    writeln!(
        out,
        "  You are long {}. Option exposure: {:.4}",
        intent.option_type.as_str().to_uppercase(),
        hedge.abs()
    )?;
    writeln!(out, "  ACTION: open {} perp position of {:.4}", hedge_side(hedge), hedge.abs())?;
    writeln!(out, "{RULE}")
}

pub fn decision<W: Write>(out: &mut W, band: f64, obs: &Observation) -> io::Result<()> {
    let d = &obs.decision;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Observed delta: {:.4}", obs.observed_delta)?;
    writeln!(out, "Target hedge:   {:+.5}", d.target_hedge)?;
    writeln!(out, "Current hedge:  {:+.5}", d.current_hedge)?;
    writeln!(out, "Deviation:      {:+.5}", d.diff)?;
    writeln!(out, "{RULE}")?;

    match d.direction {
        Some(direction) => {
            let reason = match direction {
                HedgeDirection::Buy => "cover short or add to long",
                HedgeDirection::Sell => "add to short or reduce long",
            };
            writeln!(out, "REHEDGE NEEDED: deviation {:.5} > band {band}", d.amount)?;
            writeln!(out, "  EXECUTE: {direction} {:.4} ({reason})", d.amount)
        }
        None => writeln!(out, "SAFE: inside the band, do nothing."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dnlog_core::{rehedge_decision, OptionType, PositionId};

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn unreadable_store_is_called_out() {
        let listing: Listing<Position> = Listing::unreadable("expected value at line 1");
        let text = render(|out| positions(out, &listing));
        assert!(text.contains("WARNING: active store is unreadable"));
        assert!(text.contains("No active positions."));
    }

    #[test]
    fn missing_store_is_not_a_warning() {
        let listing: Listing<ArchivedPosition> = Listing::missing();
        let text = render(|out| history(out, &listing));
        assert!(!text.contains("WARNING"));
        assert!(text.contains("No closed positions."));
    }

    #[test]
    fn decision_shows_trade_when_needed() {
        let obs = Observation {
            id: PositionId::new("20260210-090000"),
            observed_delta: 0.55,
            decision: rehedge_decision(-0.05, -0.055, 0.0038),
            observed_at: ts(),
        };
        let text = render(|out| decision(out, 0.0038, &obs));
        assert!(text.contains("REHEDGE NEEDED"));
        assert!(text.contains("EXECUTE: SELL 0.0050"));
    }

    #[test]
    fn decision_inside_band_is_safe() {
        let obs = Observation {
            id: PositionId::new("20260210-090000"),
            observed_delta: 0.52,
            decision: rehedge_decision(-0.055, -0.052, 0.0038),
            observed_at: ts(),
        };
        let text = render(|out| decision(out, 0.0038, &obs));
        assert!(text.contains("SAFE"));
        assert!(!text.contains("EXECUTE"));
    }

    #[test]
    fn starting_hedge_for_put_is_long() {
        let intent = NewPosition {
            expiry: "27FEB".into(),
            option_type: OptionType::Put,
            strike: 60_000.0,
            size: 0.2,
            entry_delta: 0.3,
            band: 0.005,
        };
        let text = render(|out| starting_hedge(out, &intent));
        assert!(text.contains("open LONG perp position of 0.0600"));
    }
}
