//! Contract naming.
//!
//! Display names keep the operator's expiry label (`BTC-27FEB-70000-C`);
//! exchange symbols use the numeric `YYMMDD` form Binance options expect
//! (`BTC-260227-70000-C`).

use chrono::{Datelike, NaiveDate};

use super::position::OptionType;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Trim and uppercase an expiry label.
pub fn normalize_expiry(expiry: &str) -> String {
    expiry.trim().to_uppercase()
}

/// Display label, e.g. `BTC-27FEB-70000-C`. The strike is truncated to an integer.
pub fn contract_name(
    underlying: &str,
    expiry: &str,
    strike: f64,
    option_type: OptionType,
) -> String {
    format!(
        "{}-{}-{}-{}",
        underlying.to_uppercase(),
        normalize_expiry(expiry),
        strike.trunc() as i64,
        option_type.suffix()
    )
}

/// Exchange ticker, e.g. `BTC-260227-70000-C`.
///
/// Accepts expiry labels of the form `D{1,2}MMM[YY]`. Without a year the
/// earliest matching date on or after `today` is used. Returns `None` when the
/// label cannot be resolved to a calendar date.
pub fn exchange_symbol(
    underlying: &str,
    expiry: &str,
    strike: f64,
    option_type: OptionType,
    today: NaiveDate,
) -> Option<String> {
    let date = resolve_expiry(expiry, today)?;
    Some(format!(
        "{}-{}-{}-{}",
        underlying.to_uppercase(),
        date.format("%y%m%d"),
        strike.trunc() as i64,
        option_type.suffix()
    ))
}

/// Resolve an expiry label to a calendar date.
pub fn resolve_expiry(expiry: &str, today: NaiveDate) -> Option<NaiveDate> {
    let label = normalize_expiry(expiry);
    let day_len = label.chars().take_while(|c| c.is_ascii_digit()).count();
    if !(1..=2).contains(&day_len) || label.len() < day_len + 3 {
        return None;
    }

    let day: u32 = label[..day_len].parse().ok()?;
    let month_str = label.get(day_len..day_len + 3)?;
    let month = MONTHS.iter().position(|m| *m == month_str)? as u32 + 1;
    let rest = &label[day_len + 3..];

    match rest.len() {
        0 => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(d) if d >= today => Some(d),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
        2 if rest.chars().all(|c| c.is_ascii_digit()) => {
            let yy: i32 = rest.parse().ok()?;
            NaiveDate::from_ymd_opt(2000 + yy, month, day)
        }
        _ => None,
    }
}
