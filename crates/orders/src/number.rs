//! Human-readable order numbers: `<PREFIX>-<YYYYMMDD>-<NNNNNN>`.

use chrono::NaiveDate;

pub const DEFAULT_PREFIX: &str = "ORD";

pub fn format_order_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{prefix}-{}-{sequence:06}", date.format("%Y%m%d"))
}

/// Split an order number into its prefix, date and per-day sequence.
pub fn parse_order_number(value: &str) -> Option<(&str, NaiveDate, u32)> {
    let (rest, seq) = value.rsplit_once('-')?;
    let (prefix, date) = rest.rsplit_once('-')?;
    if prefix.is_empty() || seq.len() < 6 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    Some((prefix, date, seq.parse().ok()?))
}
