//! Unit Conversion Utilities
//!
//! Helpers for base-asset unit conversions and formatting.

/// Base units per whole token (18 decimals)
pub const UNIT_SCALE: u128 = 1_000_000_000_000_000_000;

/// Decimals of the base asset
pub const BASE_DECIMALS: u32 = 18;

/// Seconds in one accrual day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Format base units as a decimal token string (e.g., "1.5")
pub fn units_to_display(units: u128) -> String {
    let whole = units / UNIT_SCALE;
    let frac = units % UNIT_SCALE;

    if frac == 0 {
        return format_with_commas(whole);
    }

    let frac_str = format!("{:0width$}", frac, width = BASE_DECIMALS as usize);
    format!("{}.{}", format_with_commas(whole), frac_str.trim_end_matches('0'))
}

/// Format number with thousands separators
fn format_with_commas(n: u128) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Parse a decimal token amount (e.g., "1.25") into base units
pub fn parse_units(s: &str) -> Option<u128> {
    let s = s.trim().replace(['_', ','], "");
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };

    if frac.len() > BASE_DECIMALS as usize || (whole.is_empty() && frac.is_empty()) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = BASE_DECIMALS as usize);
        padded.parse().ok()?
    };

    whole.checked_mul(UNIT_SCALE)?.checked_add(frac_units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_to_display() {
        assert_eq!(units_to_display(0), "0");
        assert_eq!(units_to_display(UNIT_SCALE), "1");
        assert_eq!(units_to_display(UNIT_SCALE / 2), "0.5");
        assert_eq!(units_to_display(1_234 * UNIT_SCALE), "1,234");
        assert_eq!(units_to_display(1), "0.000000000000000001");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1"), Some(UNIT_SCALE));
        assert_eq!(parse_units("0.5"), Some(UNIT_SCALE / 2));
        assert_eq!(parse_units("1_000"), Some(1_000 * UNIT_SCALE));
        assert_eq!(parse_units(".25"), Some(UNIT_SCALE / 4));
        assert_eq!(parse_units("0.0000000000000000001"), None);
        assert_eq!(parse_units("abc"), None);
        assert_eq!(parse_units(""), None);
    }
}
