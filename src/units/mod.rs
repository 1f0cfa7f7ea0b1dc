//! Conversion between human-readable token amounts and base units.

use crate::ledger::Amount;

/// Largest supported `decimals`: 10^38 still fits in a `u128`.
pub const MAX_DECIMALS: u8 = 38;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("too many fractional digits: {digits} > {decimals}")]
    TooPrecise { digits: usize, decimals: u8 },
    #[error("amount overflows u128")]
    Overflow,
    #[error("decimals must be at most 38, got {0}")]
    Decimals(u8),
}

fn scale(decimals: u8) -> Result<Amount, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::Decimals(decimals));
    }
    Ok(10u128.pow(decimals as u32))
}

/// `parse_units("1.5", 18)` is 1.5 * 10^18.
pub fn parse_units(text: &str, decimals: u8) -> Result<Amount, UnitsError> {
    let one = scale(decimals)?;
    let text = text.trim().replace('_', "");
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::Invalid(text.clone()));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(UnitsError::Invalid(text.clone()));
    }
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooPrecise {
            digits: frac.len(),
            decimals,
        });
    }

    let whole_value: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitsError::Overflow)?
    };
    let frac_value: Amount = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| UnitsError::Overflow)?
    };

    whole_value
        .checked_mul(one)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(UnitsError::Overflow)
}

/// Inverse of [`parse_units`]; trailing fractional zeros are dropped.
pub fn format_units(amount: Amount, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    let one = 10u128.pow(decimals as u32);
    let whole = amount / one;
    let frac = amount % one;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETHER: Amount = 1_000_000_000_000_000_000;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_units("100", 18).unwrap(), 100 * ETHER);
        assert_eq!(parse_units("0.5", 18).unwrap(), ETHER / 2);
        assert_eq!(parse_units(".25", 2).unwrap(), 25);
        assert_eq!(parse_units("100_000", 0).unwrap(), 100_000);
        assert_eq!(parse_units("7.", 3).unwrap(), 7_000);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(parse_units("", 18), Err(UnitsError::Empty));
        assert!(matches!(parse_units("1e5", 18), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_units("-1", 18), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_units(".", 18), Err(UnitsError::Invalid(_))));
        assert_eq!(
            parse_units("0.001", 2),
            Err(UnitsError::TooPrecise { digits: 3, decimals: 2 })
        );
        assert_eq!(parse_units("1", 39), Err(UnitsError::Decimals(39)));
    }

    #[test]
    fn detects_overflow() {
        let max = u128::MAX.to_string();
        assert_eq!(parse_units(&max, 0).unwrap(), u128::MAX);
        assert_eq!(parse_units(&max, 1), Err(UnitsError::Overflow));
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(100 * ETHER, 18), "100");
        assert_eq!(format_units(ETHER + ETHER / 4, 18), "1.25");
        assert_eq!(format_units(1, 18), "0.000000000000000001");
        assert_eq!(format_units(42, 0), "42");
    }
}
