//! Helpers for comparing the decimal-string numeric fields the data model
//! carries (values up to 256 bits wide, too large for native integer
//! comparison without risking truncation).

use num_bigint::BigUint;
use std::str::FromStr;

use crate::error::{IndexError, Result};

/// Parses a decimal string into a [`BigUint`], rejecting anything that is
/// not a plain non-negative decimal integer.
pub fn parse_decimal(s: &str) -> Result<BigUint> {
    BigUint::from_str(s).map_err(|_| IndexError::InvalidInput(format!("not a decimal integer: {s}")))
}

/// True if `value` (a decimal string) falls within the closed range
/// `[lo, hi]`, also given as decimal strings.
pub fn in_decimal_range(value: &str, lo: &str, hi: &str) -> Result<bool> {
    let v = parse_decimal(value)?;
    let lo = parse_decimal(lo)?;
    let hi = parse_decimal(hi)?;
    Ok(v >= lo && v <= hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_beyond_u64_range() {
        let huge = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert!(in_decimal_range(huge, "0", huge).unwrap());
        assert!(!in_decimal_range(huge, "0", "1").unwrap());
    }

    #[test]
    fn rejects_non_decimal() {
        assert!(parse_decimal("0xabc").is_err());
        assert!(parse_decimal("-5").is_err());
    }
}
