//! Amount/currency string normalization, grounded on the original
//! implementation's `common/norm/amounts.py`.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Normalize a raw amount string (as captured by
/// [`crate::extract_amount_currency`]) into a [`Decimal`].
///
/// Per `spec.md` §4.7: strip spaces; if the string has exactly one comma
/// and no dot, treat the comma as the decimal separator; otherwise strip
/// all commas; then strip a trailing "dollars"/"usd" suffix.
#[must_use]
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    let mut s = raw.trim().to_string();

    if s.matches(',').count() == 1 && !s.contains('.') {
        s = s.replace(' ', "").replace(',', ".");
    } else {
        s = s.replace(',', "");
    }

    for word in ["dollars", "usd"] {
        let lower = s.to_ascii_lowercase();
        if lower.ends_with(word) {
            s.truncate(s.len() - word.len());
            s = s.trim().to_string();
        }
    }

    Decimal::from_str(&s).ok()
}

/// Canonicalize a currency hint into an ISO 4217 code, uppercasing and
/// trimming. Unknown codes pass through unchanged so callers can still
/// record what was seen.
#[must_use]
pub fn normalize_currency(curr: Option<&str>) -> Option<String> {
    let c = curr?.trim();
    if c.is_empty() {
        return None;
    }
    Some(c.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn single_comma_treated_as_decimal() {
        assert_eq!(normalize_amount("149,99"), Some(dec!(149.99)));
    }

    #[test]
    fn thousands_commas_stripped() {
        assert_eq!(normalize_amount("1,234.50"), Some(dec!(1234.50)));
    }

    #[test]
    fn strips_trailing_currency_word() {
        assert_eq!(normalize_amount("42.00 usd"), Some(dec!(42.00)));
        assert_eq!(normalize_amount("42.00 dollars"), Some(dec!(42.00)));
    }

    #[test]
    fn invalid_amount_returns_none() {
        assert_eq!(normalize_amount("not a number"), None);
    }
}
