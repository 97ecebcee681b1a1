//! Regex extraction over free-text message bodies and transcripts,
//! grounded on the original implementation's `common/norm/regexes.py`.
//!
//! The order-id pattern there relies on a lookahead assertion
//! (`(?=[A-Z0-9-]{4,}\b)`) that the `regex` crate does not support by
//! design (no backtracking engine). The equivalent here captures the
//! same run and filters candidates by length in code instead, which
//! preserves the original's "at least 4 alnum/dash characters" rule
//! without needing a backtracking regex engine.

use once_cell::sync::Lazy;
use regex::Regex;

/// The result of matching the amount pattern: the raw numeric text and
/// any currency hint found adjacent to it (a code like `"USD"` or a
/// symbol like `"$"`).
#[derive(Debug, Clone, PartialEq)]
pub struct AmountMatch {
    /// The raw amount text, not yet normalized (may contain commas/spaces).
    pub raw: String,
    /// `Some(code_or_symbol)` if a currency marker was found in or near
    /// the match.
    pub currency_hint: Option<String>,
    /// Byte span of the amount match within the searched text, used for
    /// the ±12-char currency-word fallback search.
    pub span: (usize, usize),
}

static ORDER_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:order\s*[:#]?\s*)?#?([A-Z0-9-]*\d[A-Z0-9-]*)\b").unwrap()
});

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<currency_symbol_prefix>[$€£₴])?\s*(?P<amount>\d{1,3}(?:[ ,]\d{3})*(?:[.,]\d{2})?)\s*(?P<currency_code>USD|EUR|GBP|UAH|PLN)?\s*(?P<currency_symbol_suffix>[$€£₴])?",
    )
    .unwrap()
});

static SKU_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:sku|item|product)\s*[:#]\s*([A-Z0-9\-]{3,})").unwrap());

static CURRENCY_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(USD|EUR|GBP|UAH|PLN)\b|[$€£₴]").unwrap());

/// The minimum length (in characters) a captured order-id run must have,
/// mirroring the original's `(?=[A-Z0-9-]{4,}\b)` lookahead.
const MIN_ORDER_ID_LEN: usize = 4;

/// Find the first order-id-shaped token in `text`, scanning left to
/// right (matches `re.search` semantics of the original).
#[must_use]
pub fn extract_order_id(text: &str) -> Option<String> {
    ORDER_ID_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|m| m.as_str().len() >= MIN_ORDER_ID_LEN)
        .map(|m| m.as_str().trim().to_string())
}

fn symbol_to_code(symbol: &str) -> Option<&'static str> {
    match symbol {
        "$" => Some("USD"),
        "€" => Some("EUR"),
        "£" => Some("GBP"),
        "₴" => Some("UAH"),
        _ => None,
    }
}

fn score(text: &str, m: &regex::Match) -> (bool, bool, usize) {
    let matched = m.as_str();
    let has_currency = CURRENCY_WORD_RE.is_match(matched);
    let has_decimal = matched.contains('.') || matched.contains(',');
    let _ = text;
    (has_currency, has_decimal, matched.len())
}

/// Find the amount best matching `(has_currency, has_decimal, length)`
/// among every candidate in `text` (`spec.md` §4.7: "the amount regex
/// selects the best of all matches"), falling back to a ±12-character
/// window search for a bare currency word or symbol near the winning
/// match if the match itself carried no currency marker.
#[must_use]
pub fn extract_amount_currency(text: &str) -> Option<AmountMatch> {
    let best = AMOUNT_RE
        .captures_iter(text)
        .max_by_key(|caps| score(text, &caps.name("amount").expect("amount group always present")))?;

    let amount_match = best.name("amount")?;
    let raw = amount_match.as_str().to_string();
    let span = (amount_match.start(), amount_match.end());

    let symbol = best
        .name("currency_symbol_prefix")
        .or_else(|| best.name("currency_symbol_suffix"))
        .map(|m| m.as_str());
    let code = best.name("currency_code").map(|m| m.as_str().to_uppercase());

    let mut currency_hint = code.or_else(|| symbol.and_then(symbol_to_code).map(str::to_string));

    if currency_hint.is_none() {
        let window_start = span.0.saturating_sub(12);
        let window_end = (span.1 + 12).min(text.len());
        if let (Some(start), Some(end)) = (
            floor_char_boundary(text, window_start),
            ceil_char_boundary(text, window_end),
        ) {
            if let Some(window_match) = CURRENCY_WORD_RE.find(&text[start..end]) {
                let token = window_match.as_str();
                currency_hint = symbol_to_code(token)
                    .map(str::to_string)
                    .or_else(|| Some(token.to_uppercase()));
            }
        }
    }

    Some(AmountMatch {
        raw,
        currency_hint,
        span,
    })
}

/// Find the SKU token in `text`, if any.
#[must_use]
pub fn extract_sku(text: &str) -> Option<String> {
    SKU_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn floor_char_boundary(text: &str, mut idx: usize) -> Option<usize> {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    Some(idx)
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> Option<usize> {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    Some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_order_id_with_hash_prefix() {
        assert_eq!(
            extract_order_id("Regarding order #AB1234, any update?"),
            Some("AB1234".to_string())
        );
    }

    #[test]
    fn rejects_short_alnum_runs() {
        assert_eq!(extract_order_id("see you at 5pm"), None);
    }

    #[test]
    fn amount_prefers_match_with_currency_and_decimal() {
        let found = extract_amount_currency("total 150 then corrected to $149.99").unwrap();
        assert_eq!(found.raw, "149.99");
        assert_eq!(found.currency_hint.as_deref(), Some("USD"));
    }

    #[test]
    fn amount_window_search_finds_nearby_currency_word() {
        let found = extract_amount_currency("amount 200.00 paid in USD").unwrap();
        assert_eq!(found.raw, "200.00");
        assert_eq!(found.currency_hint.as_deref(), Some("USD"));
    }

    #[test]
    fn extracts_sku() {
        assert_eq!(
            extract_sku("product: ABC-123 was damaged"),
            Some("ABC-123".to_string())
        );
    }

    #[test]
    fn spec_example_total_with_dollar_sign() {
        let found = extract_amount_currency("Total: $59.99").unwrap();
        assert_eq!(found.raw, "59.99");
        assert_eq!(found.currency_hint.as_deref(), Some("USD"));
    }

    #[test]
    fn spec_example_thousands_with_hryvnia_symbol() {
        let found = extract_amount_currency("1 234,56 ₴").unwrap();
        assert_eq!(found.raw, "1 234,56");
        assert_eq!(found.currency_hint.as_deref(), Some("UAH"));
    }

    #[test]
    fn spec_example_no_money_present() {
        assert_eq!(extract_amount_currency("no money"), None);
    }

    #[test]
    fn spec_example_order_id_with_hash() {
        assert_eq!(
            extract_order_id("Order #A12345 is delayed"),
            Some("A12345".to_string())
        );
    }

    #[test]
    fn spec_example_order_id_with_dashes() {
        assert_eq!(
            extract_order_id("Your order 1234-5678 has shipped"),
            Some("1234-5678".to_string())
        );
    }

    #[test]
    fn spec_example_no_order_id_present() {
        assert_eq!(extract_order_id("No order id here"), None);
    }
}
