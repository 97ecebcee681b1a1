//! The pure field merger (C7), grounded on the original implementation's
//! `common/norm/merger.py`. Combines a DocQA result with regex
//! extraction over the message body and transcript, field by field, by
//! confidence.

use enrich_core::{DocFields, FieldSource, NormalizedFields};

use crate::amounts::{normalize_amount, normalize_currency};
use crate::dates::parse_date_eu;
use crate::regexes::{extract_amount_currency, extract_order_id, extract_sku};

const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Merge `doc_fields` with whatever can be extracted from `body_text`
/// and `transcript`, per field, by the confidence policy in `spec.md`
/// §4.7. Pure: no I/O, no randomness, no clock reads.
#[must_use]
pub fn merge(
    doc_fields: &DocFields,
    body_text: Option<&str>,
    transcript: Option<&str>,
) -> NormalizedFields {
    let mut source = std::collections::BTreeMap::new();
    let body = body_text.unwrap_or("");
    let transcript = transcript.unwrap_or("");

    let order_id = merge_order_id(doc_fields, body, transcript, &mut source);
    let (amount, currency) = merge_amount_currency(doc_fields, body, transcript, &mut source);
    let order_date = merge_order_date(doc_fields, body, transcript, &mut source);
    let sku = merge_sku(doc_fields, body, transcript, &mut source);

    NormalizedFields {
        order_id,
        amount,
        currency,
        order_date,
        sku,
        source,
    }
}

fn confidence_of(doc_fields: &DocFields, field: &str) -> f64 {
    doc_fields.confidence.get(field).copied().unwrap_or(0.0)
}

fn merge_order_id(
    doc_fields: &DocFields,
    body: &str,
    transcript: &str,
    source: &mut std::collections::BTreeMap<String, FieldSource>,
) -> Option<String> {
    let mut order_id = doc_fields.order_id.clone();
    let order_conf = confidence_of(doc_fields, "order_id");

    if order_id.is_none() || order_conf < CONFIDENCE_THRESHOLD {
        let text = format!("{body} {transcript}");
        if let Some(regex_id) = extract_order_id(&text) {
            order_id = Some(regex_id);
            source.insert("order_id".to_string(), FieldSource::Regex);
        }
    }
    if order_id.is_some() && !source.contains_key("order_id") {
        source.insert("order_id".to_string(), FieldSource::Docqa);
    }
    order_id
}

fn merge_amount_currency(
    doc_fields: &DocFields,
    body: &str,
    transcript: &str,
    source: &mut std::collections::BTreeMap<String, FieldSource>,
) -> (Option<rust_decimal::Decimal>, Option<String>) {
    let mut amount = doc_fields.amount;
    let amount_conf = confidence_of(doc_fields, "amount");
    let mut currency = doc_fields.currency.clone();

    let text_for_money = format!("{body}{transcript}");
    let amount_match = extract_amount_currency(&text_for_money);

    if (amount.is_none() || amount_conf < CONFIDENCE_THRESHOLD) && amount_match.is_some() {
        let amount_match = amount_match.as_ref().unwrap();
        if let Some(norm_amt) = normalize_amount(&amount_match.raw) {
            amount = Some(norm_amt);
            source.insert("amount".to_string(), FieldSource::Regex);
        }
    } else if amount.is_some() {
        source.insert("amount".to_string(), FieldSource::Docqa);
    }

    let curr_hint = amount_match.and_then(|m| m.currency_hint);
    if currency.is_none() {
        if let Some(hint) = curr_hint {
            currency = normalize_currency(Some(&hint));
            source.insert("currency".to_string(), FieldSource::Regex);
        }
    } else {
        currency = normalize_currency(currency.as_deref());
        source.insert("currency".to_string(), FieldSource::Docqa);
    }

    (amount, currency)
}

fn merge_order_date(
    doc_fields: &DocFields,
    body: &str,
    transcript: &str,
    source: &mut std::collections::BTreeMap<String, FieldSource>,
) -> Option<chrono::NaiveDate> {
    let mut order_date = doc_fields.order_date;
    let date_conf = confidence_of(doc_fields, "order_date");

    if order_date.is_none() || date_conf < CONFIDENCE_THRESHOLD {
        let text_for_date = format!("{body} {transcript}");
        if let Some(parsed) = parse_date_eu(&text_for_date) {
            order_date = Some(parsed);
            source.insert("order_date".to_string(), FieldSource::Regex);
        }
    } else {
        source.insert("order_date".to_string(), FieldSource::Docqa);
    }
    order_date
}

fn merge_sku(
    doc_fields: &DocFields,
    body: &str,
    transcript: &str,
    source: &mut std::collections::BTreeMap<String, FieldSource>,
) -> Option<String> {
    let mut sku = doc_fields.sku.clone();
    let sku_conf = confidence_of(doc_fields, "sku");

    if sku.is_none() || sku_conf < CONFIDENCE_THRESHOLD {
        let text_for_sku = format!("{body} {transcript}");
        if let Some(regex_sku) = extract_sku(&text_for_sku) {
            sku = Some(regex_sku);
            source.insert("sku".to_string(), FieldSource::Regex);
        }
    } else {
        source.insert("sku".to_string(), FieldSource::Docqa);
    }
    sku
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn low_confidence_docqa_order_id_is_overridden_by_regex() {
        let mut confidence = BTreeMap::new();
        confidence.insert("order_id".to_string(), 0.3);
        let doc = DocFields {
            order_id: Some("XX".to_string()),
            confidence,
            ..Default::default()
        };
        let merged = merge(&doc, Some("please check order #AB99887"), None);
        assert_eq!(merged.order_id.as_deref(), Some("AB99887"));
        assert_eq!(merged.source.get("order_id"), Some(&FieldSource::Regex));
    }

    #[test]
    fn high_confidence_docqa_fields_are_kept() {
        let mut confidence = BTreeMap::new();
        confidence.insert("order_id".to_string(), 0.95);
        confidence.insert("sku".to_string(), 0.9);
        let doc = DocFields {
            order_id: Some("ORD-1".to_string()),
            sku: Some("SKU-1".to_string()),
            confidence,
            ..Default::default()
        };
        let merged = merge(&doc, Some("unrelated text"), None);
        assert_eq!(merged.order_id.as_deref(), Some("ORD-1"));
        assert_eq!(merged.source.get("order_id"), Some(&FieldSource::Docqa));
        assert_eq!(merged.sku.as_deref(), Some("SKU-1"));
        assert_eq!(merged.source.get("sku"), Some(&FieldSource::Docqa));
    }

    #[test]
    fn empty_doc_fields_fall_back_entirely_to_regex() {
        let doc = DocFields::default();
        let merged = merge(
            &doc,
            Some("order #ZZ4321 total $99.00 delivered 01/02/24 sku: ABC-999"),
            None,
        );
        assert_eq!(merged.order_id.as_deref(), Some("ZZ4321"));
        assert_eq!(
            merged.amount,
            Some(<rust_decimal::Decimal as std::str::FromStr>::from_str("99.00").unwrap())
        );
        assert_eq!(merged.currency.as_deref(), Some("USD"));
        assert_eq!(merged.sku.as_deref(), Some("ABC-999"));
    }

    /// S1 from `spec.md` §8: low-confidence DocQA order id, a voicemail
    /// transcript carrying the real order id, amount, and date.
    #[test]
    fn scenario_s1_refund_with_receipt_and_voicemail() {
        let mut confidence = BTreeMap::new();
        confidence.insert("order_id".to_string(), 0.5);
        let doc = DocFields {
            order_id: Some("A10023".to_string()),
            confidence,
            ..Default::default()
        };
        let body = "Hi, my package never arrived. See attached receipt.";
        let transcript =
            "Hello, I need a refund for order #WEB-999, it was 59.99 dollars on 10/05/2025.";

        let merged = merge(&doc, Some(body), Some(transcript));

        assert_eq!(merged.order_id.as_deref(), Some("WEB-999"));
        assert_eq!(
            merged.amount,
            Some(<rust_decimal::Decimal as std::str::FromStr>::from_str("59.99").unwrap())
        );
        assert_eq!(merged.currency.as_deref(), Some("USD"));
        assert_eq!(merged.order_date, chrono::NaiveDate::from_ymd_opt(2025, 5, 10));
        assert_eq!(merged.source.get("order_id"), Some(&FieldSource::Regex));
        assert_eq!(merged.source.get("amount"), Some(&FieldSource::Regex));
        assert_eq!(merged.source.get("order_date"), Some(&FieldSource::Regex));
    }

    /// S2 from `spec.md` §8: high-confidence DocQA order id must win
    /// over a conflicting body-text order id.
    #[test]
    fn scenario_s2_high_confidence_docqa_wins() {
        let mut confidence = BTreeMap::new();
        confidence.insert("order_id".to_string(), 0.9);
        let doc = DocFields {
            order_id: Some("DOCQA-123".to_string()),
            confidence,
            ..Default::default()
        };
        let merged = merge(&doc, Some("order #BODY-456"), None);
        assert_eq!(merged.order_id.as_deref(), Some("DOCQA-123"));
        assert_eq!(merged.source.get("order_id"), Some(&FieldSource::Docqa));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            "[a-zA-Z0-9 #:.,/-]{0,40}".prop_map(Some),
        ]
    }

    proptest! {
        /// Invariant 5 (`spec.md` §8): `source` has an entry exactly for
        /// fields whose merged value is non-null.
        #[test]
        fn source_map_matches_non_null_fields(body in arb_text(), transcript in arb_text()) {
            let doc = DocFields::default();
            let merged = merge(&doc, body.as_deref(), transcript.as_deref());

            prop_assert_eq!(merged.order_id.is_some(), merged.source.contains_key("order_id"));
            prop_assert_eq!(merged.amount.is_some(), merged.source.contains_key("amount"));
            prop_assert_eq!(merged.currency.is_some(), merged.source.contains_key("currency"));
            prop_assert_eq!(merged.order_date.is_some(), merged.source.contains_key("order_date"));
            prop_assert_eq!(merged.sku.is_some(), merged.source.contains_key("sku"));
        }
    }
}
