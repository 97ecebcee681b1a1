//! Extracted and merged order fields shared between DocQA, normalize, and
//! the ticket builder.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fields extracted by a single DocQA pass over one attachment.
///
/// `confidence` carries one entry per populated field (by field name),
/// in `[0, 1]`, used by both DocQA-select (choosing the best of several
/// attachments) and normalize (choosing a source per field).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocFields {
    /// Order or invoice number.
    pub order_id: Option<String>,
    /// Order total.
    pub amount: Option<Decimal>,
    /// ISO 4217 currency code, if determinable.
    pub currency: Option<String>,
    /// Order date.
    pub order_date: Option<NaiveDate>,
    /// Product SKU.
    pub sku: Option<String>,
    /// Per-field confidence in `[0, 1]`, keyed by field name
    /// (`"order_id"`, `"amount"`, `"currency"`, `"order_date"`, `"sku"`).
    pub confidence: BTreeMap<String, f64>,
}

impl DocFields {
    /// The sum of this result's confidences, used by DocQA-select to rank
    /// candidate attachments (`spec.md` §4.5).
    #[must_use]
    pub fn total_confidence(&self) -> f64 {
        self.confidence.values().sum()
    }

    /// `true` if no field was populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.amount.is_none()
            && self.currency.is_none()
            && self.order_date.is_none()
            && self.sku.is_none()
    }
}

/// Where a field in [`NormalizedFields`] ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Taken from the selected DocQA result.
    Docqa,
    /// Extracted from message body text by regex.
    Regex,
}

/// The merged, provenance-tagged result of the normalize stage
/// (`spec.md` §4.7): DocQA fields and regex-extracted fields combined
/// field-by-field by confidence, with the winning source recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedFields {
    /// Order or invoice number.
    pub order_id: Option<String>,
    /// Order total.
    pub amount: Option<Decimal>,
    /// ISO 4217 currency code, if determinable.
    pub currency: Option<String>,
    /// Order date.
    pub order_date: Option<NaiveDate>,
    /// Product SKU.
    pub sku: Option<String>,
    /// Per-field winning source, keyed by field name. Absent for fields
    /// that ended up `None` from both sources.
    pub source: BTreeMap<String, FieldSource>,
}
