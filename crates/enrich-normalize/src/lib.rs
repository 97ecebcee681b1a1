#![deny(unsafe_code)]
#![warn(missing_docs)]
//! enrich-normalize
//!
//! Pure regex extraction and the field merger (C7). No I/O, no async:
//! every public function here is deterministic over its string inputs.

mod amounts;
mod dates;
mod merger;
mod regexes;

pub use amounts::{normalize_amount, normalize_currency};
pub use dates::parse_date_eu;
pub use merger::merge;
pub use regexes::{extract_amount_currency, extract_order_id, extract_sku, AmountMatch};
