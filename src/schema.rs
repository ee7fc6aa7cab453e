/*!
 * Schema definitions for the input folders
 *
 * Claims and reverts are JSON arrays of objects keyed by field name. The
 * pharmacy directory is CSV; its columns are looked up by header name so
 * column order and extra columns do not matter.
 */

use crate::{Result, RxError};

/// Field names of a claim object
pub struct ClaimSchema;

impl ClaimSchema {
    pub const ID: &'static str = "id";
    pub const NPI: &'static str = "npi";
    pub const NDC: &'static str = "ndc";
    pub const PRICE: &'static str = "price";
    pub const QUANTITY: &'static str = "quantity";
}

/// Field names of a revert object
pub struct RevertSchema;

impl RevertSchema {
    pub const ID: &'static str = "id";
    pub const CLAIM_ID: &'static str = "claim_id";
}

/// Pharmacy directory CSV schema
pub struct PharmacySchema;

impl PharmacySchema {
    pub const CHAIN: &'static str = "chain";
    pub const NPI: &'static str = "npi";

    /// Columns that must be present in the header row
    pub fn column_names() -> Vec<&'static str> {
        vec![Self::CHAIN, Self::NPI]
    }

    /// Locate the required columns, matching header names case-insensitively
    pub fn validate_headers(headers: &[String]) -> Result<PharmacyColumns> {
        let find = |name: &str| {
            headers.iter().position(|h| normalize_header(h).eq_ignore_ascii_case(name))
        };

        match (find(Self::NPI), find(Self::CHAIN)) {
            (Some(npi), Some(chain)) => Ok(PharmacyColumns { npi, chain }),
            _ => Err(RxError::missing_columns(
                &Self::column_names(),
                &headers.iter().map(|h| normalize_header(h)).collect::<Vec<_>>(),
            )),
        }
    }
}

/// Column positions of the pharmacy directory fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PharmacyColumns {
    pub npi: usize,
    pub chain: usize,
}

/// Strip whitespace and a UTF-8 byte order mark from a header cell
fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}
