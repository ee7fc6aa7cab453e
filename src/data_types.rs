/*!
 * Data type definitions for claims, reverts, pharmacies and derived reports
 *
 * Input records are loaded in two steps: a lenient `Raw*` shape where every
 * field is optional, then a checked conversion into the strongly typed record.
 * Records that fail the conversion are malformed and are skipped or rejected
 * by the reader depending on configuration.
 */

use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, NaiveDateTime};

use crate::{Result, RxError, ErrorContext};
use crate::schema::{ClaimSchema, RevertSchema};

/// Identifier value as it may appear in JSON input: text or number
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl IdRepr {
    fn into_string(self) -> String {
        match self {
            IdRepr::Text(s) => s.trim().to_string(),
            IdRepr::Integer(n) => n.to_string(),
            IdRepr::Unsigned(n) => n.to_string(),
            IdRepr::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e18 => {
                (f as i64).to_string()
            }
            IdRepr::Float(f) => f.to_string(),
        }
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    IdRepr::deserialize(deserializer).map(IdRepr::into_string)
}

/// NPI (National Provider Identifier) of a dispensing pharmacy
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Npi(pub String);

impl Npi {
    pub fn new(npi: impl Into<String>) -> Self {
        Npi(npi.into().trim().to_string())
    }

    /// Get the NPI as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Npi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_id(deserializer).map(Npi)
    }
}

impl fmt::Display for Npi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Npi {
    fn from(value: &str) -> Self {
        Npi::new(value)
    }
}

/// NDC (National Drug Code) identifying the dispensed drug
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Ndc(pub String);

impl Ndc {
    pub fn new(ndc: impl Into<String>) -> Self {
        Ndc(ndc.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Ndc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserialize_id(deserializer).map(Ndc)
    }
}

impl fmt::Display for Ndc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Ndc {
    fn from(value: &str) -> Self {
        Ndc::new(value)
    }
}

/// A dispensing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub npi: Npi,
    pub ndc: Ndc,
    pub price: f64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl Claim {
    pub fn new(
        id: impl Into<String>,
        npi: impl Into<Npi>,
        ndc: impl Into<Ndc>,
        price: f64,
        quantity: i64,
    ) -> Self {
        Self {
            id: id.into(),
            npi: npi.into(),
            ndc: ndc.into(),
            price,
            quantity,
            timestamp: None,
        }
    }
}

/// A reversal of a previously recorded claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revert {
    pub id: String,
    pub claim_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

impl Revert {
    pub fn new(id: impl Into<String>, claim_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claim_id: claim_id.into(),
            timestamp: None,
        }
    }
}

/// A pharmacy directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub npi: Npi,
    pub chain: String,
}

impl Pharmacy {
    pub fn new(npi: impl Into<Npi>, chain: impl Into<String>) -> Self {
        Self {
            npi: npi.into(),
            chain: chain.into(),
        }
    }
}

/// Quantity value as it may appear in JSON input.
///
/// Integers are kept exact; floats are accepted only when whole.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QuantityRepr {
    Integer(i64),
    Float(f64),
}

impl QuantityRepr {
    /// The whole-number value, or `None` for fractional, non-finite or
    /// out-of-range floats
    pub fn to_i64(self) -> Option<i64> {
        // i64::MIN is exact as f64; i64::MAX rounds up to 2^63, which is out of range
        const UPPER: f64 = i64::MAX as f64;
        const LOWER: f64 = i64::MIN as f64;

        match self {
            QuantityRepr::Integer(n) => Some(n),
            QuantityRepr::Float(f) if f.fract() == 0.0 && (LOWER..UPPER).contains(&f) => {
                Some(f as i64)
            }
            QuantityRepr::Float(_) => None,
        }
    }
}

impl fmt::Display for QuantityRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityRepr::Integer(n) => write!(f, "{}", n),
            QuantityRepr::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Claim as read from JSON, before required fields are checked
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClaim {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub npi: Option<Npi>,
    #[serde(default)]
    pub ndc: Option<Ndc>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<QuantityRepr>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Revert as read from JSON, before required fields are checked
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRevert {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn deserialize_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Option::<IdRepr>::deserialize(deserializer).map(|id| id.map(IdRepr::into_string))
}

fn require_text(value: Option<String>, field: &str, context: &ErrorContext) -> Result<String> {
    value
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RxError::missing_field(field, context.clone()))
}

impl RawClaim {
    /// Check required fields and build a [`Claim`]
    pub fn into_claim(self, context: ErrorContext) -> Result<Claim> {
        let id = require_text(self.id, ClaimSchema::ID, &context)?;
        let npi = require_text(self.npi.map(|n| n.0), ClaimSchema::NPI, &context).map(Npi)?;
        let ndc = require_text(self.ndc.map(|n| n.0), ClaimSchema::NDC, &context).map(Ndc)?;

        let price = self
            .price
            .ok_or_else(|| RxError::missing_field(ClaimSchema::PRICE, context.clone()))?;
        if !price.is_finite() {
            return Err(RxError::invalid_field(
                ClaimSchema::PRICE,
                price,
                "price must be a finite number",
                context,
            ));
        }

        let raw_quantity = self
            .quantity
            .ok_or_else(|| RxError::missing_field(ClaimSchema::QUANTITY, context.clone()))?;
        let quantity = raw_quantity.to_i64().ok_or_else(|| {
            RxError::invalid_field(
                ClaimSchema::QUANTITY,
                raw_quantity,
                "quantity must be a whole number",
                context,
            )
        })?;

        Ok(Claim {
            id,
            npi,
            ndc,
            price,
            quantity,
            timestamp: self.timestamp.as_deref().and_then(parse_timestamp),
        })
    }
}

impl RawRevert {
    /// Check required fields and build a [`Revert`]
    pub fn into_revert(self, context: ErrorContext) -> Result<Revert> {
        Ok(Revert {
            id: require_text(self.id, RevertSchema::ID, &context)?,
            claim_id: require_text(self.claim_id, RevertSchema::CLAIM_ID, &context)?,
            timestamp: self.timestamp.as_deref().and_then(parse_timestamp),
        })
    }
}

/// Parse event timestamps. Unknown formats yield `None`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Fill and revert metrics for one (pharmacy, drug) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub npi: Npi,
    pub ndc: Ndc,
    pub fills: u64,
    pub reverted: u64,
    pub avg_price: f64,
    pub total_price: f64,
}

/// One chain in a drug's recommendation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPrice {
    pub name: String,
    pub avg_price: f64,
}

/// The cheapest chains for a drug, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecommendation {
    pub ndc: Ndc,
    pub chain: Vec<ChainPrice>,
}

/// The most prescribed quantities for a drug, largest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonQuantity {
    pub ndc: Ndc,
    pub most_prescribed_quantity: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_accept_numbers_and_strings() {
        let json = r#"{"id": 7, "npi": 1234567890, "ndc": " 00002323401 ",
            "price": 1.5, "quantity": 30.0}"#;
        let raw: RawClaim = serde_json::from_str(json).unwrap();
        let claim = raw.into_claim(ErrorContext::default()).unwrap();
        assert_eq!(claim.id, "7");
        assert_eq!(claim.npi, Npi::new("1234567890"));
        assert_eq!(claim.ndc.as_str(), "00002323401");
        assert_eq!(claim.quantity, 30);
    }

    #[test]
    fn test_float_npi_normalises_to_integer_text() {
        let npi: Npi = serde_json::from_str("1.0").unwrap();
        assert_eq!(npi.as_str(), "1");
    }

    #[test]
    fn test_missing_price_is_malformed() {
        let raw: RawClaim = serde_json::from_str(
            r#"{"id": "c1", "npi": "1", "ndc": "D1", "quantity": 3}"#
        ).unwrap();
        let err = raw.into_claim(ErrorContext::default()).unwrap_err();
        assert!(matches!(err, RxError::DataValidation { field: Some(ref f), .. } if f == "price"));
    }

    #[test]
    fn test_fractional_quantity_is_malformed() {
        let raw = RawClaim {
            id: Some("c1".into()),
            npi: Some(Npi::new("1")),
            ndc: Some(Ndc::new("D1")),
            price: Some(2.0),
            quantity: Some(QuantityRepr::Float(2.5)),
            timestamp: None,
        };
        assert!(raw.into_claim(ErrorContext::default()).is_err());
    }

    #[test]
    fn test_large_integer_quantity_is_exact() {
        let raw: RawClaim = serde_json::from_str(
            r#"{"id": "c1", "npi": "1", "ndc": "D1", "price": 1.0, "quantity": 9007199254740993}"#
        ).unwrap();
        let claim = raw.into_claim(ErrorContext::default()).unwrap();
        assert_eq!(claim.quantity, 9_007_199_254_740_993);
    }

    #[test]
    fn test_quantity_float_range() {
        assert_eq!(QuantityRepr::Float(30.0).to_i64(), Some(30));
        assert_eq!(QuantityRepr::Float(-4.0).to_i64(), Some(-4));
        assert_eq!(QuantityRepr::Float(1e19).to_i64(), None);
        assert_eq!(QuantityRepr::Float(f64::NAN).to_i64(), None);
    }

    #[test]
    fn test_empty_id_is_malformed() {
        let raw: RawRevert = serde_json::from_str(r#"{"id": "", "claim_id": "c1"}"#).unwrap();
        assert!(raw.into_revert(ErrorContext::default()).is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2020-01-01T10:00:00").is_some());
        assert!(parse_timestamp("2020-01-01 10:00:00.123").is_some());
        assert!(parse_timestamp("2020-01-01T10:00:00+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
