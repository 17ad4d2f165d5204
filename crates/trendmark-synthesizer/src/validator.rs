//! Structural validation of JSON-LD payloads

use crate::builder::SCHEMA_CONTEXT;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use trendmark_domain::SchemaType;

/// A structural problem in a payload
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// `@context` is missing or not schema.org
    Context,

    /// `@type` does not match the chosen schema type
    Type {
        /// Expected `@type`
        expected: String,
        /// Value found (empty if absent)
        found: String,
    },

    /// A required property is absent or not a non-empty string
    MissingProperty(String),

    /// `price` is not a non-negative decimal
    InvalidPrice(String),

    /// Currency is not a 3-letter uppercase ISO-4217 code
    InvalidCurrency(String),

    /// A date property is not ISO-8601
    InvalidDate {
        /// Property path
        property: String,
        /// Offending value
        value: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::Context => write!(f, "@context must be {}", SCHEMA_CONTEXT),
            Violation::Type { expected, found } => {
                write!(f, "@type must be {} (found '{}')", expected, found)
            }
            Violation::MissingProperty(p) => write!(f, "missing required property {}", p),
            Violation::InvalidPrice(v) => write!(f, "price '{}' is not a non-negative decimal", v),
            Violation::InvalidCurrency(v) => write!(f, "currency '{}' is not an ISO-4217 code", v),
            Violation::InvalidDate { property, value } => {
                write!(f, "{} '{}' is not an ISO-8601 date", property, value)
            }
        }
    }
}

/// Required property paths per schema type
fn required_properties(schema_type: SchemaType) -> &'static [&'static str] {
    match schema_type {
        SchemaType::Offer => &["name", "price", "priceCurrency"],
        SchemaType::Product => &["name", "offers.price", "offers.priceCurrency"],
        SchemaType::Article | SchemaType::NewsArticle => &["headline", "datePublished"],
        SchemaType::Event => &["name", "startDate", "location.name"],
    }
}

const PRICE_PATHS: &[&str] = &["price", "offers.price"];
const CURRENCY_PATHS: &[&str] = &["priceCurrency", "offers.priceCurrency"];
const DATE_PATHS: &[&str] = &["datePublished", "startDate", "endDate", "validThrough"];

/// Validate a payload against its schema type
///
/// Returns every violation found, not just the first.
pub fn validate(schema_type: SchemaType, payload: &Value) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    if payload.get("@context").and_then(Value::as_str) != Some(SCHEMA_CONTEXT) {
        violations.push(Violation::Context);
    }

    let found = payload.get("@type").and_then(Value::as_str).unwrap_or_default();
    if found != schema_type.schema_org_type() {
        violations.push(Violation::Type {
            expected: schema_type.schema_org_type().to_string(),
            found: found.to_string(),
        });
    }

    for path in required_properties(schema_type) {
        match lookup(payload, path).and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => {}
            _ => violations.push(Violation::MissingProperty(path.to_string())),
        }
    }

    for path in PRICE_PATHS {
        if let Some(price) = lookup(payload, path).and_then(Value::as_str) {
            if !is_price(price) {
                violations.push(Violation::InvalidPrice(price.to_string()));
            }
        }
    }

    for path in CURRENCY_PATHS {
        if let Some(currency) = lookup(payload, path).and_then(Value::as_str) {
            if !is_currency(currency) {
                violations.push(Violation::InvalidCurrency(currency.to_string()));
            }
        }
    }

    for path in DATE_PATHS {
        if let Some(date) = lookup(payload, path).and_then(Value::as_str) {
            if !is_iso8601(date) {
                violations.push(Violation::InvalidDate {
                    property: path.to_string(),
                    value: date.to_string(),
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Dotted-path lookup (`offers.price`)
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |value, segment| value.get(segment))
}

/// Digits with at most one decimal point (`499`, `1299.00`, `.5`)
pub fn is_price(s: &str) -> bool {
    let mut digits = 0;
    let mut points = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return false,
        }
    }
    digits > 0 && points <= 1
}

/// Three ASCII uppercase letters
pub fn is_currency(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase())
}

/// Calendar date, local date-time or RFC 3339 timestamp
pub fn is_iso8601(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}
