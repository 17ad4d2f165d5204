//! JSON-LD payload construction from document entities

use crate::SynthesisError;
use serde_json::{json, Map, Value};
use trendmark_domain::{ContentDocument, SchemaType, Trend};

/// schema.org JSON-LD context
pub const SCHEMA_CONTEXT: &str = "https://schema.org";

/// Entities copied into the payload when present
pub const OPTIONAL_ENTITIES: &[&str] = &[
    "description",
    "image",
    "brand",
    "sku",
    "author",
    "end_date",
    "availability",
];

/// Entities a document must carry for a schema type
pub fn required_entities(schema_type: SchemaType) -> &'static [&'static str] {
    match schema_type {
        SchemaType::Offer | SchemaType::Product => &["name", "price", "currency"],
        SchemaType::Article | SchemaType::NewsArticle => &["headline", "published"],
        SchemaType::Event => &["name", "start_date", "location"],
    }
}

/// Names of required entities that are missing or blank
pub fn missing_entities(schema_type: SchemaType, document: &ContentDocument) -> Vec<String> {
    required_entities(schema_type)
        .iter()
        .filter(|name| document.entity(name).is_none())
        .map(|name| name.to_string())
        .collect()
}

/// Build the JSON-LD payload for a document
///
/// Fails with [`SynthesisError::IncompleteData`] before anything is built if a
/// required entity is missing.
pub fn build_payload(
    schema_type: SchemaType,
    trend: &Trend,
    document: &ContentDocument,
) -> Result<Value, SynthesisError> {
    let missing = missing_entities(schema_type, document);
    if !missing.is_empty() {
        return Err(SynthesisError::IncompleteData {
            schema_type: schema_type.schema_org_type().to_string(),
            missing,
        });
    }

    // Presence was checked above
    let entity = |name: &str| document.entity(name).unwrap_or_default().to_string();

    let mut payload = Map::new();
    payload.insert("@context".into(), json!(SCHEMA_CONTEXT));
    payload.insert("@type".into(), json!(schema_type.schema_org_type()));
    payload.insert("url".into(), json!(document.url));

    match schema_type {
        SchemaType::Offer => {
            payload.insert("name".into(), json!(entity("name")));
            payload.insert("price".into(), json!(normalize_price(&entity("price"))));
            payload.insert("priceCurrency".into(), json!(normalize_currency(&entity("currency"))));
            if let Some(end) = document.entity("end_date") {
                payload.insert("validThrough".into(), json!(end));
            }
            insert_availability(&mut payload, document);
            insert_optional(&mut payload, document, "sku", "sku");
        }
        SchemaType::Product => {
            payload.insert("name".into(), json!(entity("name")));
            let mut offer = Map::new();
            offer.insert("@type".into(), json!("Offer"));
            offer.insert("price".into(), json!(normalize_price(&entity("price"))));
            offer.insert("priceCurrency".into(), json!(normalize_currency(&entity("currency"))));
            offer.insert("url".into(), json!(document.url));
            insert_availability(&mut offer, document);
            payload.insert("offers".into(), Value::Object(offer));
            if let Some(brand) = document.entity("brand") {
                payload.insert("brand".into(), json!({"@type": "Brand", "name": brand}));
            }
            insert_optional(&mut payload, document, "sku", "sku");
        }
        SchemaType::Article | SchemaType::NewsArticle => {
            payload.insert("headline".into(), json!(entity("headline")));
            payload.insert("datePublished".into(), json!(entity("published")));
            if let Some(author) = document.entity("author") {
                payload.insert("author".into(), json!({"@type": "Person", "name": author}));
            }
        }
        SchemaType::Event => {
            payload.insert("name".into(), json!(entity("name")));
            payload.insert("startDate".into(), json!(entity("start_date")));
            insert_optional(&mut payload, document, "end_date", "endDate");
            payload.insert(
                "location".into(),
                json!({"@type": "Place", "name": entity("location")}),
            );
        }
    }

    insert_optional(&mut payload, document, "description", "description");
    insert_optional(&mut payload, document, "image", "image");
    payload.insert("keywords".into(), json!(trend.query));

    Ok(Value::Object(payload))
}

fn insert_optional(payload: &mut Map<String, Value>, document: &ContentDocument, entity: &str, property: &str) {
    if let Some(value) = document.entity(entity) {
        payload.insert(property.to_string(), json!(value));
    }
}

/// `in stock` -> `https://schema.org/InStock`; full URLs are kept
fn insert_availability(payload: &mut Map<String, Value>, document: &ContentDocument) {
    if let Some(raw) = document.entity("availability") {
        let value = if raw.starts_with("http") {
            raw.to_string()
        } else {
            let item: String = raw
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                        None => String::new(),
                    }
                })
                .collect();
            format!("{}/{}", SCHEMA_CONTEXT, item)
        };
        payload.insert("availability".into(), json!(value));
    }
}

/// Strip whitespace and thousands separators
fn normalize_price(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace() && *c != ',').collect()
}

fn normalize_currency(raw: &str) -> String {
    raw.trim().to_uppercase()
}
