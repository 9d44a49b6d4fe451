//! Entity resolution from list responses

use serde_json::Value as JsonValue;

/// Find the `id` of the first record whose `field` equals `expected`
///
/// Returns `None` when the body is not a JSON array, when no record
/// matches, or when the matching record has no usable `id`. Never panics.
pub fn resolve(body: &str, field: &str, expected: &JsonValue) -> Option<JsonValue> {
    let parsed: JsonValue = serde_json::from_str(body).ok()?;
    let records = parsed.as_array()?;

    records
        .iter()
        .find(|record| record.get(field) == Some(expected))
        .and_then(|record| record.get("id"))
        .filter(|id| !id.is_null())
        .cloned()
}
