//! Decoding helpers for the community inventory JSON, which is loose about shapes:
//! ids arrive as strings or numbers, flags as 0/1, empty maps as `[]`, and
//! `more_start` as `false` when there is no next page.
use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::model::{InventoryItem, ItemDescription};

/// Decode a value that should be an object keyed by string ids but may be any
/// other shape (the endpoint sends `[]` when empty). Non-objects decode to an
/// empty map; malformed entries inside an object are still an error.
pub fn decode_map_or_empty_array<T>(value: Value) -> Result<IndexMap<String, T>, serde_json::Error>
where
    T: DeserializeOwned,
{
    match value {
        Value::Object(_) => serde_json::from_value(value),
        _ => Ok(IndexMap::new()),
    }
}

/// `deserialize_with` adapter over [`decode_map_or_empty_array`].
pub fn map_or_empty_array<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    decode_map_or_empty_array(Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

/// Number or numeric string; null/empty string decode to the default.
pub fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n.to_string().parse::<T>().map_err(de::Error::custom),
        Value::String(s) if s.trim().is_empty() => Ok(T::default()),
        Value::String(s) => s.trim().parse::<T>().map_err(de::Error::custom),
        Value::Null => Ok(T::default()),
        other => Err(de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}

/// 0/1 wire flag (also tolerates real booleans and "1"/"true" strings).
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

/// Array of records, or an empty list for any other shape (`""` shows up for
/// descriptions without lines).
pub fn seq_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(de::Error::custom),
        _ => Ok(Vec::new()),
    }
}

/// Object decoded into `T`, or `None` for any non-object.
pub fn object_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        v @ Value::Object(_) => serde_json::from_value(v).map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

/// Continuation offset; only meaningful while `more` is set.
pub fn cursor(more: bool, raw: &Value) -> u32 {
    if !more {
        return 0;
    }
    match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// One page of `/inventory/json/{app}/{context}/` as sent on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct InventoryPage {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
    #[serde(rename = "rgInventory", default, deserialize_with = "map_or_empty_array")]
    pub rg_inventory: IndexMap<String, InventoryItem>,
    #[serde(rename = "rgCurrency", default, deserialize_with = "map_or_empty_array")]
    pub rg_currency: IndexMap<String, InventoryItem>,
    #[serde(rename = "rgDescriptions", default, deserialize_with = "map_or_empty_array")]
    pub rg_descriptions: IndexMap<String, ItemDescription>,
    #[serde(default, deserialize_with = "flag")]
    pub more: bool,
    #[serde(default)]
    pub more_start: Value,
}

impl InventoryPage {
    pub fn next_start(&self) -> u32 {
        cursor(self.more, &self.more_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_number")]
        n: u64,
        #[serde(default, deserialize_with = "flag")]
        f: bool,
    }

    #[test]
    fn empty_array_and_null_decode_to_empty_map() {
        let m: IndexMap<String, u32> = decode_map_or_empty_array(json!([])).unwrap();
        assert!(m.is_empty());
        let m: IndexMap<String, u32> = decode_map_or_empty_array(Value::Null).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn object_decodes_in_document_order() {
        let m: IndexMap<String, u32> =
            decode_map_or_empty_array(json!({"b": 2, "a": 1, "c": 3})).unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), ["b", "a", "c"]);
    }

    #[test]
    fn malformed_entries_inside_an_object_are_an_error() {
        let r: Result<IndexMap<String, u32>, _> =
            decode_map_or_empty_array(json!({"a": "not a number"}));
        assert!(r.is_err());
    }

    #[test]
    fn numbers_and_flags_accept_loose_shapes() {
        let p: Probe = serde_json::from_value(json!({"n": "123", "f": 1})).unwrap();
        assert_eq!((p.n, p.f), (123, true));
        let p: Probe = serde_json::from_value(json!({"n": 7, "f": "0"})).unwrap();
        assert_eq!((p.n, p.f), (7, false));
        let p: Probe = serde_json::from_value(json!({"n": null, "f": true})).unwrap();
        assert_eq!((p.n, p.f), (0, true));
        assert!(serde_json::from_value::<Probe>(json!({"n": "x1"})).is_err());
    }

    #[test]
    fn cursor_ignores_more_start_without_more() {
        assert_eq!(cursor(false, &json!(500)), 0);
        assert_eq!(cursor(true, &json!(500)), 500);
        assert_eq!(cursor(true, &json!("250")), 250);
        assert_eq!(cursor(true, &json!(false)), 0);
    }

    #[test]
    fn page_with_empty_arrays_decodes() {
        let page: InventoryPage = serde_json::from_value(json!({
            "success": true,
            "rgInventory": [],
            "rgCurrency": [],
            "rgDescriptions": [],
            "more": false,
            "more_start": false
        }))
        .unwrap();
        assert!(page.success);
        assert!(page.rg_inventory.is_empty());
        assert!(page.rg_currency.is_empty());
        assert!(page.rg_descriptions.is_empty());
        assert_eq!(page.next_start(), 0);
    }
}
