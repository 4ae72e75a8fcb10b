//! Immutable key items.
//!
//! Query keys may embed arbitrary JSON (context keys, request params). Once a
//! value enters a key it must never change, otherwise lookups and prefix
//! matches silently diverge. [`KeyItem`] is a JSON value with shared,
//! read-only storage: there is no way to mutate one after construction, at
//! any depth.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A deeply immutable JSON value.
///
/// Clones are cheap (reference counted) and equality is structural. Object
/// members are kept in key order so two objects with the same members hash
/// and compare equal regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyItem {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<[KeyItem]>),
    Object(Arc<BTreeMap<Arc<str>, KeyItem>>),
}

impl KeyItem {
    /// Build an object item from `(key, value)` pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, KeyItem)>,
    {
        KeyItem::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build an array item.
    pub fn array<I: IntoIterator<Item = KeyItem>>(items: I) -> Self {
        KeyItem::Array(items.into_iter().collect())
    }

    /// Member lookup on objects. `None` for every other shape.
    pub fn get(&self, key: &str) -> Option<&KeyItem> {
        match self {
            KeyItem::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Element lookup on arrays. `None` for every other shape.
    pub fn index(&self, index: usize) -> Option<&KeyItem> {
        match self {
            KeyItem::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyItem::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeyItem::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            KeyItem::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[KeyItem]> {
        match self {
            KeyItem::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, KeyItem::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, KeyItem::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, KeyItem::Array(_))
    }

    /// Falsy in the loose sense used for optional key parts: null, `false`,
    /// zero and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            KeyItem::Null => true,
            KeyItem::Bool(b) => !b,
            KeyItem::Number(n) => n.as_f64() == Some(0.0),
            KeyItem::String(s) => s.is_empty(),
            KeyItem::Array(_) | KeyItem::Object(_) => false,
        }
    }

    /// Copy back out into a mutable JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            KeyItem::Null => Value::Null,
            KeyItem::Bool(b) => Value::Bool(*b),
            KeyItem::Number(n) => Value::Number(n.clone()),
            KeyItem::String(s) => Value::String(s.to_string()),
            KeyItem::Array(items) => Value::Array(items.iter().map(KeyItem::to_json).collect()),
            KeyItem::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Freeze a JSON value, recursively.
///
/// Every nested array and object is copied into read-only storage, so later
/// changes to `value` are invisible to the returned item.
pub fn create_immutable_key_item(value: &Value) -> KeyItem {
    match value {
        Value::Null => KeyItem::Null,
        Value::Bool(b) => KeyItem::Bool(*b),
        Value::Number(n) => KeyItem::Number(n.clone()),
        Value::String(s) => KeyItem::String(Arc::from(s.as_str())),
        Value::Array(items) => KeyItem::array(items.iter().map(create_immutable_key_item)),
        Value::Object(map) => KeyItem::object(
            map.iter()
                .map(|(k, v)| (Arc::<str>::from(k.as_str()), create_immutable_key_item(v))),
        ),
    }
}

impl From<&Value> for KeyItem {
    fn from(value: &Value) -> Self {
        create_immutable_key_item(value)
    }
}

impl From<Value> for KeyItem {
    fn from(value: Value) -> Self {
        create_immutable_key_item(&value)
    }
}

impl From<&str> for KeyItem {
    fn from(value: &str) -> Self {
        KeyItem::String(Arc::from(value))
    }
}

impl From<String> for KeyItem {
    fn from(value: String) -> Self {
        KeyItem::String(Arc::from(value))
    }
}

impl From<bool> for KeyItem {
    fn from(value: bool) -> Self {
        KeyItem::Bool(value)
    }
}

impl From<u64> for KeyItem {
    fn from(value: u64) -> Self {
        KeyItem::Number(Number::from(value))
    }
}

impl Hash for KeyItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            KeyItem::Null => {}
            KeyItem::Bool(b) => b.hash(state),
            // Number has no Hash impl; its canonical text agrees with its Eq.
            KeyItem::Number(n) => n.to_string().hash(state),
            KeyItem::String(s) => s.hash(state),
            KeyItem::Array(items) => items.hash(state),
            KeyItem::Object(map) => map.hash(state),
        }
    }
}

impl Serialize for KeyItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyItem::Null => serializer.serialize_unit(),
            KeyItem::Bool(b) => serializer.serialize_bool(*b),
            KeyItem::Number(n) => n.serialize(serializer),
            KeyItem::String(s) => serializer.serialize_str(s),
            KeyItem::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            KeyItem::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(&**k, v)?;
                }
                out.end()
            }
        }
    }
}

impl fmt::Display for KeyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(item: &KeyItem) -> u64 {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structurally_identical_to_source() {
        let source = json!({
            "query": {"filter": [{"k": "name", "v": "a", "o": "eq"}], "only": ["id", "name"]},
            "page": {"start": 1, "limit": 15},
            "flag": true,
            "nothing": null
        });
        let item = create_immutable_key_item(&source);
        assert_eq!(item.to_json(), source);
    }

    #[test]
    fn test_later_source_mutation_is_invisible() {
        let mut source = json!({"query": {"filter": [{"k": "name", "v": "a"}]}});
        let item = create_immutable_key_item(&source);

        source["query"]["filter"][0]["v"] = json!("changed");
        source["extra"] = json!(1);

        let filter_value = item
            .get("query")
            .and_then(|q| q.get("filter"))
            .and_then(|f| f.index(0))
            .and_then(|f| f.get("v"))
            .and_then(KeyItem::as_str);
        assert_eq!(filter_value, Some("a"));
        assert!(item.get("extra").is_none());
    }

    #[test]
    fn test_primitives_pass_through() {
        assert_eq!(create_immutable_key_item(&json!("id-1")), KeyItem::from("id-1"));
        assert_eq!(create_immutable_key_item(&json!(true)), KeyItem::Bool(true));
        assert_eq!(create_immutable_key_item(&json!(3)).as_u64(), Some(3));
        assert!(create_immutable_key_item(&Value::Null).is_null());
    }

    #[test]
    fn test_member_order_does_not_matter() {
        let a = create_immutable_key_item(&json!({"a": 1, "b": [1, 2]}));
        let b = create_immutable_key_item(&json!({"b": [1, 2], "a": 1}));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_distinct_numbers_are_distinct() {
        let int = create_immutable_key_item(&json!(1));
        let float = create_immutable_key_item(&json!(1.5));
        assert_ne!(int, float);
    }

    #[test]
    fn test_falsy() {
        assert!(KeyItem::Null.is_falsy());
        assert!(KeyItem::from("").is_falsy());
        assert!(KeyItem::from(0u64).is_falsy());
        assert!(KeyItem::Bool(false).is_falsy());
        assert!(!KeyItem::from("x").is_falsy());
        assert!(!KeyItem::array(Vec::new()).is_falsy());
    }

    #[test]
    fn test_display_is_json() {
        let item = create_immutable_key_item(&json!({"b": 2, "a": "x"}));
        assert_eq!(item.to_string(), r#"{"a":"x","b":2}"#);
    }
}
