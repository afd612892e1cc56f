//! Equality selectors for rich queries.
//!
//! Accepts the CouchDB-style envelope `{"selector": {"field": value, ...}}`
//! and matches documents whose top-level fields equal every selector
//! field. Operators (`$gt`, `$regex`, ...) are not interpreted.

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    fields: Map<String, Value>,
}

impl Selector {
    pub fn parse(query: &str) -> StoreResult<Self> {
        let doc: Value = serde_json::from_str(query)
            .map_err(|e| StoreError::Query(format!("query is not valid JSON: {e}")))?;
        let selector = doc
            .get("selector")
            .ok_or_else(|| StoreError::Query("query has no \"selector\" field".into()))?;
        let fields = selector
            .as_object()
            .ok_or_else(|| StoreError::Query("\"selector\" must be an object".into()))?
            .clone();
        Ok(Self { fields })
    }

    /// Returns `true` if `doc` is a JSON object satisfying every field.
    /// Non-JSON values never match.
    pub fn matches(&self, doc: &[u8]) -> bool {
        let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(doc) else {
            return false;
        };
        self.fields
            .iter()
            .all(|(name, expected)| obj.get(name) == Some(expected))
    }
}
