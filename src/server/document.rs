//! Arbitrary JSON documents as cascade items.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cascade::keys::{CacheItem, ItemKeyFn};

/// A JSON value stored in the cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Value);

impl CacheItem for Document {
    const TYPE_NAME: &'static str = "Document";
}

impl Document {
    /// The value of `field` as a key: strings verbatim, other scalars in
    /// their JSON form. `None` for non-objects and missing or null fields.
    pub fn field_key(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Item-key function reading `field`. Documents without it fall back to
    /// their serialized form so they still get a stable key.
    pub fn key_fn(field: impl Into<String>) -> ItemKeyFn<Document> {
        let field = field.into();
        std::sync::Arc::new(move |doc: &Document| {
            doc.field_key(&field).unwrap_or_else(|| doc.0.to_string())
        })
    }
}
