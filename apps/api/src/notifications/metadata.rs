//! Typed metadata carried on a notification and forwarded to the activity log.
//!
//! Scalar values live in a closed `MetaValue` map. Anything else a push
//! envelope brings along (arrays, nested objects, nulls) is kept verbatim in a
//! pass-through map that only the activity log ever reads. Both halves
//! serialize back into a single flat JSON object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<MetaValue> for Value {
    fn from(v: MetaValue) -> Self {
        match v {
            MetaValue::Bool(b) => Value::Bool(b),
            MetaValue::Int(i) => Value::from(i),
            MetaValue::Float(f) => Value::from(f),
            MetaValue::Text(s) => Value::String(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Metadata {
    fields: BTreeMap<String, MetaValue>,
    passthrough: Map<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a typed field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        let key = key.into();
        self.passthrough.remove(&key);
        self.fields.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.fields.get(key)
    }

    /// Untyped values kept only for the activity log.
    pub fn passthrough(&self) -> &Map<String, Value> {
        &self.passthrough
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.passthrough.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.passthrough.len()
    }

    /// Splits an arbitrary JSON value into typed fields and pass-through.
    /// A non-object value is kept whole under the `value` key.
    pub fn from_json(value: Value) -> Self {
        let mut metadata = Metadata::new();
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return metadata,
            other => {
                metadata.passthrough.insert("value".to_string(), other);
                return metadata;
            }
        };

        for (key, value) in object {
            match scalar(&value) {
                Some(typed) => {
                    metadata.fields.insert(key, typed);
                }
                None => {
                    metadata.passthrough.insert(key, value);
                }
            }
        }
        metadata
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

fn scalar(value: &Value) -> Option<MetaValue> {
    match value {
        Value::Bool(b) => Some(MetaValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(MetaValue::Int)
            .or_else(|| n.as_f64().map(MetaValue::Float)),
        Value::String(s) => Some(MetaValue::Text(s.clone())),
        _ => None,
    }
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        Metadata::from_json(value)
    }
}

impl From<Metadata> for Value {
    fn from(metadata: Metadata) -> Self {
        let mut object = metadata.passthrough;
        for (key, value) in metadata.fields {
            object.insert(key, value.into());
        }
        Value::Object(object)
    }
}
