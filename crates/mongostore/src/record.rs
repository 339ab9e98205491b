//! Result records
//!
//! Reads return [`Record`]s in one of two shapes: the BSON document as the
//! driver produced it, or a plain JSON object (relaxed extended JSON) when
//! the store is configured with `return_objects`.

use crate::Result;
use bson::{Bson, Document};
use mongostore_common::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// Keyed BSON document
    Document(Document),
    /// Attribute bag in relaxed extended JSON
    Object(Map<String, Value>),
}

impl Record {
    /// Wrap a document in the configured shape
    pub fn from_document(doc: Document, return_objects: bool) -> Self {
        if !return_objects {
            return Record::Document(doc);
        }
        match Bson::Document(doc).into_relaxed_extjson() {
            Value::Object(map) => Record::Object(map),
            // A document always renders as a JSON object
            _ => Record::Object(Map::new()),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Record::Object(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Record::Document(doc) => Some(doc),
            Record::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Record::Object(map) => Some(map),
            Record::Document(_) => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            Record::Document(doc) => doc.contains_key(key),
            Record::Object(map) => map.contains_key(key),
        }
    }

    /// String field lookup that works for both shapes
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            Record::Document(doc) => doc.get_str(key).ok(),
            Record::Object(map) => map.get(key).and_then(Value::as_str),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Document(doc) => doc.len(),
            Record::Object(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a BSON document, parsing extended JSON for object records
    pub fn into_document(self) -> Result<Document> {
        match self {
            Record::Document(doc) => Ok(doc),
            Record::Object(map) => match Bson::try_from(Value::Object(map)) {
                Ok(Bson::Document(doc)) => Ok(doc),
                Ok(other) => Err(StoreError::Deserialization(format!(
                    "Expected a document, got {:?}",
                    other.element_type()
                ))),
                Err(e) => Err(StoreError::Deserialization(e.to_string())),
            },
        }
    }

    /// Convert to relaxed extended JSON
    pub fn into_json(self) -> Value {
        match self {
            Record::Document(doc) => Bson::Document(doc).into_relaxed_extjson(),
            Record::Object(map) => Value::Object(map),
        }
    }

    /// Deserialize into a typed struct
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Record::Document(doc) => Ok(bson::from_document(doc)?),
            Record::Object(map) => Ok(serde_json::from_value(Value::Object(map))
                .map_err(|e| StoreError::Deserialization(e.to_string()))?),
        }
    }
}

impl From<Document> for Record {
    fn from(doc: Document) -> Self {
        Record::Document(doc)
    }
}
