//! Identifier remapping between a public id field and `_id`
//!
//! When enabled, documents leaving the store expose their primary key under a
//! configurable public name (and as a hex string when it is an ObjectId),
//! optionally alongside a derived creation timestamp. Documents and filters
//! entering the store are rewritten back: the public name becomes `_id` and
//! the derived timestamp is dropped.
//!
//! Both directions are pure functions over [`bson::Document`] so they can be
//! tested without a server.

use crate::validation::coerce_object_id;
use bson::{Bson, Document};

/// Field receiving the id creation time when no timestamp field is configured
pub const DEFAULT_TIMESTAMP_FIELD: &str = "_ts";

/// Primary key field used by the server
pub const ID_FIELD: &str = "_id";

/// Identifier-remapping configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    pub enabled: bool,
    /// Public name for `_id`
    pub id_field: Option<String>,
    /// Name of the derived timestamp field
    pub timestamp_field: Option<String>,
}

impl IdMapping {
    /// A mapping that leaves every document untouched
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Field the derived timestamp is written to on output
    pub fn timestamp_field(&self) -> &str {
        self.timestamp_field
            .as_deref()
            .unwrap_or(DEFAULT_TIMESTAMP_FIELD)
    }

    /// Rewrite a filter or document on its way to the server.
    ///
    /// The derived timestamp field is always dropped, including the default
    /// `_ts`, so a record read back and written again never stores it.
    pub fn map_input(&self, doc: &mut Document) {
        if !self.enabled {
            return;
        }

        if let Some(field) = &self.id_field {
            if let Some(value) = doc.remove(field) {
                doc.insert(ID_FIELD, map_id_value(value));
            }
        }

        doc.remove(self.timestamp_field());
    }

    pub fn map_input_all(&self, docs: &mut [Document]) {
        for doc in docs.iter_mut() {
            self.map_input(doc);
        }
    }

    /// Rewrite a document returned by the server.
    pub fn map_output(&self, mut doc: Document) -> Document {
        if !self.enabled {
            return doc;
        }

        let id = match doc.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => return doc,
        };

        if let Bson::ObjectId(oid) = &id {
            let seconds = oid.timestamp().timestamp_millis() / 1000;
            doc.insert(self.timestamp_field(), Bson::Int64(seconds));
        }

        let public = match &id {
            Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
            other => other.clone(),
        };

        match &self.id_field {
            Some(field) => {
                doc.remove(ID_FIELD);
                // The public id replaces any stored field of the same name
                doc.remove(field);
                prepend(field, public, doc)
            }
            None if matches!(id, Bson::ObjectId(_)) => {
                doc.remove(ID_FIELD);
                prepend(ID_FIELD, public, doc)
            }
            None => doc,
        }
    }
}

/// Values moved into `_id` may be operator documents such as `{"$in": [...]}`;
/// ObjectId-shaped strings inside them are coerced too.
fn map_id_value(value: Bson) -> Bson {
    match value {
        Bson::Document(ops) => Bson::Document(
            ops.into_iter()
                .map(|(op, operand)| (op, map_id_value(operand)))
                .collect(),
        ),
        Bson::Array(items) => Bson::Array(items.into_iter().map(coerce_object_id).collect()),
        other => coerce_object_id(other),
    }
}

fn prepend(key: &str, value: Bson, rest: Document) -> Document {
    let mut out = Document::new();
    out.insert(key, value);
    out.extend(rest);
    out
}
