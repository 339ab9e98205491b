//! Collection allow-list
//!
//! Rules are `database.collection` for a single collection or `database.*`
//! for every collection in a database. An empty rule set allows everything.
//! Rules are parsed once into lookup sets.

use crate::Result;
use mongostore_common::StoreError;
use std::collections::HashSet;

/// Wildcard collection part of a rule
const WILDCARD: &str = "*";

/// Precomputed set of permitted `(database, collection)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionAllowList {
    exact: HashSet<(String, String)>,
    databases: HashSet<String>,
}

impl CollectionAllowList {
    /// An allow-list without restrictions
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse allow-list rules
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] for a rule without a `.` separator, with
    /// an empty database or collection part, or with `*` anywhere other than
    /// as the whole collection part.
    pub fn from_rules<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let mut list = Self::default();

        for rule in rules {
            let rule = rule.as_ref().trim();
            let (database, collection) = rule.split_once('.').ok_or_else(|| {
                StoreError::Config(format!(
                    "Invalid collection rule '{}': expected 'database.collection' or 'database.*'",
                    rule
                ))
            })?;

            if database.is_empty() || collection.is_empty() {
                return Err(StoreError::Config(format!(
                    "Invalid collection rule '{}': database and collection cannot be empty",
                    rule
                )));
            }

            if database.contains('*') || (collection.contains('*') && collection != WILDCARD) {
                return Err(StoreError::Config(format!(
                    "Invalid collection rule '{}': '*' is only allowed as 'database.*'",
                    rule
                )));
            }

            if collection == WILDCARD {
                list.databases.insert(database.to_string());
            } else {
                list.exact.insert((database.to_string(), collection.to_string()));
            }
        }

        Ok(list)
    }

    /// True when no rules were configured
    pub fn is_unrestricted(&self) -> bool {
        self.exact.is_empty() && self.databases.is_empty()
    }

    pub fn is_allowed(&self, database: &str, collection: &str) -> bool {
        if self.is_unrestricted() || self.databases.contains(database) {
            return true;
        }
        self.exact
            .contains(&(database.to_string(), collection.to_string()))
    }

    /// Like [`is_allowed`](Self::is_allowed) but returns [`StoreError::NotAllowed`]
    pub fn check(&self, database: &str, collection: &str) -> Result<()> {
        if self.is_allowed(database, collection) {
            Ok(())
        } else {
            Err(StoreError::NotAllowed {
                database: database.to_string(),
                collection: collection.to_string(),
            })
        }
    }
}
