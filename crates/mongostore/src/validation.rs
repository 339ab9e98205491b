//! Name and identifier validation
//!
//! Collection names, database names and mapped field names are checked
//! before they reach the driver so that bad configuration fails early with
//! a [`StoreError`] instead of a server-side error.

use crate::Result;
use bson::{oid::ObjectId, Bson};
use mongostore_common::StoreError;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Maximum allowed length for database names
const MAX_DATABASE_NAME_LENGTH: usize = 63;

/// Characters MongoDB rejects in database names
const INVALID_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

/// Validated collection name
///
/// # Guarantees
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix (system collections)
/// - No $ characters (special operators)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    /// Creates a new validated collection name
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] if any guarantee is violated.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(StoreError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(StoreError::Validation(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(StoreError::Validation(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(StoreError::Validation(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(StoreError::Validation(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        Ok(ValidatedCollectionName {
            name: name.to_string(),
        })
    }

    /// Returns the validated collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Consumes the ValidatedCollectionName and returns the inner String
    pub fn into_string(self) -> String {
        self.name
    }
}

impl AsRef<str> for ValidatedCollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Checks a database name against the server's naming rules.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::Validation(
            "Database name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_DATABASE_NAME_LENGTH {
        return Err(StoreError::Validation(format!(
            "Database name exceeds maximum length of {} characters: '{}'",
            MAX_DATABASE_NAME_LENGTH, name
        )));
    }

    if let Some(c) = name.chars().find(|c| INVALID_DATABASE_CHARS.contains(c)) {
        return Err(StoreError::Validation(format!(
            "Database name cannot contain {:?}: '{}'",
            c, name
        )));
    }

    Ok(())
}

/// Checks a mapped field name (public id or derived timestamp field).
///
/// Mapped names must be non-empty and ASCII alphanumeric.
pub fn validate_mapped_field(option: &str, name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StoreError::Config(format!(
            "{} must be a non-empty alphanumeric field name, got '{}'",
            option, name
        )));
    }
    Ok(())
}

/// Checks if a string has valid ObjectId format (24 hex characters)
pub fn is_object_id_format(value: &str) -> bool {
    value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Coerces an identifier to an ObjectId when it looks like one.
///
/// 24-character hex strings become [`Bson::ObjectId`]; every other value is
/// returned unchanged so that custom (non-ObjectId) primary keys keep working.
pub fn coerce_object_id(id: Bson) -> Bson {
    match id {
        Bson::String(s) if is_object_id_format(&s) => match ObjectId::parse_str(&s) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(s),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_valid() {
        let name = ValidatedCollectionName::new("users").unwrap();
        assert_eq!(name.as_str(), "users");
        assert_eq!(name.to_string(), "users");
        assert!(ValidatedCollectionName::new("user_profiles.archive").is_ok());
    }

    #[test]
    fn test_collection_name_rejected() {
        assert!(ValidatedCollectionName::new("").is_err());
        assert!(ValidatedCollectionName::new("system.users").is_err());
        assert!(ValidatedCollectionName::new("users$").is_err());
        assert!(ValidatedCollectionName::new("us\0ers").is_err());
        assert!(ValidatedCollectionName::new(&"a".repeat(121)).is_err());
    }

    #[test]
    fn test_database_name() {
        assert!(validate_database_name("app").is_ok());
        assert!(validate_database_name("app-prod_1").is_ok());
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("app.prod").is_err());
        assert!(validate_database_name("app prod").is_err());
        assert!(validate_database_name(&"d".repeat(64)).is_err());
    }

    #[test]
    fn test_mapped_field() {
        assert!(validate_mapped_field("id field", "id").is_ok());
        assert!(validate_mapped_field("id field", "createdAt2").is_ok());
        assert!(validate_mapped_field("id field", "").is_err());
        assert!(validate_mapped_field("id field", "_id").is_err());
        assert!(matches!(
            validate_mapped_field("timestamp field", "created.at"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_object_id_format() {
        assert!(is_object_id_format("507f1f77bcf86cd799439011"));
        assert!(!is_object_id_format("507f1f77bcf86cd79943901"));
        assert!(!is_object_id_format("zzzf1f77bcf86cd799439011"));
    }

    #[test]
    fn test_coerce_object_id() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(
            coerce_object_id(Bson::String("507f1f77bcf86cd799439011".to_string())),
            Bson::ObjectId(oid)
        );
        assert_eq!(
            coerce_object_id(Bson::String("user-42".to_string())),
            Bson::String("user-42".to_string())
        );
        assert_eq!(coerce_object_id(Bson::Int64(42)), Bson::Int64(42));
        assert_eq!(coerce_object_id(Bson::ObjectId(oid)), Bson::ObjectId(oid));
    }
}
