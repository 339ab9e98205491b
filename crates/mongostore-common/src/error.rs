//! Error types for mongostore

use thiserror::Error;

/// Result type alias for mongostore operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for all mongostore operations
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Collection rejected by the allow-list
    #[error("Collection \"{database}.{collection}\" is not allowed")]
    NotAllowed { database: String, collection: String },

    /// No database passed to the store and none configured
    #[error("No database selected and no default database configured")]
    MissingDatabase,

    /// Bulk write document without an identifier
    #[error("Operation {0}() requires all documents to have an ID")]
    MissingId(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }

    /// Returns true if the error was caused by caller input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::Validation(_)
                | StoreError::Config(_)
                | StoreError::NotAllowed { .. }
                | StoreError::MissingDatabase
                | StoreError::MissingId(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } => {
                StoreError::Connection(err.to_string())
            }
            ErrorKind::InvalidArgument { .. } => StoreError::Query(err.to_string()),
            _ => StoreError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        StoreError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::document::ValueAccessError> for StoreError {
    fn from(err: bson::document::ValueAccessError) -> Self {
        StoreError::Deserialization(format!("Unexpected server reply: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_mongodb() {
        let err = StoreError::MongoDB("connection refused".to_string());
        assert_eq!(err.to_string(), "MongoDB error: connection refused");
    }

    #[test]
    fn test_error_display_config() {
        let err = StoreError::Config("hosts cannot be empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: hosts cannot be empty");
    }

    #[test]
    fn test_error_display_not_allowed() {
        let err = StoreError::NotAllowed {
            database: "app".to_string(),
            collection: "secrets".to_string(),
        };
        assert_eq!(err.to_string(), "Collection \"app.secrets\" is not allowed");
    }

    #[test]
    fn test_error_display_missing_id() {
        let err = StoreError::MissingId("update_bulk".to_string());
        assert_eq!(
            err.to_string(),
            "Operation update_bulk() requires all documents to have an ID"
        );
    }

    #[test]
    fn test_error_display_missing_database() {
        assert_eq!(
            StoreError::MissingDatabase.to_string(),
            "No database selected and no default database configured"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err(StoreError::Query("failed".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_is_retryable() {
        assert!(StoreError::Connection("test".to_string()).is_retryable());
        assert!(!StoreError::MongoDB("test".to_string()).is_retryable());
        assert!(!StoreError::Validation("test".to_string()).is_retryable());
    }

    #[test]
    fn test_is_client_error() {
        assert!(StoreError::Config("test".to_string()).is_client_error());
        assert!(StoreError::MissingDatabase.is_client_error());
        assert!(StoreError::MissingId("replace_bulk".to_string()).is_client_error());
        assert!(!StoreError::Connection("test".to_string()).is_client_error());
        assert!(!StoreError::Internal("test".to_string()).is_client_error());
    }
}
