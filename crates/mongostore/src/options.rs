//! Store options
//!
//! Typed replacement for a string-keyed option map. Options can be built in
//! code with the `with_*` setters, deserialized (the CLI reads them from
//! TOML), or read from `MONGOSTORE_*` environment variables.
//!
//! # Example
//! ```rust,ignore
//! use mongostore::StoreOptions;
//!
//! let options = StoreOptions::new("app")
//!     .with_hosts(["db1:27017", "db2:27017"])
//!     .with_replica_set("rs0")
//!     .with_auto_id(true)
//!     .with_id_field("id")
//!     .with_collections(["app.users", "logs.*"]);
//! options.validate()?;
//! ```

use crate::allow_list::CollectionAllowList;
use crate::id_map::IdMapping;
use crate::validation::{validate_database_name, validate_mapped_field};
use crate::Result;
use mongostore_common::StoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default host when none is configured
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Prefix of the environment variables read by [`StoreOptions::from_env`]
pub const ENV_PREFIX: &str = "MONGOSTORE_";

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool (default: 0)
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool (default: 10)
    pub max_pool_size: Option<u32>,
    /// Maximum time a connection can remain idle before being closed (default: none)
    #[serde(with = "duration_secs")]
    pub max_idle_time: Option<Duration>,
    /// Connection timeout (default: 10s)
    #[serde(with = "duration_secs")]
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout (default: 30s)
    #[serde(with = "duration_secs")]
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: Some(0),
            max_pool_size: Some(10),
            max_idle_time: None,
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("mongostore".to_string()),
        }
    }
}

/// Options controlling the connection, id remapping, allow-list and result shape
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Enable identifier remapping on reads and writes
    pub auto_id: bool,
    /// Public name exposed in place of `_id`
    pub auto_id_map_id: Option<String>,
    /// Name of the derived creation-timestamp field (`_ts` when unset)
    pub auto_id_map_timestamp: Option<String>,
    /// Allow-list rules, `db.collection` or `db.*`; empty allows everything
    pub collections: Vec<String>,
    /// Default database
    pub db: Option<String>,
    /// Limit applied to `find` when the caller passes none (0 disables)
    pub default_limit: i64,
    /// Seed list, `host` or `host:port`
    pub hosts: Vec<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub replica_set: Option<String>,
    /// Return attribute-bag records instead of BSON documents
    pub return_objects: bool,
    pub pool: PoolConfig,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            auto_id: false,
            auto_id_map_id: None,
            auto_id_map_timestamp: None,
            collections: Vec::new(),
            db: None,
            default_limit: 0,
            hosts: vec![DEFAULT_HOST.to_string()],
            username: None,
            password: None,
            replica_set: None,
            return_objects: false,
            pool: PoolConfig::default(),
        }
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("auto_id", &self.auto_id)
            .field("auto_id_map_id", &self.auto_id_map_id)
            .field("auto_id_map_timestamp", &self.auto_id_map_timestamp)
            .field("collections", &self.collections)
            .field("db", &self.db)
            .field("default_limit", &self.default_limit)
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("replica_set", &self.replica_set)
            .field("return_objects", &self.return_objects)
            .field("pool", &self.pool)
            .finish()
    }
}

impl StoreOptions {
    /// Options with a default database and everything else defaulted
    pub fn new(db: impl Into<String>) -> Self {
        Self {
            db: Some(db.into()),
            ..Default::default()
        }
    }

    pub fn with_auto_id(mut self, enabled: bool) -> Self {
        self.auto_id = enabled;
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.auto_id_map_id = Some(field.into());
        self
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.auto_id_map_timestamp = Some(field.into());
        self
    }

    pub fn with_collections<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_replica_set(mut self, name: impl Into<String>) -> Self {
        self.replica_set = Some(name.into());
        self
    }

    pub fn with_return_objects(mut self, enabled: bool) -> Self {
        self.return_objects = enabled;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Validate every option
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] naming the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if let Some(field) = &self.auto_id_map_id {
            validate_mapped_field("auto_id_map_id", field)?;
        }
        if let Some(field) = &self.auto_id_map_timestamp {
            validate_mapped_field("auto_id_map_timestamp", field)?;
        }
        if let (Some(id), Some(ts)) = (&self.auto_id_map_id, &self.auto_id_map_timestamp) {
            if id == ts {
                return Err(StoreError::Config(format!(
                    "auto_id_map_id and auto_id_map_timestamp cannot both be '{}'",
                    id
                )));
            }
        }

        if let Some(db) = &self.db {
            validate_database_name(db).map_err(|e| StoreError::Config(e.to_string()))?;
        }

        if self.default_limit < 0 {
            return Err(StoreError::Config(format!(
                "default_limit cannot be negative: {}",
                self.default_limit
            )));
        }

        if self.hosts.is_empty() {
            return Err(StoreError::Config("hosts cannot be empty".to_string()));
        }
        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(StoreError::Config("hosts cannot contain empty entries".to_string()));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(StoreError::Config(
                "password is set but username is missing".to_string(),
            ));
        }

        if matches!(&self.replica_set, Some(rs) if rs.is_empty()) {
            return Err(StoreError::Config("replica_set cannot be empty".to_string()));
        }

        if let (Some(min), Some(max)) = (self.pool.min_pool_size, self.pool.max_pool_size) {
            if min > max {
                return Err(StoreError::Config(format!(
                    "pool.min_pool_size ({}) exceeds pool.max_pool_size ({})",
                    min, max
                )));
            }
        }

        // Surfaces malformed rules here rather than on first collection access
        self.allow_list()?;

        Ok(())
    }

    /// Connection URI built from the seed list and replica set.
    ///
    /// Credentials are applied to the client options separately and never
    /// appear in the URI.
    pub fn connection_uri(&self) -> String {
        let mut uri = format!("mongodb://{}/", self.hosts.join(","));
        if let Some(rs) = &self.replica_set {
            uri.push_str("?replicaSet=");
            uri.push_str(rs);
        }
        uri
    }

    /// The identifier-remapping configuration derived from these options
    pub fn id_mapping(&self) -> IdMapping {
        IdMapping {
            enabled: self.auto_id,
            id_field: self.auto_id_map_id.clone(),
            timestamp_field: self.auto_id_map_timestamp.clone(),
        }
    }

    /// The precomputed collection allow-list
    pub fn allow_list(&self) -> Result<CollectionAllowList> {
        CollectionAllowList::from_rules(&self.collections)
    }

    /// Read options from `MONGOSTORE_*` environment variables
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreOptions::from_env`] with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut options = StoreOptions::default();

        if let Some(hosts) = get("HOSTS") {
            options.hosts = split_list(&hosts);
        }
        options.db = get("DB");
        options.username = get("USERNAME");
        options.password = get("PASSWORD");
        options.replica_set = get("REPLICA_SET");
        options.auto_id_map_id = get("ID_FIELD");
        options.auto_id_map_timestamp = get("TIMESTAMP_FIELD");

        if let Some(value) = get("AUTO_ID") {
            options.auto_id = parse_bool("MONGOSTORE_AUTO_ID", &value)?;
        }
        if let Some(value) = get("RETURN_OBJECTS") {
            options.return_objects = parse_bool("MONGOSTORE_RETURN_OBJECTS", &value)?;
        }
        if let Some(rules) = get("COLLECTIONS") {
            options.collections = split_list(&rules);
        }
        if let Some(value) = get("DEFAULT_LIMIT") {
            options.default_limit = value.parse().map_err(|_| {
                StoreError::Config(format!(
                    "MONGOSTORE_DEFAULT_LIMIT must be an integer, got '{}'",
                    value
                ))
            })?;
        }

        options.validate()?;
        Ok(options)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StoreError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}

/// Optional durations as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert!(!options.auto_id);
        assert!(!options.return_objects);
        assert_eq!(options.default_limit, 0);
        assert_eq!(options.hosts, vec!["127.0.0.1".to_string()]);
        assert!(options.collections.is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.min_pool_size, Some(0));
        assert_eq!(config.max_pool_size, Some(10));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.app_name, Some("mongostore".to_string()));
    }

    #[test]
    fn test_builder() {
        let options = StoreOptions::new("app")
            .with_auto_id(true)
            .with_id_field("id")
            .with_timestamp_field("created")
            .with_default_limit(100)
            .with_hosts(["db1:27017", "db2:27017"])
            .with_replica_set("rs0")
            .with_credentials("svc", "secret")
            .with_collections(["app.users", "logs.*"])
            .with_return_objects(true);

        assert!(options.validate().is_ok());
        assert_eq!(options.db.as_deref(), Some("app"));
        assert_eq!(options.hosts.len(), 2);

        let mapping = options.id_mapping();
        assert!(mapping.enabled);
        assert_eq!(mapping.id_field.as_deref(), Some("id"));
        assert_eq!(mapping.timestamp_field.as_deref(), Some("created"));
    }

    #[test]
    fn test_connection_uri() {
        let options = StoreOptions::default();
        assert_eq!(options.connection_uri(), "mongodb://127.0.0.1/");

        let options = StoreOptions::default()
            .with_hosts(["db1:27017", "db2:27018"])
            .with_replica_set("rs0")
            .with_credentials("svc", "secret");
        assert_eq!(
            options.connection_uri(),
            "mongodb://db1:27017,db2:27018/?replicaSet=rs0"
        );
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        assert!(StoreOptions::default().with_id_field("public-id").validate().is_err());
        assert!(StoreOptions::default().with_timestamp_field("").validate().is_err());
        assert!(StoreOptions::default()
            .with_id_field("id")
            .with_timestamp_field("id")
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(StoreOptions::default().with_default_limit(-1).validate().is_err());
        assert!(StoreOptions::default()
            .with_hosts(Vec::<String>::new())
            .validate()
            .is_err());
        assert!(StoreOptions::default().with_hosts([" "]).validate().is_err());
        assert!(StoreOptions::new("bad.name").validate().is_err());
        assert!(StoreOptions::default().with_replica_set("").validate().is_err());
        assert!(StoreOptions::default().with_collections(["nodot"]).validate().is_err());

        let mut options = StoreOptions::default();
        options.password = Some("secret".to_string());
        assert!(matches!(options.validate(), Err(StoreError::Config(_))));

        let pool = PoolConfig {
            min_pool_size: Some(20),
            max_pool_size: Some(5),
            ..Default::default()
        };
        assert!(StoreOptions::default().with_pool(pool).validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let options = StoreOptions::default().with_credentials("svc", "hunter2");
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("svc"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_from_lookup() {
        let options = StoreOptions::from_lookup(lookup(&[
            ("MONGOSTORE_HOSTS", "db1:27017, db2:27017"),
            ("MONGOSTORE_DB", "app"),
            ("MONGOSTORE_AUTO_ID", "true"),
            ("MONGOSTORE_ID_FIELD", "id"),
            ("MONGOSTORE_COLLECTIONS", "app.users,logs.*"),
            ("MONGOSTORE_DEFAULT_LIMIT", "50"),
            ("MONGOSTORE_RETURN_OBJECTS", "0"),
        ]))
        .unwrap();

        assert_eq!(options.hosts, vec!["db1:27017", "db2:27017"]);
        assert_eq!(options.db.as_deref(), Some("app"));
        assert!(options.auto_id);
        assert_eq!(options.auto_id_map_id.as_deref(), Some("id"));
        assert_eq!(options.collections, vec!["app.users", "logs.*"]);
        assert_eq!(options.default_limit, 50);
        assert!(!options.return_objects);
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let options = StoreOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(options, StoreOptions::default());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        assert!(StoreOptions::from_lookup(lookup(&[("MONGOSTORE_AUTO_ID", "maybe")])).is_err());
        assert!(StoreOptions::from_lookup(lookup(&[("MONGOSTORE_DEFAULT_LIMIT", "ten")])).is_err());
        assert!(StoreOptions::from_lookup(lookup(&[("MONGOSTORE_ID_FIELD", "a.b")])).is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{ "db": "app", "auto_id": true, "pool": { "connect_timeout": 5 } }"#;
        let options: StoreOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.db.as_deref(), Some("app"));
        assert!(options.auto_id);
        assert_eq!(options.hosts, vec!["127.0.0.1".to_string()]);
        assert_eq!(options.pool.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.pool.max_pool_size, Some(10));
    }

    #[test]
    fn test_serialize_skips_password() {
        let options = StoreOptions::new("app").with_credentials("svc", "hunter2");
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
