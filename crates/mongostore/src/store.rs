//! Database-level facade
//!
//! A [`Store`] owns the driver client together with the options, the
//! identifier mapping and the collection allow-list. Collection access goes
//! through [`Store::collection`], which enforces the allow-list and hands out
//! a [`CollectionHandle`] for CRUD work.

use crate::allow_list::CollectionAllowList;
use crate::collection::{CollectionHandle, NoHooks, WriteHooks};
use crate::connection::Connection;
use crate::id_map::IdMapping;
use crate::options::StoreOptions;
use crate::validation::{coerce_object_id, validate_database_name, ValidatedCollectionName};
use crate::Result;
use bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::{Client, Database};
use mongostore_common::StoreError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tracing target for every store operation
pub const LOG_TARGET: &str = "mongostore";

/// Database used for server-wide admin commands
const ADMIN_DATABASE: &str = "admin";

/// Options and the structures derived from them, built once per store
#[derive(Debug)]
pub(crate) struct StoreContext {
    pub(crate) options: StoreOptions,
    pub(crate) mapping: IdMapping,
    pub(crate) allow_list: CollectionAllowList,
}

impl StoreContext {
    fn new(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            mapping: options.id_mapping(),
            allow_list: options.allow_list()?,
            options,
        })
    }
}

/// Entry point of the access layer
#[derive(Debug, Clone)]
pub struct Store {
    connection: Connection,
    context: Arc<StoreContext>,
    database: Option<String>,
}

impl Store {
    /// Validate `options` and create a client for them
    pub async fn connect(options: StoreOptions) -> Result<Self> {
        let connection = Connection::connect(&options).await?;
        Ok(Self {
            connection,
            context: Arc::new(StoreContext::new(options)?),
            database: None,
        })
    }

    /// Build a store around an existing driver client
    ///
    /// Connection-related options (hosts, credentials, pool) are ignored.
    pub fn from_client(client: Client, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            connection: Connection::from_client(client),
            context: Arc::new(StoreContext::new(options)?),
            database: None,
        })
    }

    /// Same client and options, different database
    pub fn with_database(&self, name: &str) -> Result<Self> {
        validate_database_name(name)?;
        Ok(Self {
            connection: self.connection.clone(),
            context: Arc::clone(&self.context),
            database: Some(name.to_string()),
        })
    }

    /// The selected database, falling back to the configured default
    pub fn database_name(&self) -> Result<&str> {
        self.database
            .as_deref()
            .or(self.context.options.db.as_deref())
            .ok_or(StoreError::MissingDatabase)
    }

    pub fn database(&self) -> Result<Database> {
        Ok(self.connection.database(self.database_name()?))
    }

    pub fn client(&self) -> &Client {
        self.connection.client()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.context.options
    }

    pub fn id_mapping(&self) -> &IdMapping {
        &self.context.mapping
    }

    /// Open a collection
    ///
    /// # Errors
    /// - [`StoreError::Validation`] for an invalid collection name
    /// - [`StoreError::MissingDatabase`] when no database is selected
    /// - [`StoreError::NotAllowed`] when the allow-list rejects the collection
    pub fn collection(&self, name: &str) -> Result<CollectionHandle> {
        self.collection_with_hooks(name, Arc::new(NoHooks))
    }

    /// Open a collection whose writes pass through `hooks`
    pub fn collection_with_hooks(
        &self,
        name: &str,
        hooks: Arc<dyn WriteHooks>,
    ) -> Result<CollectionHandle> {
        let name = ValidatedCollectionName::new(name)?;
        let database = self.database_name()?;
        self.context.allow_list.check(database, name.as_str())?;

        let collection = self
            .connection
            .database(database)
            .collection::<Document>(name.as_str());

        Ok(CollectionHandle::new(
            collection,
            database.to_string(),
            Arc::clone(&self.context),
            hooks,
        ))
    }

    /// Run a raw command on `database` (or the selected database)
    pub async fn execute_command(&self, command: Document, database: Option<&str>) -> Result<Document> {
        let database = match database {
            Some(name) => name,
            None => self.database_name()?,
        };
        debug!(target: LOG_TARGET, db = database, command = ?command, "execute_command");
        self.connection.run_command(database, command).await
    }

    /// Names of the collections the authenticated user may access
    pub async fn get_collections(&self) -> Result<Vec<String>> {
        let database = self.database_name()?;
        debug!(target: LOG_TARGET, db = database, "get_collections");

        let reply = self
            .connection
            .run_command(
                database,
                doc! {
                    "listCollections": 1,
                    "nameOnly": true,
                    "authorizedCollections": true,
                },
            )
            .await?;

        let mut names = Vec::new();
        let mut cursor = reply.get_document("cursor")?.clone();
        let mut batch_key = "firstBatch";

        loop {
            for entry in cursor.get_array(batch_key)? {
                if let Some(name) = entry.as_document().and_then(|d| d.get_str("name").ok()) {
                    names.push(name.to_string());
                }
            }

            let cursor_id = cursor.get_i64("id")?;
            if cursor_id == 0 {
                break;
            }

            let reply = self
                .connection
                .run_command(
                    database,
                    doc! { "getMore": cursor_id, "collection": "$cmd.listCollections" },
                )
                .await?;
            cursor = reply.get_document("cursor")?.clone();
            batch_key = "nextBatch";
        }

        Ok(names)
    }

    /// Names of every database on the server
    pub async fn get_databases(&self) -> Result<Vec<String>> {
        debug!(target: LOG_TARGET, "get_databases");
        self.connection.list_database_names().await
    }

    pub async fn server_build_info(&self) -> Result<Document> {
        self.execute_command(doc! { "buildinfo": 1 }, None).await
    }

    /// Server version string, empty when the server does not report one
    pub async fn server_version(&self) -> Result<String> {
        let info = self.server_build_info().await?;
        Ok(info.get_str("version").unwrap_or_default().to_string())
    }

    pub async fn server_status(&self) -> Result<Document> {
        self.execute_command(doc! { "serverStatus": 1 }, None).await
    }

    pub async fn server_replica_set_status(&self) -> Result<Document> {
        self.execute_command(doc! { "replSetGetStatus": 1 }, Some(ADMIN_DATABASE))
            .await
    }

    /// Check that a server is reachable
    ///
    /// Server selection failures are logged and reported as `Ok(false)`;
    /// other failures are returned as errors.
    pub async fn ping(&self) -> Result<bool> {
        match self
            .connection
            .client()
            .database(ADMIN_DATABASE)
            .run_command(doc! { "ping": 1 })
            .await
        {
            Ok(reply) => Ok(reply_ok(&reply)),
            Err(e) if matches!(e.kind.as_ref(), ErrorKind::ServerSelection { .. }) => {
                warn!(target: LOG_TARGET, error = %e, "ping failed: no reachable server");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// See [`object_id`]
    pub fn object_id(&self, id: impl Into<Bson>) -> Bson {
        object_id(id)
    }
}

/// Coerce an id to ObjectId when it is a 24-character hex string
pub fn object_id(id: impl Into<Bson>) -> Bson {
    coerce_object_id(id.into())
}

/// [`object_id`] over a list of ids
pub fn object_ids<I, T>(ids: I) -> Vec<Bson>
where
    I: IntoIterator<Item = T>,
    T: Into<Bson>,
{
    ids.into_iter().map(|id| coerce_object_id(id.into())).collect()
}

/// `ok: 1` check tolerant of the numeric type the server replies with
fn reply_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Boolean(v)) => *v,
        _ => false,
    }
}
