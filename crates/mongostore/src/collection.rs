//! Collection-level CRUD facade
//!
//! Every call maps filters and documents through the store's [`IdMapping`],
//! delegates to the driver, maps results back and logs the operation on the
//! [`LOG_TARGET`] tracing target.

use crate::id_map::{IdMapping, ID_FIELD};
use crate::record::Record;
use crate::store::{object_id, StoreContext, LOG_TARGET};
use crate::Result;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::{AggregateOptions, FindOneOptions, FindOptions};
use mongodb::{Collection, Cursor};
use mongostore_common::StoreError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hooks applied to documents before they are written
///
/// All methods default to returning their input unchanged. Hooks run before
/// identifier mapping, so they see documents in their public shape.
pub trait WriteHooks: Send + Sync {
    fn before_insert_one(&self, document: Document) -> Document {
        document
    }

    fn before_insert_many(&self, documents: Vec<Document>) -> Vec<Document> {
        documents
    }

    fn before_replace(&self, document: Document) -> Document {
        document
    }

    fn before_replace_bulk(&self, documents: Vec<Document>) -> Vec<Document> {
        documents
    }

    /// Receives the update fields before they are wrapped in `$set`
    fn before_update(&self, update: Document) -> Document {
        update
    }

    fn before_update_bulk(&self, documents: Vec<Document>) -> Vec<Document> {
        documents
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl WriteHooks for NoHooks {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkKind {
    Update,
    Replace,
}

/// Handle on one collection of the store
#[derive(Clone)]
pub struct CollectionHandle {
    collection: Collection<Document>,
    database: String,
    context: Arc<StoreContext>,
    hooks: Arc<dyn WriteHooks>,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("database", &self.database)
            .field("collection", &self.collection.name())
            .finish()
    }
}

impl CollectionHandle {
    pub(crate) fn new(
        collection: Collection<Document>,
        database: String,
        context: Arc<StoreContext>,
        hooks: Arc<dyn WriteHooks>,
    ) -> Self {
        Self {
            collection,
            database,
            context,
            hooks,
        }
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// The underlying driver collection, for operations this layer does not wrap
    pub fn driver_collection(&self) -> &Collection<Document> {
        &self.collection
    }

    fn mapping(&self) -> &IdMapping {
        &self.context.mapping
    }

    fn to_record(&self, doc: Document) -> Record {
        Record::from_document(
            self.mapping().map_output(doc),
            self.context.options.return_objects,
        )
    }

    async fn collect(&self, cursor: Cursor<Document>) -> Result<Vec<Record>> {
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(|d| self.to_record(d)).collect())
    }


    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Find documents matching `filter`
    ///
    /// The configured default limit applies when `options` carries none.
    pub async fn find(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<Record>> {
        let mut options = options.into().unwrap_or_default();
        apply_default_limit(&mut options, self.context.options.default_limit);

        let mut filter = filter;
        self.mapping().map_input(&mut filter);

        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            filter = ?filter,
            options = ?options,
            "find"
        );

        let cursor = self.collection.find(filter).with_options(options).await?;
        self.collect(cursor).await
    }

    /// Find the first document matching `filter`
    pub async fn find_one(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> Result<Option<Record>> {
        Ok(self
            .find_one_document(filter, options.into())
            .await?
            .map(|d| Record::from_document(d, self.context.options.return_objects)))
    }

    /// `find_one` returning the mapped document regardless of the output shape
    async fn find_one_document(
        &self,
        filter: Document,
        options: Option<FindOneOptions>,
    ) -> Result<Option<Document>> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);

        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            filter = ?filter,
            options = ?options,
            "find_one"
        );

        let found = self
            .collection
            .find_one(filter)
            .with_options(options)
            .await?;
        Ok(found.map(|d| self.mapping().map_output(d)))
    }

    pub async fn find_by_id(&self, id: impl Into<Bson>) -> Result<Option<Record>> {
        let id = object_id(id);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), id = %id, "find_by_id");
        self.find_one(doc! { "_id": id }, None).await
    }

    /// Find several documents by id
    ///
    /// A single id is looked up with [`find_by_id`](Self::find_by_id).
    pub async fn find_by_ids<I, T>(&self, ids: I) -> Result<Vec<Record>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        let mut ids: Vec<Bson> = ids.into_iter().map(object_id).collect();
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), ids = ?ids, "find_by_ids");

        match ids.len() {
            0 => Ok(Vec::new()),
            1 => {
                let id = ids.pop().unwrap_or(Bson::Null);
                Ok(self.find_by_id(id).await?.into_iter().collect())
            }
            _ => self.find(doc! { "_id": { "$in": ids } }, None).await,
        }
    }

    /// Run an aggregation pipeline
    ///
    /// Pipeline stages are passed through unchanged; result documents are mapped.
    pub async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> Result<Vec<Record>> {
        let options = options.into();
        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            pipeline = ?pipeline,
            options = ?options,
            "aggregate"
        );

        let cursor = self
            .collection
            .aggregate(pipeline)
            .with_options(options)
            .await?;
        self.collect(cursor).await
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), filter = ?filter, "count");

        Ok(self.collection.count_documents(filter).await?)
    }

    pub async fn has(&self, filter: Document) -> Result<bool> {
        Ok(self.count(filter).await? > 0)
    }

    pub async fn has_id(&self, id: impl Into<Bson>) -> Result<bool> {
        self.has(doc! { "_id": object_id(id) }).await
    }

    /// A single field of the first document matching `filter`
    pub async fn value(&self, property: &str, filter: Document) -> Result<Option<Bson>> {
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), property, "value");
        Ok(self
            .find_one_document(filter, None)
            .await?
            .and_then(|mut d| d.remove(property)))
    }

    pub async fn value_by_id(&self, id: impl Into<Bson>, property: &str) -> Result<Option<Bson>> {
        self.value(property, doc! { "_id": object_id(id) }).await
    }

    // ---------------------------------------------------------------------
    // Inserts
    // ---------------------------------------------------------------------

    /// Insert a document and return its id as a string
    pub async fn insert_one(&self, document: Document) -> Result<String> {
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), document = ?document, "insert_one");

        let mut document = self.hooks.before_insert_one(document);
        self.mapping().map_input(&mut document);

        let result = self.collection.insert_one(document).await?;
        Ok(id_to_string(&result.inserted_id))
    }

    /// Insert documents and return their ids in input order
    pub async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<String>> {
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), documents = ?documents, "insert_many");

        let mut documents = self.hooks.before_insert_many(documents);
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.mapping().map_input_all(&mut documents);

        let result = self.collection.insert_many(documents).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.iter().map(|(_, id)| id_to_string(id)).collect())
    }

    // ---------------------------------------------------------------------
    // Updates and replacements
    // ---------------------------------------------------------------------

    /// `$set` the fields of `update` on the first matching document
    ///
    /// Returns the modified count.
    pub async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            filter = ?filter,
            update = ?update,
            "update_one"
        );

        let update = self.hooks.before_update(update);
        let result = self
            .collection
            .update_one(filter, doc! { "$set": update })
            .await?;
        Ok(result.modified_count)
    }

    /// `$set` the fields of `update` on every matching document
    ///
    /// A filter that only names the derived timestamp maps to `{}`; that case
    /// updates nothing rather than every document.
    pub async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        let requested = !filter.is_empty();
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            filter = ?filter,
            update = ?update,
            "update_many"
        );
        if requested && filter.is_empty() {
            warn!(target: LOG_TARGET, collection = %self.name(), "update_many filter is empty after mapping, nothing updated");
            return Ok(0);
        }

        let update = self.hooks.before_update(update);
        let result = self
            .collection
            .update_many(filter, doc! { "$set": update })
            .await?;
        Ok(result.modified_count)
    }

    pub async fn update_by_id(&self, id: impl Into<Bson>, update: Document) -> Result<u64> {
        let id = object_id(id);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), id = %id, "update_by_id");
        self.update_one(doc! { "_id": id }, update).await
    }

    /// Replace the first matching document; returns the modified count
    pub async fn replace_one(&self, filter: Document, document: Document) -> Result<u64> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            filter = ?filter,
            document = ?document,
            "replace_one"
        );

        let mut document = self.hooks.before_replace(document);
        self.mapping().map_input(&mut document);

        let result = self.collection.replace_one(filter, document).await?;
        Ok(result.modified_count)
    }

    pub async fn replace_by_id(&self, id: impl Into<Bson>, document: Document) -> Result<u64> {
        let id = object_id(id);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), id = %id, "replace_by_id");
        self.replace_one(doc! { "_id": id }, document).await
    }

    /// `$set` each document onto the stored document with the same id
    ///
    /// See [`replace_bulk`](Self::replace_bulk) for id and ordering rules.
    pub async fn update_bulk(&self, documents: Vec<Document>, ordered: bool) -> Result<u64> {
        let documents = self.hooks.before_update_bulk(documents);
        self.bulk_write(BulkKind::Update, "update_bulk", documents, ordered)
            .await
    }

    /// Replace each stored document with the document carrying the same id
    ///
    /// Every document must carry an id (`_id` or the public id field),
    /// otherwise nothing is written and [`StoreError::MissingId`] is returned.
    /// Ordered mode stops at the first failure; unordered mode attempts every
    /// document and then reports the first failure. Returns the total
    /// modified count.
    pub async fn replace_bulk(&self, documents: Vec<Document>, ordered: bool) -> Result<u64> {
        let documents = self.hooks.before_replace_bulk(documents);
        self.bulk_write(BulkKind::Replace, "replace_bulk", documents, ordered)
            .await
    }

    /// Writes run one by one so they work on servers without the
    /// client-level bulkWrite command (MongoDB < 8.0).
    async fn bulk_write(
        &self,
        kind: BulkKind,
        operation: &str,
        mut documents: Vec<Document>,
        ordered: bool,
    ) -> Result<u64> {
        self.mapping().map_input_all(&mut documents);

        let mut writes = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.remove(ID_FIELD) {
                Some(Bson::Null) | None => return Err(StoreError::MissingId(operation.to_string())),
                Some(id) => object_id(id),
            };
            writes.push((id, document));
        }

        debug!(
            target: LOG_TARGET,
            db = %self.database,
            collection = %self.name(),
            operations = writes.len(),
            ordered,
            "{}",
            operation
        );

        let mut modified = 0;
        let mut first_error = None;

        for (id, document) in writes {
            let filter = doc! { "_id": id };
            let result = match kind {
                BulkKind::Update => self
                    .collection
                    .update_one(filter, doc! { "$set": document })
                    .await
                    .map(|r| r.modified_count),
                BulkKind::Replace => self
                    .collection
                    .replace_one(filter, document)
                    .await
                    .map(|r| r.modified_count),
            };

            match result {
                Ok(count) => modified += count,
                Err(e) if ordered => return Err(e.into()),
                Err(e) => {
                    warn!(target: LOG_TARGET, operation, error = %e, "bulk write entry failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(modified),
        }
    }

    // ---------------------------------------------------------------------
    // Deletes
    // ---------------------------------------------------------------------

    /// Delete the first matching document; returns the deleted count
    pub async fn delete_one(&self, filter: Document) -> Result<u64> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), filter = ?filter, "delete_one");

        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    /// Delete every matching document
    ///
    /// A filter that is empty after mapping deletes nothing and returns 0;
    /// use [`delete_all`](Self::delete_all) to empty a collection.
    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        let mut filter = filter;
        self.mapping().map_input(&mut filter);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), filter = ?filter, "delete_many");
        if filter.is_empty() {
            return Ok(0);
        }

        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    pub async fn delete_by_id(&self, id: impl Into<Bson>) -> Result<u64> {
        let id = object_id(id);
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), id = %id, "delete_by_id");
        self.delete_one(doc! { "_id": id }).await
    }

    pub async fn delete_by_ids<I, T>(&self, ids: I) -> Result<u64>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        let ids: Vec<Bson> = ids.into_iter().map(object_id).collect();
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), count = ids.len(), "delete_by_ids");
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_many(doc! { "_id": { "$in": ids } }).await
    }

    /// Delete every document in the collection
    pub async fn delete_all(&self) -> Result<u64> {
        debug!(target: LOG_TARGET, db = %self.database, collection = %self.name(), "delete_all");
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }
}

/// A positive default limit applies when the caller set none; 0 disables it
fn apply_default_limit(options: &mut FindOptions, default_limit: i64) {
    if default_limit > 0 && options.limit.is_none() {
        options.limit = Some(default_limit);
    }
}

/// String form of an inserted id: hex for ObjectIds, plain text for strings,
/// extended JSON for anything else
fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::Double(v) => v.to_string(),
        Bson::Boolean(v) => v.to_string(),
        other => other.to_string(),
    }
}
