//! Convenience access layer over the MongoDB driver
//!
//! `mongostore` maps simplified CRUD calls onto the official driver and adds
//! three conventions on top:
//!
//! - **Identifier remapping**: `_id` can be exposed under a public field name
//!   (ObjectIds as hex strings) together with a derived creation timestamp,
//!   and mapped back on writes and filters. See [`IdMapping`].
//! - **Collection allow-list**: `db.collection` and `db.*` rules checked when
//!   a collection is opened. See [`CollectionAllowList`].
//! - **Operation logging**: every call is logged at debug level on the
//!   `mongostore` tracing target.
//!
//! Wire protocol, pooling and BSON encoding stay in the driver.
//!
//! # Example
//!
//! ```rust,ignore
//! use bson::doc;
//! use mongostore::{Store, StoreOptions};
//!
//! let options = StoreOptions::new("app")
//!     .with_auto_id(true)
//!     .with_id_field("id")
//!     .with_collections(["app.users"]);
//!
//! let store = Store::connect(options).await?;
//! let users = store.collection("users")?;
//!
//! let id = users.insert_one(doc! { "name": "alice" }).await?;
//! let alice = users.find_by_id(id.as_str()).await?;
//! ```

pub mod allow_list;
pub mod collection;
pub mod connection;
pub mod id_map;
pub mod options;
pub mod record;
pub mod store;
pub mod validation;

pub use allow_list::CollectionAllowList;
pub use collection::{CollectionHandle, NoHooks, WriteHooks};
pub use connection::Connection;
pub use id_map::{IdMapping, DEFAULT_TIMESTAMP_FIELD};
pub use mongostore_common::{Result, StoreError};
pub use options::{PoolConfig, StoreOptions};
pub use record::Record;
pub use store::{object_id, object_ids, Store, LOG_TARGET};
pub use validation::ValidatedCollectionName;

pub use bson;
pub use mongodb;
