//! `cadence-store`: SQLite-backed document store.
//!
//! Documents are JSON objects grouped by collection, keyed by `id` and
//! secondarily indexed on `(objId, type)`. The store executes Mongo-shaped
//! [`Query`] values (`{collection, action, args}`) and answers with
//! `{ok, value}`, `value` being `null` when nothing matched.
//!
//! [`DbInterface`] exposes the store on the broker under the `dbinterface`
//! nature, translating one quality per operation into a query.

pub mod db;
pub mod error;
pub mod interface;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use interface::DbInterface;
pub use query::{Action, Query, QueryResult};
pub use store::DocumentStore;
