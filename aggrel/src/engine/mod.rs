//! Seam between pipeline construction and whatever executes the stages.
//!
//! Builders never talk to an engine. Collection handles render a
//! [`Pipeline`](crate::pipeline::Pipeline) to stage documents and hand them
//! to a [`DocumentStore`] (blocking) or an [`AsyncDocumentStore`]
//! (suspend-until-ready). Both receive the same documents, so the two modes
//! cannot disagree about result shape.

mod document;
pub mod filter;
pub mod memory;

use serde_json::Value;

pub use filter::Filter;
pub use memory::MemoryStore;

use crate::errors::ExecutionError;

pub trait DocumentStore: Send + Sync {
    /// Run `pipeline` (stage documents, in order) over `collection`.
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>, ExecutionError>;

    fn find(&self, collection: &str, filter: &Value, limit: Option<u64>) -> Result<Vec<Value>, ExecutionError>;

    /// Insert all documents or none; a key already present in the collection
    /// (or twice in the batch) is a [`ExecutionError::DuplicateKey`].
    fn insert_many(&self, collection: &str, key_field: &str, documents: Vec<Value>) -> Result<(), ExecutionError>;

    /// Replace the document whose `key_field` equals `key`; returns the number
    /// of documents matched (0 or 1).
    fn replace_one(&self, collection: &str, key_field: &str, key: &str, document: Value) -> Result<u64, ExecutionError>;

    fn drop_collection(&self, collection: &str) -> Result<(), ExecutionError>;
}

#[allow(async_fn_in_trait)]
pub trait AsyncDocumentStore: Send + Sync {
    async fn aggregate_async(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>, ExecutionError>;

    async fn find_async(
        &self,
        collection: &str,
        filter: &Value,
        limit: Option<u64>,
    ) -> Result<Vec<Value>, ExecutionError>;

    async fn insert_many_async(
        &self,
        collection: &str,
        key_field: &str,
        documents: Vec<Value>,
    ) -> Result<(), ExecutionError>;

    async fn replace_one_async(
        &self,
        collection: &str,
        key_field: &str,
        key: &str,
        document: Value,
    ) -> Result<u64, ExecutionError>;

    async fn drop_collection_async(&self, collection: &str) -> Result<(), ExecutionError>;
}
