use std::{fmt, marker::PhantomData, sync::Arc};

use serde_json::{Value, json};

use super::{Aggregate, Client};
use crate::{
    engine::{AsyncDocumentStore, DocumentStore},
    errors::PipelineError,
    metadata::TypeMetadata,
    pipeline::Pipeline,
    reshape::{decode, encode},
    types::Record,
};

/// Typed handle for the collection a record type is stored in.
pub struct Collection<T, S> {
    client: Client<S>,
    metadata: Arc<TypeMetadata<T>>,
}

impl<T, S> fmt::Debug for Collection<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("metadata", &self.metadata).finish()
    }
}

impl<T: Record, S> Collection<T, S> {
    pub(crate) fn new(client: Client<S>, metadata: Arc<TypeMetadata<T>>) -> Self {
        Self { client, metadata }
    }

    pub fn name(&self) -> &str {
        self.metadata.collection()
    }

    pub fn metadata(&self) -> &TypeMetadata<T> {
        &self.metadata
    }

    pub(crate) fn client(&self) -> &Client<S> {
        &self.client
    }

    /// Start an empty pipeline over this collection.
    pub fn aggregate(&self) -> Aggregate<T, S> {
        Aggregate::new(self.client.clone(), self.name().to_string(), Pipeline::new())
    }

    pub fn find(&self, filter: Value) -> Find<T, S> {
        Find {
            client: self.client.clone(),
            collection: self.name().to_string(),
            filter,
            limit: None,
            _record: PhantomData,
        }
    }

    pub fn find_all(&self) -> Find<T, S> {
        self.find(json!({}))
    }

    fn encode_all(&self, records: &[T]) -> Result<Vec<Value>, PipelineError> {
        records.iter().map(encode).collect()
    }
}

impl<T: Record, S: DocumentStore> Collection<T, S> {
    /// Insert records as they are; keys must already be assigned and unique.
    pub fn insert_many(&self, records: &[T]) -> Result<(), PipelineError> {
        let documents = self.encode_all(records)?;
        self.client
            .store()
            .insert_many(self.name(), self.metadata.primary_key().field(), documents)?;
        Ok(())
    }

    pub fn drop_collection(&self) -> Result<(), PipelineError> {
        Ok(self.client.store().drop_collection(self.name())?)
    }
}

impl<T: Record, S: AsyncDocumentStore> Collection<T, S> {
    pub async fn insert_many_async(&self, records: &[T]) -> Result<(), PipelineError> {
        let documents = self.encode_all(records)?;
        self.client
            .store()
            .insert_many_async(self.name(), self.metadata.primary_key().field(), documents)
            .await?;
        Ok(())
    }

    pub async fn drop_collection_async(&self) -> Result<(), PipelineError> {
        Ok(self.client.store().drop_collection_async(self.name()).await?)
    }
}

/// Filtered read, optionally limited.
pub struct Find<T, S> {
    client: Client<S>,
    collection: String,
    filter: Value,
    limit: Option<u64>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record, S> Find<T, S> {
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn decode_all(documents: Vec<Value>) -> Result<Vec<T>, PipelineError> {
        documents.into_iter().map(decode).collect()
    }
}

impl<T: Record, S: DocumentStore> Find<T, S> {
    pub fn to_list(&self) -> Result<Vec<T>, PipelineError> {
        let documents = self.client.store().find(&self.collection, &self.filter, self.limit)?;
        Self::decode_all(documents)
    }
}

impl<T: Record, S: AsyncDocumentStore> Find<T, S> {
    pub async fn to_list_async(&self) -> Result<Vec<T>, PipelineError> {
        let documents = self
            .client
            .store()
            .find_async(&self.collection, &self.filter, self.limit)
            .await?;
        Self::decode_all(documents)
    }
}
