//! Insert-if-new-else-replace helpers.
//!
//! A record whose primary key is unset is new: it gets a generated id and is
//! inserted. Any other record replaces the stored document with the same id.
//! Replacing never inserts; a replace that matches nothing is logged and
//! otherwise ignored.

use log::{debug, warn};
use serde_json::Value;

use crate::{
    client::Collection,
    engine::{AsyncDocumentStore, DocumentStore},
    errors::PipelineError,
    id::generate_record_id,
    metadata::TypeMetadata,
    reshape::encode,
    types::Record,
};

/// Writes for a batch: all inserts go out together, replaces one by one.
struct SavePlan {
    inserts: Vec<Value>,
    replaces: Vec<(String, Value)>,
}

impl SavePlan {
    /// Assign ids to new records and encode everything.
    fn prepare<T: Record>(metadata: &TypeMetadata<T>, records: &mut [T]) -> Result<Self, PipelineError> {
        let key = metadata.primary_key();
        let mut plan = SavePlan {
            inserts: Vec::new(),
            replaces: Vec::new(),
        };
        for record in records.iter_mut() {
            match key.get(record).map(str::to_string) {
                Some(existing) => plan.replaces.push((existing, encode(record)?)),
                None => {
                    key.set(record, generate_record_id());
                    plan.inserts.push(encode(record)?);
                }
            }
        }
        debug!(
            "saving {}: {} inserts, {} replaces",
            metadata.type_name(),
            plan.inserts.len(),
            plan.replaces.len()
        );
        Ok(plan)
    }
}

fn report_replace(collection: &str, key: &str, matched: u64) {
    if matched == 0 {
        warn!("replace in {collection} matched no document with key {key}");
    }
}

impl<T: Record, S: DocumentStore> Collection<T, S> {
    /// Save one record and return it with its id assigned.
    ///
    /// Returns only after the write has been applied.
    pub fn save_one(&self, record: T) -> Result<T, PipelineError> {
        let mut batch = [record];
        self.apply(SavePlan::prepare(self.metadata(), &mut batch)?)?;
        let [record] = batch;
        Ok(record)
    }

    /// Save a batch and return it with ids assigned, in input order.
    pub fn save_many(&self, mut records: Vec<T>) -> Result<Vec<T>, PipelineError> {
        self.apply(SavePlan::prepare(self.metadata(), &mut records)?)?;
        Ok(records)
    }

    fn apply(&self, plan: SavePlan) -> Result<(), PipelineError> {
        let store = self.client().store();
        let key_field = self.metadata().primary_key().field();

        if !plan.inserts.is_empty() {
            store.insert_many(self.name(), key_field, plan.inserts)?;
        }
        for (key, document) in plan.replaces {
            let matched = store.replace_one(self.name(), key_field, &key, document)?;
            report_replace(self.name(), &key, matched);
        }
        Ok(())
    }
}

impl<T: Record, S: AsyncDocumentStore> Collection<T, S> {
    pub async fn save_one_async(&self, record: T) -> Result<T, PipelineError> {
        let mut batch = [record];
        self.apply_async(SavePlan::prepare(self.metadata(), &mut batch)?).await?;
        let [record] = batch;
        Ok(record)
    }

    pub async fn save_many_async(&self, mut records: Vec<T>) -> Result<Vec<T>, PipelineError> {
        self.apply_async(SavePlan::prepare(self.metadata(), &mut records)?).await?;
        Ok(records)
    }

    async fn apply_async(&self, plan: SavePlan) -> Result<(), PipelineError> {
        let store = self.client().store();
        let key_field = self.metadata().primary_key().field();

        if !plan.inserts.is_empty() {
            store.insert_many_async(self.name(), key_field, plan.inserts).await?;
        }
        for (key, document) in plan.replaces {
            let matched = store.replace_one_async(self.name(), key_field, &key, document).await?;
            report_replace(self.name(), &key, matched);
        }
        Ok(())
    }
}
