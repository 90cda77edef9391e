use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fs,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, info};
use serde_json::{Value, json};

use super::{
    AsyncDocumentStore, DocumentStore,
    document::{compare_values, lookup_path, match_keys, remove_path, set_path},
    filter::Filter,
};
use crate::{
    errors::ExecutionError,
    pipeline::{GraphLookup, Lookup, Projection, SortOrder, Stage, Unwind},
    settings::{SettingsError, StoreSettings},
};

type Collections = HashMap<String, Vec<Value>>;

/// In-process document engine.
///
/// Executes the stage subset the builders emit (plus `$match`, `$sort`,
/// `$skip`, `$limit`) over JSON documents held per collection. A pipeline
/// runs against a consistent snapshot: writers wait until it finishes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Store named after `settings.name`, preloaded from every seed file.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, SettingsError> {
        let store = Self::new(settings.name.clone());
        for seed in settings.seeds() {
            let path = seed.resolved_path()?;
            let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
            let documents = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(documents)) => documents,
                Ok(_) => return Err(SettingsError::SeedShape { path }),
                Err(source) => return Err(SettingsError::Seed { path, source }),
            };
            info!(
                "seeding {} documents into {}.{} from {}",
                documents.len(),
                store.name,
                seed.collection,
                path.display()
            );
            store.seed(&seed.collection, documents);
        }
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append documents without key checks.
    pub fn seed(&self, collection: &str, documents: Vec<Value>) {
        self.write().entry(collection.to_string()).or_default().extend(documents);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.read().get(collection).map_or(0, Vec::len)
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>, ExecutionError> {
        let stages = pipeline
            .iter()
            .map(Stage::from_document)
            .collect::<Result<Vec<_>, _>>()?;

        let collections = self.read();
        let executor = Executor {
            collections: &collections,
        };
        let mut docs = executor.collection(collection).to_vec();
        for stage in &stages {
            docs = executor.run(docs, stage)?;
        }
        debug!(
            "{}: aggregated {} documents from {collection} through {} stages",
            self.name,
            docs.len(),
            stages.len()
        );
        Ok(docs)
    }

    fn find(&self, collection: &str, filter: &Value, limit: Option<u64>) -> Result<Vec<Value>, ExecutionError> {
        let filter = Filter::parse(filter)?;
        let limit = limit.map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let collections = self.read();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_many(&self, collection: &str, key_field: &str, documents: Vec<Value>) -> Result<(), ExecutionError> {
        let mut collections = self.write();
        let stored = collections.entry(collection.to_string()).or_default();

        let mut keys: HashSet<String> = stored
            .iter()
            .flat_map(|doc| match_keys(lookup_path(doc, key_field)))
            .collect();
        for doc in &documents {
            if let Some(key) = lookup_path(doc, key_field).filter(|key| !key.is_null())
                && !keys.insert(key.to_string())
            {
                return Err(ExecutionError::DuplicateKey {
                    collection: collection.to_string(),
                    key: key.as_str().map_or_else(|| key.to_string(), str::to_string),
                });
            }
        }

        stored.extend(documents);
        Ok(())
    }

    fn replace_one(&self, collection: &str, key_field: &str, key: &str, document: Value) -> Result<u64, ExecutionError> {
        let mut collections = self.write();
        let target = collections.get_mut(collection).and_then(|docs| {
            docs.iter_mut()
                .find(|doc| lookup_path(doc, key_field).and_then(Value::as_str) == Some(key))
        });
        match target {
            Some(slot) => {
                *slot = document;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn drop_collection(&self, collection: &str) -> Result<(), ExecutionError> {
        self.write().remove(collection);
        Ok(())
    }
}

impl AsyncDocumentStore for MemoryStore {
    async fn aggregate_async(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>, ExecutionError> {
        tokio::task::yield_now().await;
        DocumentStore::aggregate(self, collection, pipeline)
    }

    async fn find_async(
        &self,
        collection: &str,
        filter: &Value,
        limit: Option<u64>,
    ) -> Result<Vec<Value>, ExecutionError> {
        tokio::task::yield_now().await;
        DocumentStore::find(self, collection, filter, limit)
    }

    async fn insert_many_async(
        &self,
        collection: &str,
        key_field: &str,
        documents: Vec<Value>,
    ) -> Result<(), ExecutionError> {
        tokio::task::yield_now().await;
        DocumentStore::insert_many(self, collection, key_field, documents)
    }

    async fn replace_one_async(
        &self,
        collection: &str,
        key_field: &str,
        key: &str,
        document: Value,
    ) -> Result<u64, ExecutionError> {
        tokio::task::yield_now().await;
        DocumentStore::replace_one(self, collection, key_field, key, document)
    }

    async fn drop_collection_async(&self, collection: &str) -> Result<(), ExecutionError> {
        tokio::task::yield_now().await;
        DocumentStore::drop_collection(self, collection)
    }
}

struct Executor<'a> {
    collections: &'a Collections,
}

impl Executor<'_> {
    fn collection(&self, name: &str) -> &[Value] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn run(&self, docs: Vec<Value>, stage: &Stage) -> Result<Vec<Value>, ExecutionError> {
        let docs = match stage {
            Stage::Match(filter) => {
                let filter = Filter::parse(filter)?;
                docs.into_iter().filter(|doc| filter.matches(doc)).collect()
            }
            Stage::Limit(count) => docs.into_iter().take(to_usize(*count)).collect(),
            Stage::Skip(count) => docs.into_iter().skip(to_usize(*count)).collect(),
            Stage::Sort(fields) => exec_sort(docs, fields),
            Stage::Project(fields) => exec_project(docs, fields),
            Stage::Unset(paths) => docs
                .into_iter()
                .map(|mut doc| {
                    for path in paths {
                        remove_path(&mut doc, path);
                    }
                    doc
                })
                .collect(),
            Stage::Unwind(unwind) => exec_unwind(docs, unwind),
            Stage::Lookup(lookup) => self.exec_lookup(docs, lookup),
            Stage::GraphLookup(graph) => self.exec_graph_lookup(docs, graph),
        };
        Ok(docs)
    }

    fn exec_lookup(&self, docs: Vec<Value>, spec: &Lookup) -> Vec<Value> {
        let from = self.collection(&spec.from);
        let index = index_by(from, &spec.foreign_field);

        docs.into_iter()
            .map(|mut doc| {
                let positions: BTreeSet<usize> = match_keys(lookup_path(&doc, &spec.local_field))
                    .iter()
                    .filter_map(|key| index.get(key))
                    .flatten()
                    .copied()
                    .collect();
                let matched = positions.into_iter().map(|position| from[position].clone()).collect();
                set_path(&mut doc, &spec.as_field, Value::Array(matched));
                doc
            })
            .collect()
    }

    /// Breadth-first closure; each document is reached at most once, at the
    /// depth of its first discovery.
    fn exec_graph_lookup(&self, docs: Vec<Value>, spec: &GraphLookup) -> Vec<Value> {
        let from = self.collection(&spec.from);
        let index = index_by(from, &spec.connect_to_field);

        docs.into_iter()
            .map(|mut doc| {
                let mut visited = HashSet::new();
                let mut followed = HashSet::new();
                let mut hits = Vec::new();
                let mut frontier = match_keys(lookup_path(&doc, &spec.start_with));
                let mut depth: i64 = 0;

                while !frontier.is_empty() {
                    let mut next = Vec::new();
                    for key in frontier {
                        if !followed.insert(key.clone()) {
                            continue;
                        }
                        for &position in index.get(&key).into_iter().flatten() {
                            if !visited.insert(position) {
                                continue;
                            }
                            let candidate = &from[position];
                            next.extend(match_keys(lookup_path(candidate, &spec.connect_from_field)));
                            let mut hit = candidate.clone();
                            if let Some(depth_field) = &spec.depth_field {
                                set_path(&mut hit, depth_field, json!(depth));
                            }
                            hits.push(hit);
                        }
                    }
                    frontier = next;
                    depth += 1;
                }

                set_path(&mut doc, &spec.as_field, Value::Array(hits));
                doc
            })
            .collect()
    }
}

fn to_usize(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

fn index_by(docs: &[Value], field: &str) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, doc) in docs.iter().enumerate() {
        for key in match_keys(lookup_path(doc, field)) {
            index.entry(key).or_default().push(position);
        }
    }
    index
}

fn exec_sort(mut docs: Vec<Value>, fields: &[(String, SortOrder)]) -> Vec<Value> {
    docs.sort_by(|a, b| {
        for (field, order) in fields {
            let ordering = compare_values(lookup_path(a, field), lookup_path(b, field));
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    docs
}

fn exec_project(docs: Vec<Value>, fields: &[(String, Projection)]) -> Vec<Value> {
    let inclusion = fields
        .iter()
        .any(|(name, projection)| name != "_id" && !matches!(projection, Projection::Exclude));

    docs.into_iter()
        .map(|doc| {
            if !inclusion {
                let mut projected = doc;
                for (name, _) in fields {
                    remove_path(&mut projected, name);
                }
                return projected;
            }

            let mut projected = json!({});
            let id_excluded = fields
                .iter()
                .any(|(name, projection)| name == "_id" && matches!(projection, Projection::Exclude));
            if !id_excluded && let Some(id) = doc.get("_id") {
                set_path(&mut projected, "_id", id.clone());
            }
            for (name, projection) in fields {
                let source = match projection {
                    Projection::Include => name.as_str(),
                    Projection::Field(path) => path.as_str(),
                    Projection::Exclude => continue,
                };
                if let Some(value) = lookup_path(&doc, source) {
                    set_path(&mut projected, name, value.clone());
                }
            }
            projected
        })
        .collect()
}

/// Empty arrays lose the field when preserved; null and missing fields are
/// kept as they are.
fn exec_unwind(docs: Vec<Value>, spec: &Unwind) -> Vec<Value> {
    let mut unwound = Vec::with_capacity(docs.len());
    for mut doc in docs {
        match lookup_path(&doc, &spec.path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items.clone() {
                    let mut row = doc.clone();
                    set_path(&mut row, &spec.path, item);
                    unwound.push(row);
                }
            }
            Some(Value::Array(_)) => {
                if spec.preserve_null_and_empty {
                    remove_path(&mut doc, &spec.path);
                    unwound.push(doc);
                }
            }
            None | Some(Value::Null) => {
                if spec.preserve_null_and_empty {
                    unwound.push(doc);
                }
            }
            Some(_) => unwound.push(doc),
        }
    }
    unwound
}
