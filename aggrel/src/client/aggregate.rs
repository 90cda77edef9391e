use std::{fmt, marker::PhantomData};

use log::debug;
use serde_json::{Value, json};

use super::Client;
use crate::{
    engine::{AsyncDocumentStore, DocumentStore},
    errors::PipelineError,
    metadata,
    pipeline::{HierarchyPlan, PathPlan, Pipeline, SortOrder, Stage, build_hierarchy, build_join, build_path},
    relationship::PropertyRef,
    reshape::{HierarchyResult, PathResult, decode, reshape_hierarchy, reshape_path},
    types::Record,
};

/// Fluent pipeline over one collection whose output decodes as `T`.
///
/// Every builder method returns a new handle and leaves `self` untouched, so
/// a partially built pipeline can be continued in several directions.
pub struct Aggregate<T, S> {
    client: Client<S>,
    collection: String,
    pipeline: Pipeline,
    _record: PhantomData<fn() -> T>,
}

impl<T, S> Clone for Aggregate<T, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            collection: self.collection.clone(),
            pipeline: self.pipeline.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, S> fmt::Debug for Aggregate<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("collection", &self.collection)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl<T: Record, S> Aggregate<T, S> {
    pub(crate) fn new(client: Client<S>, collection: String, pipeline: Pipeline) -> Self {
        Self {
            client,
            collection,
            pipeline,
            _record: PhantomData,
        }
    }

    fn with_pipeline<U: Record>(&self, pipeline: Pipeline) -> Aggregate<U, S> {
        Aggregate::new(self.client.clone(), self.collection.clone(), pipeline)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The stage documents this handle would send, without executing them.
    pub fn explain(&self) -> Vec<Value> {
        self.pipeline.to_documents()
    }

    pub fn append_stage(&self, stage: Stage) -> Self {
        self.with_pipeline(self.pipeline.then(stage))
    }

    pub fn match_filter(&self, filter: Value) -> Self {
        self.append_stage(Stage::match_filter(filter))
    }

    /// Keep the records whose primary key is one of `keys`.
    pub fn match_keys<I>(&self, keys: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let metadata = metadata::resolve::<T>()?;
        let field = metadata.primary_key().field();
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        Ok(self.match_filter(json!({ field: { "$in": keys } })))
    }

    pub fn sort(&self, field: impl Into<String>, order: SortOrder) -> Self {
        self.append_stage(Stage::Sort(vec![(field.into(), order)]))
    }

    pub fn skip(&self, count: u64) -> Self {
        self.append_stage(Stage::Skip(count))
    }

    pub fn limit(&self, count: u64) -> Self {
        self.append_stage(Stage::Limit(count))
    }

    /// Attach the related records of every property, in order.
    ///
    /// The output keeps decoding as `T`; follow with [`Aggregate::as_view`]
    /// to read it as the joined view type.
    pub fn join<V: Record>(&self, properties: &[PropertyRef<V>]) -> Result<Self, PipelineError> {
        let pipeline = build_join(&self.pipeline, properties)?;
        Ok(self.with_pipeline(pipeline))
    }

    /// Reinterpret the output documents as `V`.
    pub fn as_view<V: Record>(&self) -> Aggregate<V, S> {
        self.with_pipeline(self.pipeline.clone())
    }

    fn hierarchy_plan(&self) -> Result<HierarchyPlan, PipelineError> {
        let metadata = metadata::resolve::<T>()?;
        let fields = self.client.settings().pipeline.internal_fields();
        Ok(build_hierarchy(&self.pipeline, &metadata, &fields)?)
    }

    fn path_plan(&self) -> Result<PathPlan, PipelineError> {
        let metadata = metadata::resolve::<T>()?;
        let fields = self.client.settings().pipeline.internal_fields();
        Ok(build_path(&self.pipeline, &metadata, &fields)?)
    }

    fn render(&self, pipeline: &Pipeline) -> Vec<Value> {
        let documents = pipeline.to_documents();
        if self.client.settings().pipeline.log_stages {
            for (position, document) in documents.iter().enumerate() {
                debug!("{} stage {position}: {document}", self.collection);
            }
        }
        documents
    }

    fn decode_all(documents: Vec<Value>) -> Result<Vec<T>, PipelineError> {
        documents.into_iter().map(decode).collect()
    }
}

impl<T: Record, S: DocumentStore> Aggregate<T, S> {
    fn run(&self, pipeline: &Pipeline) -> Result<Vec<Value>, PipelineError> {
        let documents = self.render(pipeline);
        Ok(self.client.store().aggregate(&self.collection, &documents)?)
    }

    pub fn to_list(&self) -> Result<Vec<T>, PipelineError> {
        Self::decode_all(self.run(&self.pipeline)?)
    }

    /// Every matched record's descendants, keyed by the matched record's id.
    pub fn get_hierarchy(&self) -> Result<HierarchyResult<T>, PipelineError> {
        let plan = self.hierarchy_plan()?;
        reshape_hierarchy(self.run(&plan.pipeline)?, &plan.rows)
    }

    /// Every matched record's ancestor chain, root first, keyed by its id.
    pub fn get_path(&self) -> Result<PathResult<T>, PipelineError> {
        let plan = self.path_plan()?;
        reshape_path(self.run(&plan.pipeline)?, &plan.rows)
    }
}

impl<T: Record, S: AsyncDocumentStore> Aggregate<T, S> {
    async fn run_async(&self, pipeline: &Pipeline) -> Result<Vec<Value>, PipelineError> {
        let documents = self.render(pipeline);
        Ok(self.client.store().aggregate_async(&self.collection, &documents).await?)
    }

    pub async fn to_list_async(&self) -> Result<Vec<T>, PipelineError> {
        Self::decode_all(self.run_async(&self.pipeline).await?)
    }

    pub async fn get_hierarchy_async(&self) -> Result<HierarchyResult<T>, PipelineError> {
        let plan = self.hierarchy_plan()?;
        reshape_hierarchy(self.run_async(&plan.pipeline).await?, &plan.rows)
    }

    pub async fn get_path_async(&self) -> Result<PathResult<T>, PipelineError> {
        let plan = self.path_plan()?;
        reshape_path(self.run_async(&plan.pipeline).await?, &plan.rows)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{Record, engine::MemoryStore, errors::ConfigurationErrorKind, prop};

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "agg-task")]
    struct Task {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
        #[aggrel(parent)]
        parent_id: Option<String>,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "agg-task")]
    struct TaskWithSubtasks {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
        #[aggrel(foreign_key = "parent_id")]
        subtasks: Vec<Task>,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "agg-flat")]
    struct Flat {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
    }

    fn tasks() -> Client<MemoryStore> {
        Client::new(MemoryStore::new("aggregate-test"))
    }

    #[test]
    fn builder_methods_do_not_mutate_prefix() {
        let base = tasks().collection::<Task>().expect("collection").aggregate();
        let matched = base.match_keys(["t1", "t2"]).expect("match");
        let limited = matched.limit(1);

        assert!(base.explain().is_empty());
        assert_eq!(matched.explain(), vec![json!({"$match": {"_id": {"$in": ["t1", "t2"]}}})]);
        assert_eq!(limited.explain().len(), 2);
    }

    #[test]
    fn join_then_view_keeps_stages() {
        let joined = tasks()
            .collection::<Task>()
            .expect("collection")
            .aggregate()
            .join(&[prop!(TaskWithSubtasks, subtasks)])
            .expect("join")
            .as_view::<TaskWithSubtasks>();
        assert_eq!(joined.explain()[0]["$lookup"]["foreignField"], json!("parent_id"));
        assert_eq!(joined.collection(), "agg-task");
    }

    #[test]
    fn hierarchy_without_parent_executes_nothing() {
        let client = tasks();
        client.store().seed("agg-flat", vec![json!({"_id": "f"})]);
        let err = client
            .collection::<Flat>()
            .expect("collection")
            .aggregate()
            .get_hierarchy()
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ref config)
                if config.kind == ConfigurationErrorKind::MissingParentReferenceDeclaration
        ));
    }

    #[test]
    fn custom_prefix_reaches_the_stages() {
        let mut settings = crate::settings::Settings::default();
        settings.pipeline.internal_prefix = "__t".into();
        settings.pipeline.log_stages = true;
        let client = Client::with_settings(MemoryStore::new("aggregate-test"), settings);
        client.store().seed(
            "agg-task",
            vec![json!({"_id": "root", "parent_id": null}), json!({"_id": "leaf", "parent_id": "root"})],
        );

        let paths = client
            .collection::<Task>()
            .expect("collection")
            .aggregate()
            .match_keys(["leaf"])
            .expect("match")
            .get_path()
            .expect("path");
        let chain: Vec<_> = paths["leaf"].iter().map(|task| task.id.as_str()).collect();
        assert_eq!(chain, ["root", "leaf"]);
    }
}
