//! aggrel: typed relationship and hierarchy queries over document aggregation pipelines.
//!
//! Record types declare their collection, primary key, parent reference and
//! relationships through `#[derive(Record)]`. Query handles compose immutable
//! pipelines and execute them against a [`DocumentStore`], reshaping the rows
//! into hierarchy maps, root-first paths or joined views.

extern crate self as aggrel;

pub mod client;
pub mod engine;
pub mod errors;
pub mod examples;
pub mod id;
pub mod metadata;
pub mod pipeline;
pub mod relationship;
pub mod reshape;
pub mod save;
pub mod settings;
pub mod types;

pub use aggrel_macros::Record;
pub use client::{Aggregate, Client, Collection, Find};
pub use engine::{AsyncDocumentStore, DocumentStore, MemoryStore};
pub use errors::*;
pub use metadata::{TypeMetadata, collection_name};
pub use pipeline::{InternalFields, Pipeline, SortOrder, Stage};
pub use relationship::{PropertyRef, RelationshipDescriptor, resolve_relationship};
pub use reshape::{HierarchyResult, PathResult};
pub use settings::Settings;
pub use types::{Cardinality, KeyValue, Record};
