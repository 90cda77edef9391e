use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by pipeline builders and collection handles.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Record metadata is invalid for the requested operation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A join referenced a property that could not be turned into a relationship.
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// The execution engine rejected or failed the request.
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// A result document could not be converted into the requested record type.
    #[error("failed to decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized into a document.
    #[error("failed to encode {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A pipeline row did not have the shape the reshaper expects.
    #[error("malformed result row: {message}")]
    MalformedRow { message: Cow<'static, str> },
}

/// Metadata declared on a record type is missing or contradictory.
///
/// Always raised while resolving metadata, before any stage is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid metadata on `{type_name}`: {kind}")]
pub struct ConfigurationError {
    pub type_name: &'static str,
    pub kind: ConfigurationErrorKind,
}

impl ConfigurationError {
    pub fn new(type_name: &'static str, kind: ConfigurationErrorKind) -> Self {
        Self { type_name, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationErrorKind {
    #[error("no collection declaration (add #[aggrel(collection = \"...\")])")]
    MissingCollectionDeclaration,

    #[error("no primary key declaration (add #[aggrel(id)] to one field)")]
    MissingPrimaryKeyDeclaration,

    #[error("more than one primary key declaration ({fields:?})")]
    DuplicatePrimaryKeyDeclaration { fields: Vec<String> },

    #[error("more than one parent reference declaration ({fields:?})")]
    DuplicateParentReferenceDeclaration { fields: Vec<String> },

    #[error("property `{property}` carries more than one relationship declaration")]
    ConflictingRelationshipDeclaration { property: String },

    #[error("no parent reference declaration (add #[aggrel(parent)] to one field)")]
    MissingParentReferenceDeclaration,
}

/// Raised while building a join, before anything is sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationshipError {
    #[error("property `{property}` on `{type_name}` has neither a local_key nor a foreign_key declaration")]
    UnresolvedRelationship { type_name: &'static str, property: String },

    #[error("unsupported property reference `{reference}`: expected a direct field access")]
    UnsupportedReferenceShape { reference: String },
}

/// Failure reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("duplicate key `{key}` in collection `{collection}`")]
    DuplicateKey { collection: String, key: String },

    #[error("{0}")]
    Backend(String),
}
