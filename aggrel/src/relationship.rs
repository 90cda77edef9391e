use std::{borrow::Cow, fmt, marker::PhantomData, sync::OnceLock};

use regex::Regex;

use crate::{
    errors::{PipelineError, RelationshipError},
    metadata::{self, RelationshipField},
    types::{Cardinality, Record},
};

/// Typed reference to a property of the view type `V`.
///
/// Build one with [`prop!`](crate::prop). Only a direct field access
/// (`prop!(RequestJoined, user)`) can be joined; anything longer
/// (`prop!(RequestJoined, user.login)`) is rejected with
/// [`RelationshipError::UnsupportedReferenceShape`] when the join is built.
pub struct PropertyRef<V> {
    expression: Cow<'static, str>,
    _view: PhantomData<fn() -> V>,
}

impl<V> PropertyRef<V> {
    /// Reference parsed from source text, e.g. `"user"` or `"user.login"`.
    pub fn new(expression: impl Into<Cow<'static, str>>) -> Self {
        Self {
            expression: expression.into(),
            _view: PhantomData,
        }
    }

    /// Reference assembled from path segments by the `prop!` macro.
    pub fn from_segments(segments: &[&str]) -> Self {
        Self::new(segments.join("."))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The single property name this reference denotes, without a raw-identifier prefix.
    pub fn property_name(&self) -> Result<&str, RelationshipError> {
        let expression = self.expression.trim();
        if direct_access().is_match(expression) {
            Ok(expression.trim_start_matches("r#"))
        } else {
            Err(RelationshipError::UnsupportedReferenceShape {
                reference: self.expression.to_string(),
            })
        }
    }
}

impl<V> Clone for PropertyRef<V> {
    fn clone(&self) -> Self {
        Self::new(self.expression.clone())
    }
}

impl<V> fmt::Debug for PropertyRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyRef").field(&self.expression).finish()
    }
}

fn direct_access() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:r#)?[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
}

/// Build a [`PropertyRef`] to a field of a view type.
///
/// ```text
/// prop!(RequestJoined, user)            // direct field, checked at compile time
/// prop!(RequestJoined, user.login)      // compiles, rejected when joined
/// ```
#[macro_export]
macro_rules! prop {
    ($view:ty, $field:ident) => {{
        let _ = |view: &$view| {
            let _ = &view.$field;
        };
        $crate::relationship::PropertyRef::<$view>::from_segments(&[stringify!($field)])
    }};
    ($view:ty, $($segment:tt)+) => {
        $crate::relationship::PropertyRef::<$view>::new(stringify!($($segment)+))
    };
}

/// A classified relationship ready to be turned into stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipDescriptor {
    /// The source record holds the related identifier(s).
    LocalKey(RelationshipLink),
    /// The related records hold a back-reference to the source.
    ForeignKey(RelationshipLink),
}

impl RelationshipDescriptor {
    pub fn link(&self) -> &RelationshipLink {
        match self {
            RelationshipDescriptor::LocalKey(link) | RelationshipDescriptor::ForeignKey(link) => link,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.link().cardinality
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipLink {
    pub property: String,
    /// Document field the related records are attached under.
    pub output_field: String,
    /// Declared linking field (on the source for local keys, on the related type for foreign keys).
    pub link_field: String,
    /// Primary key of the source view type.
    pub source_key: String,
    pub related_collection: String,
    pub related_key: String,
    pub cardinality: Cardinality,
}

/// Classify `property` on the view type `V`.
///
/// Descriptors are rebuilt on every call; only the underlying type metadata
/// is cached.
pub fn resolve_relationship<V: Record>(property: &PropertyRef<V>) -> Result<RelationshipDescriptor, PipelineError> {
    let name = property.property_name()?;
    let metadata = metadata::resolve::<V>()?;
    let source_key = metadata.primary_key().field();

    if let Some(field) = metadata.local_keys().get(name) {
        return Ok(RelationshipDescriptor::LocalKey(link(field, source_key)?));
    }
    if let Some(field) = metadata.foreign_keys().get(name) {
        return Ok(RelationshipDescriptor::ForeignKey(link(field, source_key)?));
    }

    Err(RelationshipError::UnresolvedRelationship {
        type_name: metadata.type_name(),
        property: name.to_string(),
    }
    .into())
}

fn link(field: &RelationshipField, source_key: &str) -> Result<RelationshipLink, PipelineError> {
    let target = (field.related.resolve)()?;
    Ok(RelationshipLink {
        property: field.property.clone(),
        output_field: field.document_field.clone(),
        link_field: field.link.clone(),
        source_key: source_key.to_string(),
        related_collection: target.collection,
        related_key: target.primary_key,
        cardinality: field.related.cardinality,
    })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        Record,
        pipeline::{Pipeline, build_join},
    };

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "rel-bank")]
    struct Bank {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "rel-bid")]
    struct Bid {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
        request_id: String,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "rel-request")]
    struct RequestJoined {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
        #[aggrel(local_key = "offer.bank_id")]
        #[serde(rename = "offerBank")]
        offer_bank: Option<Bank>,
        #[aggrel(foreign_key = "request_id")]
        bids: Vec<Bid>,
        note: String,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "rel-item")]
    struct Item {
        #[aggrel(id)]
        #[serde(rename = "_id")]
        id: String,
        #[aggrel(local_key = "type_id")]
        r#type: Option<Bank>,
    }

    #[test]
    fn raw_identifier_reference_resolves() {
        let reference = prop!(Item, r#type);
        assert_eq!(reference.property_name(), Ok("type"));

        let descriptor = resolve_relationship(&reference).expect("descriptor");
        let RelationshipDescriptor::LocalKey(link) = descriptor else {
            panic!("expected local key, got {descriptor:?}");
        };
        assert_eq!(link.property, "type");
        assert_eq!(link.output_field, "type");
        assert_eq!(link.link_field, "type_id");
        assert_eq!(link.related_collection, "rel-bank");

        let joined = build_join(&Pipeline::new(), &[prop!(Item, r#type)]).expect("join");
        let stages = joined.to_documents();
        assert_eq!(stages[0]["$lookup"]["as"], "type");
        assert_eq!(stages[1]["$unwind"]["path"], "$type");
    }

    #[test]
    fn direct_field_reference_resolves_name() {
        let reference = prop!(RequestJoined, bids);
        assert_eq!(reference.property_name(), Ok("bids"));
    }

    #[test]
    fn nested_reference_is_rejected() {
        let reference = prop!(RequestJoined, offer_bank.id);
        let err = reference.property_name().unwrap_err();
        assert!(matches!(err, RelationshipError::UnsupportedReferenceShape { .. }));
    }

    #[test]
    fn method_call_reference_is_rejected() {
        let reference = PropertyRef::<RequestJoined>::new("note.to_lowercase()");
        assert!(reference.property_name().is_err());
    }

    #[test]
    fn local_key_descriptor_points_at_related_primary_key() {
        let descriptor = resolve_relationship(&prop!(RequestJoined, offer_bank)).expect("descriptor");
        let RelationshipDescriptor::LocalKey(link) = descriptor else {
            panic!("expected local key, got {descriptor:?}");
        };
        assert_eq!(link.output_field, "offerBank");
        assert_eq!(link.link_field, "offer.bank_id");
        assert_eq!(link.related_collection, "rel-bank");
        assert_eq!(link.related_key, "_id");
        assert_eq!(link.cardinality, Cardinality::Single);
    }

    #[test]
    fn foreign_key_descriptor_uses_collection_element_type() {
        let descriptor = resolve_relationship(&prop!(RequestJoined, bids)).expect("descriptor");
        let RelationshipDescriptor::ForeignKey(link) = descriptor else {
            panic!("expected foreign key, got {descriptor:?}");
        };
        assert_eq!(link.source_key, "_id");
        assert_eq!(link.link_field, "request_id");
        assert_eq!(link.related_collection, "rel-bid");
        assert_eq!(link.cardinality, Cardinality::Collection);
    }

    #[test]
    fn undeclared_property_is_unresolved() {
        let err = resolve_relationship(&prop!(RequestJoined, note)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Relationship(RelationshipError::UnresolvedRelationship { ref property, .. })
                if property == "note"
        ));
    }
}
