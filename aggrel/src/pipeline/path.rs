use log::debug;

use super::{GraphLookup, InternalFields, Pipeline, Projection, RowShape, Stage, Unwind};
use crate::{errors::ConfigurationError, metadata::TypeMetadata};

/// Ancestor-chain pipeline plus the shape of the rows it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlan {
    pub pipeline: Pipeline,
    pub rows: RowShape,
}

/// Extend `source` so it yields one row per (matched record, ancestor) pair.
///
/// The traversal starts at the record's own key, so the record itself is the
/// depth 0 hit and its root has the greatest depth.
pub fn build_path<T>(
    source: &Pipeline,
    metadata: &TypeMetadata<T>,
    fields: &InternalFields,
) -> Result<PathPlan, ConfigurationError> {
    let parent = metadata.require_parent_reference()?;
    let key = metadata.primary_key().field();
    let nested_depth = format!("{}.{}", fields.children, fields.depth);

    let pipeline = source.extend([
        Stage::GraphLookup(GraphLookup {
            from: metadata.collection().to_string(),
            start_with: key.to_string(),
            connect_from_field: parent.field().to_string(),
            connect_to_field: key.to_string(),
            as_field: fields.children.clone(),
            depth_field: Some(fields.depth.clone()),
        }),
        Stage::Unwind(Unwind {
            path: fields.children.clone(),
            preserve_null_and_empty: false,
        }),
        Stage::Project(vec![
            (key.to_string(), Projection::Field(key.to_string())),
            (fields.children.clone(), Projection::Field(fields.children.clone())),
            (fields.depth.clone(), Projection::Field(nested_depth.clone())),
        ]),
        Stage::unset(nested_depth),
    ]);
    debug!(
        "built path pipeline for {} ({} stages)",
        metadata.type_name(),
        pipeline.len()
    );

    Ok(PathPlan {
        pipeline,
        rows: RowShape {
            key_field: key.to_string(),
            record_field: fields.children.clone(),
            depth_field: Some(fields.depth.clone()),
        },
    })
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::{Record, errors::ConfigurationErrorKind, metadata};

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "path-node")]
    struct Node {
        #[aggrel(id)]
        key: String,
        #[aggrel(parent)]
        #[serde(rename = "parentKey")]
        parent_key: String,
    }

    #[derive(Debug, Record, Serialize, Deserialize)]
    #[aggrel(collection = "path-orphan")]
    struct Orphan {
        #[aggrel(id)]
        key: String,
    }

    #[test]
    fn emits_ancestor_traversal_with_depth() {
        let metadata = metadata::resolve::<Node>().expect("metadata");
        let plan = build_path(&Pipeline::new(), &metadata, &InternalFields::with_prefix("__p")).expect("plan");

        assert_eq!(
            plan.pipeline.to_documents(),
            vec![
                json!({"$graphLookup": {
                    "from": "path-node",
                    "startWith": "$key",
                    "connectFromField": "parentKey",
                    "connectToField": "key",
                    "as": "__p_children",
                    "depthField": "__p_depth",
                }}),
                json!({"$unwind": {"path": "$__p_children", "preserveNullAndEmptyArrays": false}}),
                json!({"$project": {
                    "key": "$key",
                    "__p_children": "$__p_children",
                    "__p_depth": "$__p_children.__p_depth",
                }}),
                json!({"$unset": "__p_children.__p_depth"}),
            ]
        );
        assert_eq!(plan.rows.depth_field.as_deref(), Some("__p_depth"));
    }

    #[test]
    fn missing_parent_fails_before_any_stage() {
        let metadata = metadata::resolve::<Orphan>().expect("metadata");
        let err = build_path(&Pipeline::new(), &metadata, &InternalFields::default()).unwrap_err();
        assert_eq!(err.kind, ConfigurationErrorKind::MissingParentReferenceDeclaration);
        assert_eq!(err.type_name, "Orphan");
    }
}
