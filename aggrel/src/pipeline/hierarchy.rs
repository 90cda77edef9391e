use log::debug;

use super::{GraphLookup, InternalFields, Pipeline, Projection, RowShape, Stage};
use crate::{errors::ConfigurationError, metadata::TypeMetadata};

/// Descendant-closure pipeline plus the shape of the rows it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyPlan {
    pub pipeline: Pipeline,
    pub rows: RowShape,
}

/// Extend `source` so every matched record gains the full set of records
/// below it, following parent references downward.
///
/// No depth limit and no cycle guard: the parent graph must be a forest.
pub fn build_hierarchy<T>(
    source: &Pipeline,
    metadata: &TypeMetadata<T>,
    fields: &InternalFields,
) -> Result<HierarchyPlan, ConfigurationError> {
    let parent = metadata.require_parent_reference()?;
    let key = metadata.primary_key().field();

    let pipeline = source.extend([
        Stage::GraphLookup(GraphLookup {
            from: metadata.collection().to_string(),
            start_with: key.to_string(),
            connect_from_field: key.to_string(),
            connect_to_field: parent.field().to_string(),
            as_field: fields.children.clone(),
            depth_field: None,
        }),
        Stage::Project(vec![
            (key.to_string(), Projection::Field(key.to_string())),
            (fields.children.clone(), Projection::Field(fields.children.clone())),
        ]),
    ]);
    debug!(
        "built hierarchy pipeline for {} ({} stages)",
        metadata.type_name(),
        pipeline.len()
    );

    Ok(HierarchyPlan {
        pipeline,
        rows: RowShape {
            key_field: key.to_string(),
            record_field: fields.children.clone(),
            depth_field: None,
        },
    })
}
