use log::debug;

use super::{Lookup, Pipeline, Stage, Unwind};
use crate::{
    errors::PipelineError,
    relationship::{PropertyRef, RelationshipDescriptor, resolve_relationship},
    types::{Cardinality, Record},
};

/// Extend `source` with one lookup per property, in the order given.
///
/// Every property is resolved before the first stage is appended, so a bad
/// reference anywhere in the list leaves no partial pipeline behind.
pub fn build_join<V: Record>(source: &Pipeline, properties: &[PropertyRef<V>]) -> Result<Pipeline, PipelineError> {
    let descriptors = properties
        .iter()
        .map(resolve_relationship)
        .collect::<Result<Vec<_>, _>>()?;

    let pipeline = source.extend(descriptors.iter().flat_map(join_stages));
    debug!(
        "built join pipeline for {} ({} properties, {} stages)",
        std::any::type_name::<V>(),
        descriptors.len(),
        pipeline.len()
    );
    Ok(pipeline)
}

/// Stages attaching the related records of one relationship.
pub fn join_stages(descriptor: &RelationshipDescriptor) -> Vec<Stage> {
    let lookup = match descriptor {
        RelationshipDescriptor::LocalKey(link) => Lookup {
            from: link.related_collection.clone(),
            local_field: link.link_field.clone(),
            foreign_field: link.related_key.clone(),
            as_field: link.output_field.clone(),
        },
        RelationshipDescriptor::ForeignKey(link) => Lookup {
            from: link.related_collection.clone(),
            local_field: link.source_key.clone(),
            foreign_field: link.link_field.clone(),
            as_field: link.output_field.clone(),
        },
    };

    let mut stages = vec![Stage::Lookup(lookup)];
    if descriptor.cardinality() == Cardinality::Single {
        stages.push(Stage::Unwind(Unwind {
            path: descriptor.link().output_field.clone(),
            preserve_null_and_empty: true,
        }));
    }
    stages
}
