//! Immutable stage sequences and the builders that extend them.

pub mod hierarchy;
pub mod join;
pub mod path;
pub mod stage;

use std::sync::Arc;

use serde_json::Value;

pub use hierarchy::{HierarchyPlan, build_hierarchy};
pub use join::{build_join, join_stages};
pub use path::{PathPlan, build_path};
pub use stage::{GraphLookup, Lookup, Projection, SortOrder, Stage, Unwind};

pub const DEFAULT_INTERNAL_PREFIX: &str = "__aggrel";

/// Append-only sequence of stages.
///
/// Appending copies the stages into a fresh sequence, so a pipeline handed
/// out once can be extended by several continuations independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Arc<[Stage]>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Arc::from(Vec::new()),
        }
    }

    /// A new pipeline holding this one's stages followed by `stage`.
    pub fn then(&self, stage: Stage) -> Self {
        self.extend([stage])
    }

    pub fn extend(&self, stages: impl IntoIterator<Item = Stage>) -> Self {
        let combined: Vec<Stage> = self.stages.iter().cloned().chain(stages).collect();
        Self {
            stages: Arc::from(combined),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn to_documents(&self) -> Vec<Value> {
        self.stages.iter().map(Stage::to_document).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of the scratch fields the hierarchy and path pipelines write into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalFields {
    pub children: String,
    pub depth: String,
}

impl InternalFields {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            children: format!("{prefix}_children"),
            depth: format!("{prefix}_depth"),
        }
    }
}

impl Default for InternalFields {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_INTERNAL_PREFIX)
    }
}

/// Where the reshaper finds things in a flattened result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowShape {
    /// Identifier of the matched record the row belongs to.
    pub key_field: String,
    /// Attached record(s).
    pub record_field: String,
    pub depth_field: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extending_a_shared_prefix_leaves_it_untouched() {
        let prefix = Pipeline::new().then(Stage::Match(json!({"level": 0})));
        let limited = prefix.then(Stage::Limit(1));
        let skipped = prefix.then(Stage::Skip(2));

        assert_eq!(prefix.len(), 1);
        assert_eq!(limited.stages()[1], Stage::Limit(1));
        assert_eq!(skipped.stages()[1], Stage::Skip(2));
    }

    #[test]
    fn internal_fields_follow_prefix() {
        let fields = InternalFields::with_prefix("__x");
        assert_eq!(fields.children, "__x_children");
        assert_eq!(fields.depth, "__x_depth");
        assert_eq!(InternalFields::default().children, "__aggrel_children");
    }
}
