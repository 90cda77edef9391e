//! Example 01: Hierarchy
//!
//! `get_hierarchy` follows parent references downward from every matched
//! record and returns each one's full set of descendants.

use anyhow::Result;
use serde_json::json;

use super::support::{self, Group};

pub async fn run() -> Result<()> {
    let client = support::client("hierarchy");
    let groups = client.collection::<Group>()?;
    groups.insert_many_async(&support::forest(2, 3, 3)).await?;

    // Every root: 3 children + 9 grandchildren each.
    let roots = groups.aggregate().match_filter(json!({"parent_id": null}));
    let tree = roots.get_hierarchy_async().await?;
    assert_eq!(tree.len(), 2, "one entry per matched root");
    for (root, descendants) in &tree {
        assert_eq!(descendants.len(), 12, "root {root} has 12 descendants");
        assert!(descendants.iter().all(|group| &group.id != root), "root excluded");
    }

    // A subtree: match an inner node instead of a root.
    let subtree = groups.aggregate().match_keys(["g1.2"])?.get_hierarchy()?;
    let mut ids: Vec<_> = subtree["g1.2"].iter().map(|group| group.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["g1.2.1", "g1.2.2", "g1.2.3"]);

    // Leaves are keyed too, with nothing below them.
    let leaf = groups.aggregate().match_keys(["g2.3.3"])?.get_hierarchy()?;
    assert!(leaf["g2.3.3"].is_empty());

    Ok(())
}
