//! Example 02: Path
//!
//! `get_path` walks parent references upward and returns, per matched
//! record, the chain from its root down to the record itself.

use anyhow::Result;

use super::support::{self, Group};

pub async fn run() -> Result<()> {
    let client = support::client("path");
    let groups = client.collection::<Group>()?;
    groups.insert_many(&support::forest(1, 2, 4))?;

    let paths = groups
        .aggregate()
        .match_keys(["g1.2.1.2", "g1.1"])?
        .get_path_async()
        .await?;

    let chain: Vec<_> = paths["g1.2.1.2"].iter().map(|group| group.id.as_str()).collect();
    assert_eq!(chain, ["g1", "g1.2", "g1.2.1", "g1.2.1.2"]);

    let first = &paths["g1.1"];
    assert_eq!(first.first().map(|group| group.parent_id.is_none()), Some(true), "root first");
    assert_eq!(first.last().map(|group| group.id.as_str()), Some("g1.1"), "record last");

    // A root's path is just the root.
    let root = groups.aggregate().match_keys(["g1"])?.get_path()?;
    assert_eq!(root["g1"].len(), 1);

    Ok(())
}
