//! Example 05: Settings
//!
//! A TOML file names the internal field prefix and the documents to seed the
//! in-memory store with. Seed paths may use `${VAR}` and resolve relative to
//! the settings file.

use std::fs;

use anyhow::Result;
use serde_json::json;

use super::support::{self, Group};
use crate::{Client, MemoryStore, Settings};

pub async fn run() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("aggrel_example_settings_{}", &crate::id::generate_record_id()[..8]));
    fs::create_dir_all(&dir)?;

    let groups: Vec<_> = support::forest(1, 2, 2)
        .into_iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    fs::write(dir.join("groups.json"), serde_json::to_string(&groups)?)?;
    fs::write(
        dir.join("aggrel.toml"),
        r#"
[pipeline]
internal_prefix = "__example"

[store]
name = "seeded"
[[store.seed]]
collection = "example_groups"
path = "groups.json"
"#,
    )?;

    let settings = Settings::load(dir.join("aggrel.toml"))?;
    let store = MemoryStore::from_settings(&settings.store)?;
    assert_eq!(store.name(), "seeded");

    let client = Client::with_settings(store, settings);
    let plan = client
        .collection::<Group>()?
        .aggregate()
        .match_filter(json!({"parent_id": null}));
    let tree = plan.get_hierarchy()?;
    assert_eq!(tree["g1"].len(), 2);

    fs::remove_dir_all(&dir)?;
    Ok(())
}
