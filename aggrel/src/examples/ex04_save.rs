//! Example 04: Save
//!
//! Records without an id are inserted with a generated one; records with an
//! id replace what is stored under it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::support;
use crate::Record;

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "example_tasks")]
struct Task {
    #[aggrel(id)]
    #[serde(rename = "_id", default)]
    id: String,
    title: String,
    done: bool,
}

fn task(title: &str) -> Task {
    Task {
        id: String::new(),
        title: title.to_string(),
        done: false,
    }
}

pub async fn run() -> Result<()> {
    let client = support::client("save");
    let tasks = client.collection::<Task>()?;

    let mut first = tasks.save_one(task("write docs"))?;
    assert!(!first.id.is_empty(), "id assigned on insert");

    first.done = true;
    let batch = tasks
        .save_many_async(vec![first.clone(), task("review"), task("release")])
        .await?;
    assert_eq!(batch[0].id, first.id, "existing id kept");

    let done = tasks.find(json!({"done": true})).to_list()?;
    assert_eq!(done, vec![first]);

    let open = tasks.find(json!({"done": false})).limit(1).to_list_async().await?;
    assert_eq!(open.len(), 1);

    tasks.drop_collection()?;
    assert!(tasks.find_all().to_list()?.is_empty());

    Ok(())
}
