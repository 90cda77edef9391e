use serde::{Deserialize, Serialize};

use crate::{Client, MemoryStore, Record, id::generate_record_id};

/// A node of an organisational tree.
#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "example_groups")]
pub struct Group {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    pub id: String,
    #[aggrel(parent)]
    pub parent_id: Option<String>,
    pub name: String,
}

impl Group {
    pub fn new(id: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: format!("group {id}"),
        }
    }
}

/// `branching` children per node, `depth` levels including the roots.
///
/// Ids encode the position: root `g1`, its children `g1.1` .. `g1.{branching}`.
pub fn forest(roots: usize, branching: usize, depth: usize) -> Vec<Group> {
    let mut groups: Vec<Group> = (1..=roots).map(|root| Group::new(&format!("g{root}"), None)).collect();
    let mut level: Vec<String> = groups.iter().map(|group| group.id.clone()).collect();
    for _ in 1..depth {
        let mut next = Vec::with_capacity(level.len() * branching);
        for parent in &level {
            for child in 1..=branching {
                let id = format!("{parent}.{child}");
                groups.push(Group::new(&id, Some(parent)));
                next.push(id);
            }
        }
        level = next;
    }
    groups
}

/// Fresh client over an empty, uniquely named store.
pub fn client(label: &str) -> Client<MemoryStore> {
    let salt = generate_record_id();
    Client::new(MemoryStore::new(format!("aggrel_example_{label}_{}", &salt[..8])))
}
