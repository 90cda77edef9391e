//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use aggrel::{Client, MemoryStore, Record, id::generate_record_id};
use serde::{Deserialize, Serialize};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh client over an empty store with a unique name.
pub fn client(label: &str) -> Client<MemoryStore> {
    init_logging();
    Client::new(MemoryStore::new(format!("{label}_{}", generate_record_id())))
}

// ============ Tree Records ============

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "tasks")]
pub struct Task {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    pub id: String,
    #[aggrel(parent)]
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
    pub title: String,
}

impl Task {
    pub fn new(id: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            title: format!("task {id}"),
        }
    }
}

/// `roots` trees with `branching` children per node and `depth` levels
/// (roots included). Child ids extend the parent's: `r1`, `r1.3`, `r1.3.7`.
pub fn task_forest(roots: usize, branching: usize, depth: usize) -> Vec<Task> {
    let mut tasks: Vec<Task> = (1..=roots).map(|root| Task::new(&format!("r{root}"), None)).collect();
    let mut level: Vec<String> = tasks.iter().map(|task| task.id.clone()).collect();
    for _ in 1..depth {
        let mut next = Vec::new();
        for parent in &level {
            for child in 1..=branching {
                let id = format!("{parent}.{child}");
                tasks.push(Task::new(&id, Some(parent)));
                next.push(id);
            }
        }
        level = next;
    }
    tasks
}

/// Parent of every task, by id.
pub fn parents(tasks: &[Task]) -> HashMap<String, Option<String>> {
    tasks.iter().map(|task| (task.id.clone(), task.parent_id.clone())).collect()
}

/// Whether `ancestor` is reachable from `id` by following parents.
pub fn descends_from(parents: &HashMap<String, Option<String>>, id: &str, ancestor: &str) -> bool {
    let mut current = parents.get(id).cloned().flatten();
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        current = parents.get(&parent).cloned().flatten();
    }
    false
}

// ============ Join Records ============

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "users")]
pub struct User {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    pub id: String,
    pub login: String,
    /// Back-reference used by foreign-key joins.
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
}

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "request_details")]
pub struct RequestDetail {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
    pub note: String,
}
