//! Runnable walkthroughs against the in-memory store.
//!
//! - ex01: Hierarchy - every descendant of a set of roots
//! - ex02: Path - root-first ancestor chains for a set of leaves
//! - ex03: Joins - local-key and foreign-key relationships, single and collection
//! - ex04: Save - insert-if-new-else-replace helpers
//! - ex05: Settings - TOML configuration and seeded stores

pub mod support;

pub mod ex01_hierarchy;
pub mod ex02_path;
pub mod ex03_joins;
pub mod ex04_save;
pub mod ex05_settings;
