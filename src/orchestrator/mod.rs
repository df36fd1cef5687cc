//! Provider orchestration: concurrent fan-out, dedup, rank.
//!
//! # Pipeline
//!
//! 1. [`Orchestrator::resolve`] turns a [`Selection`] into providers
//! 2. [`FanoutExecutor::run`] calls them concurrently under one deadline
//! 3. [`aggregate`] merges successful records by identity key
//! 4. records are sorted by confidence and truncated

pub mod dedup;
pub mod facade;
pub mod fanout;
pub mod identity;

pub use dedup::{aggregate, merge_records};
pub use facade::{Orchestration, Orchestrator, Selection};
pub use fanout::FanoutExecutor;
pub use identity::{identity_key, normalize_domain, normalize_name};
