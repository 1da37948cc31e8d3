//! FloodPath monitor: periodic acquisition of water-level and rainfall tables
//! with change detection, durable storage and a rate-limited query API.
//!
//! Module map (EMBP: each module owns one concern and exports a narrow API):
//! - `source`, `retry`, `worker`, `supervisor`: the acquisition side
//! - `fingerprint`, `registry`: change detection and in-memory feed state
//! - `store`, `schema`: the persistence gateway
//! - `query`, `rate_limit`, `health`, `routes`: the read side
//! - `config`, `error`, `models`, `run_flag`: shared plumbing

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod health;
pub mod models;
pub mod query;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod routes;
pub mod run_flag;
pub mod schema;
pub mod source;
pub mod store;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use models::{Feed, Reading, Snapshot};
