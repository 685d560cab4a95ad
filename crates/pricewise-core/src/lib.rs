//! Core types and trait definitions for Pricewise: pricing decisions, their
//! scenarios and outcomes, and the learning loop built on them.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod context;
pub mod decision;
pub mod delta;
pub mod episode;
pub mod error;
pub mod learning;
pub mod ledger;
pub mod outcome;
pub mod scenario;
pub mod status;
pub mod store;
pub mod verdict;

pub use delta::compute_scenario_delta;
pub use episode::derive_episode_status;
pub use error::{Classify, Error, ErrorKind, Result};
pub use learning::compute_learning_aggregates;
