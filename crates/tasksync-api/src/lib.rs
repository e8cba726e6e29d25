//! tasksync-api - reference remote authority for tasksync clients
//!
//! Holds the authoritative task set in memory and answers the health probe
//! and batch exchange that `tasksync-core` speaks.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;
