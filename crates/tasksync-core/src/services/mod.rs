//! Client-facing services built on the database layer

mod database;

pub use database::DatabaseService;
