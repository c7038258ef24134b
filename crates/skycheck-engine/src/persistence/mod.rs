//! SQLite persistence for the airspace store.

pub mod airspaces;
pub mod db;

pub use airspaces::{AirspaceRecord, BorderRecord, StoreStatistics};
pub use db::{init_database, Database};
