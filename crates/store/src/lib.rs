//! Team record persistence for helpdevil
//!
//! One record per team, keyed by team id. The store is a plain key-value
//! surface (`get` / `save` / `all`) so the bot logic stays agnostic to the
//! backend. Three backends exist:
//! - `SqliteTeamStore` - sqlx/SQLite, records as JSON in a single table
//! - `JsonFileTeamStore` - one JSON file per team in a flat directory
//! - `InMemoryTeamStore` - test fixture and scratch backend

pub mod connection;
pub mod json_file;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod teams;

pub use connection::{connect, connect_with_settings, DbPool};
pub use json_file::JsonFileTeamStore;
pub use memory::InMemoryTeamStore;
pub use sqlite::SqliteTeamStore;
pub use teams::{StoreError, TeamStore};
