//! SQLite server store for Horizon.
//!
//! Persists the `Servers` table and serves it to the real-time core as
//! full snapshots.

mod schema;
mod store;
mod value;

pub use store::SqliteServerStore;
