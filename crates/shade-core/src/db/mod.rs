//! Local card cache

mod card_store;
mod connection;
mod migrations;

pub use card_store::{CardStore, LibSqlCardStore, MemoryCardStore};
pub use connection::Database;
