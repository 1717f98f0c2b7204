//! shade-core - Core library for ShadeStash
//!
//! Offline-first colour swatch ("card") storage: a durable local card cache,
//! remote ledger clients for the per-user document, connectivity and identity
//! signals, and the sync engine that reconciles them.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod export;
pub mod identity;
pub mod models;
pub mod remote;
pub mod search;
pub mod sync;
pub mod util;

pub use connectivity::{ConnectivityMonitor, ConnectivityStatus, InterfaceKind};
pub use db::{CardStore, LibSqlCardStore, MemoryCardStore};
pub use error::{Error, Result};
pub use identity::IdentitySignal;
pub use models::{Card, CardId, HexCode, UserId};
pub use remote::{RemoteError, RemoteLedger};
pub use search::{CardQuery, SortMode};
pub use sync::{EngineState, SyncEngine, SyncError, SyncHandle, SyncPhase};
