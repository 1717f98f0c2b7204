//! Durable card cache

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use libsql::params;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Card, CardId};

/// A change staged by `insert`/`delete` and applied by `save`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingChange {
    Insert(Card),
    Delete(CardId),
}

/// Local card cache.
///
/// `insert` and `delete` only stage changes; `save` commits everything staged
/// since the last `save` atomically. A failed `save` discards the staged
/// changes and leaves the committed contents untouched.
pub trait CardStore: Send + Sync {
    /// Stage a card for insertion (replacing any card with the same id).
    fn insert(&self, card: &Card);

    /// Stage removal of the card with `card.id`.
    fn delete(&self, card: &Card);

    /// Committed cards, in insertion order.
    fn all(&self) -> impl Future<Output = Result<Vec<Card>>> + Send;

    /// Commit staged changes.
    fn save(&self) -> impl Future<Output = Result<()>> + Send;

    /// Swap the committed contents for exactly `cards` in one commit.
    ///
    /// Staged changes are neither applied nor consumed. On failure the
    /// committed contents are untouched.
    fn replace_all(&self, cards: &[Card]) -> impl Future<Output = Result<()>> + Send;
}

fn take_pending(pending: &Mutex<Vec<PendingChange>>) -> Vec<PendingChange> {
    std::mem::take(&mut *pending.lock().unwrap_or_else(PoisonError::into_inner))
}

fn push_pending(pending: &Mutex<Vec<PendingChange>>, change: PendingChange) {
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(change);
}

/// libSQL implementation of `CardStore`
#[derive(Clone)]
pub struct LibSqlCardStore {
    db: Arc<tokio::sync::Mutex<Database>>,
    pending: Arc<Mutex<Vec<PendingChange>>>,
}

impl LibSqlCardStore {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(tokio::sync::Mutex::new(db)),
            pending: Arc::default(),
        }
    }

    /// Open (or create) the cache at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory cache (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// Look up a committed card by id
    pub async fn get(&self, id: &CardId) -> Result<Option<Card>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, hex_code, colour_name, created_at FROM cards WHERE id = ?1",
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_card(&row)?)),
            None => Ok(None),
        }
    }

    /// Committed cards whose id starts with `prefix`, up to `limit`
    pub async fn find_by_id_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Card>> {
        let cards = self.all().await?;
        Ok(cards
            .into_iter()
            .filter(|card| card.id.as_str().starts_with(prefix))
            .take(limit)
            .collect())
    }

    fn parse_card(row: &libsql::Row) -> Result<Card> {
        let id: String = row.get(0)?;
        // stored ids are remote data and come back verbatim
        Ok(Card {
            id: CardId::from(id.as_str()),
            hex_code: row.get(1)?,
            colour_name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    async fn insert_row(conn: &libsql::Connection, card: &Card) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO cards (id, hex_code, colour_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                card.id.to_string(),
                card.hex_code.clone(),
                card.colour_name.clone(),
                card.created_at
            ],
        )
        .await?;
        Ok(())
    }

    async fn apply(conn: &libsql::Connection, change: &PendingChange) -> Result<()> {
        match change {
            PendingChange::Insert(card) => Self::insert_row(conn, card).await,
            PendingChange::Delete(id) => {
                conn.execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])
                    .await?;
                Ok(())
            }
        }
    }

    async fn swap_rows(conn: &libsql::Connection, cards: &[Card]) -> Result<()> {
        conn.execute("DELETE FROM cards", ()).await?;
        for card in cards {
            Self::insert_row(conn, card).await?;
        }
        Ok(())
    }
}

impl CardStore for LibSqlCardStore {
    fn insert(&self, card: &Card) {
        push_pending(&self.pending, PendingChange::Insert(card.clone()));
    }

    fn delete(&self, card: &Card) {
        push_pending(&self.pending, PendingChange::Delete(card.id.clone()));
    }

    async fn all(&self) -> Result<Vec<Card>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, hex_code, colour_name, created_at FROM cards ORDER BY rowid ASC",
                (),
            )
            .await?;

        let mut cards = Vec::new();
        while let Some(row) = rows.next().await? {
            cards.push(Self::parse_card(&row)?);
        }
        Ok(cards)
    }

    async fn save(&self) -> Result<()> {
        let pending = take_pending(&self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;

        for change in &pending {
            if let Err(e) = Self::apply(conn, change).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::debug!("Committed {} staged card changes", pending.len());
        Ok(())
    }

    async fn replace_all(&self, cards: &[Card]) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = Self::swap_rows(conn, cards).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }
        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::debug!("Replaced card cache with {} cards", cards.len());
        Ok(())
    }
}

/// Non-persistent `CardStore` with the same staging semantics.
#[derive(Clone, Default)]
pub struct MemoryCardStore {
    committed: Arc<Mutex<Vec<Card>>>,
    pending: Arc<Mutex<Vec<PendingChange>>>,
    fail_saves: Arc<Mutex<usize>>,
}

impl MemoryCardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits (`save` or `replace_all`) fail.
    pub fn fail_next_saves(&self, count: usize) {
        *self.fail_saves.lock().unwrap_or_else(PoisonError::into_inner) = count;
    }

    fn take_injected_failure(&self) -> Result<()> {
        let mut failures = self.fail_saves.lock().unwrap_or_else(PoisonError::into_inner);
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::Database("simulated save failure".into()));
        }
        Ok(())
    }
}

impl CardStore for MemoryCardStore {
    fn insert(&self, card: &Card) {
        push_pending(&self.pending, PendingChange::Insert(card.clone()));
    }

    fn delete(&self, card: &Card) {
        push_pending(&self.pending, PendingChange::Delete(card.id.clone()));
    }

    async fn all(&self) -> Result<Vec<Card>> {
        Ok(self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self) -> Result<()> {
        let pending = take_pending(&self.pending);
        self.take_injected_failure()?;

        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        for change in pending {
            match change {
                PendingChange::Insert(card) => {
                    committed.retain(|existing| existing.id != card.id);
                    committed.push(card);
                }
                PendingChange::Delete(id) => committed.retain(|existing| existing.id != id),
            }
        }
        Ok(())
    }

    async fn replace_all(&self, cards: &[Card]) -> Result<()> {
        self.take_injected_failure()?;
        let mut committed = self.committed.lock().unwrap_or_else(PoisonError::into_inner);
        committed.clear();
        for card in cards {
            committed.retain(|existing| existing.id != card.id);
            committed.push(card.clone());
        }
        Ok(())
    }
}
