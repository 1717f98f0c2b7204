use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use shade_core::config::ShadeConfig;
use shade_core::connectivity::probe_tcp;
use shade_core::models::format_date;
use shade_core::remote::FirestoreLedger;
use shade_core::{
    Card, CardId, CardStore, ConnectivityMonitor, ConnectivityStatus, EngineState, HexCode,
    IdentitySignal, LibSqlCardStore, SyncEngine, SyncHandle,
};
use tokio::task::JoinHandle;

use crate::error::CliError;

/// How long `add`/`delete` wait for the confirming snapshot.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub type CliSyncHandle = SyncHandle<FirestoreLedger, LibSqlCardStore>;

#[derive(Debug, Serialize)]
pub struct CardListItem {
    pub id: String,
    pub hex_code: String,
    pub colour_name: String,
    pub created_at: i64,
    pub created_at_iso: String,
    pub relative_time: String,
}

pub fn load_config(config_path: Option<&Path>) -> Result<ShadeConfig, CliError> {
    let config = match config_path {
        Some(path) => ShadeConfig::load_file(path).map_err(CliError::Config)?,
        None => ShadeConfig::default(),
    };
    config.with_process_env().map_err(CliError::Config)
}

pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &ShadeConfig,
) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| config.db_path.clone()) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("shade").join("cards.db"))
        .ok_or_else(|| CliError::Config("failed to resolve a data directory; pass --db-path".into()))
}

pub async fn open_store(db_path: &Path) -> Result<LibSqlCardStore, CliError> {
    Ok(LibSqlCardStore::open(db_path).await?)
}

pub async fn list_cards(db_path: &Path) -> Result<Vec<Card>, CliError> {
    let store = open_store(db_path).await?;
    Ok(store.all().await?)
}

pub fn format_card_lines(cards: &[Card]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    cards
        .iter()
        .map(|card| {
            let id = card.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let hex = card.display_hex();
            let relative_time = format_relative_time(card.created_at, now_ms);
            format!(
                "{short_id:<13}  {hex:<9}  {:<28}  {relative_time}",
                card.colour_name
            )
        })
        .collect()
}

pub fn card_to_list_item(card: &Card) -> CardListItem {
    let now_ms = Utc::now().timestamp_millis();
    CardListItem {
        id: card.id.to_string(),
        hex_code: card.hex_code.clone(),
        colour_name: card.colour_name.clone(),
        created_at: card.created_at,
        created_at_iso: format_date(card.created_at),
        relative_time: format_relative_time(card.created_at, now_ms),
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_state_line(state: &EngineState) -> String {
    let user = state
        .user_id
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let phase = format!("{:?}", state.phase);
    format!(
        "{phase:<11}  user={user}  connected={}  cards={}  epoch={}",
        state.connected,
        state.cards.len(),
        state.epoch
    )
}

pub fn normalize_colour_name(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyColourName)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_card_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCardId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Build the card described by `add` arguments: `[HEX] NAME...`.
pub fn card_from_add_args(random: bool, values: &[String]) -> Result<Card, CliError> {
    if random {
        return Ok(Card::random(normalize_colour_name(values)?));
    }

    let Some((hex, name_parts)) = values.split_first() else {
        return Err(CliError::EmptyColourName);
    };
    let hex_code = HexCode::parse(hex)?;
    Ok(Card::new(hex_code, normalize_colour_name(name_parts)?))
}

/// Find a cached card by exact id or unique id prefix.
pub async fn resolve_card(card_query: &str, store: &LibSqlCardStore) -> Result<Card, CliError> {
    if let Ok(card_id) = card_query.parse::<CardId>() {
        if let Some(card) = store.get(&card_id).await? {
            return Ok(card);
        }
    }

    let matches = store.find_by_id_prefix(card_query, 3).await?;
    match matches.as_slice() {
        [] => Err(CliError::CardNotFound(card_query.to_string())),
        [card] => Ok(card.clone()),
        _ => {
            let options = matches
                .iter()
                .map(|card| card.id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousCardId(format!(
                "ID prefix '{card_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// A sync engine wired to Firestore and the local cache.
pub struct RunningEngine {
    pub handle: CliSyncHandle,
    _identity: IdentitySignal,
    _connectivity: ConnectivityMonitor,
    probe: Option<JoinHandle<()>>,
}

impl RunningEngine {
    pub async fn stop(self) {
        self.handle.shutdown().await;
        if let Some(probe) = self.probe {
            probe.abort();
        }
    }

    /// Wait until the engine state satisfies `predicate`; `false` on timeout.
    pub async fn wait_until(&self, predicate: impl FnMut(&EngineState) -> bool) -> bool {
        let mut rx = self.handle.watch_state();
        let confirmed = matches!(
            tokio::time::timeout(CONFIRM_TIMEOUT, rx.wait_for(predicate)).await,
            Ok(Ok(_))
        );
        confirmed
    }
}

pub async fn start_engine(
    config: &ShadeConfig,
    store: LibSqlCardStore,
) -> Result<RunningEngine, CliError> {
    let firestore = config.firestore().ok_or(CliError::SyncNotConfigured)?;
    let user_id = config.user().ok_or(CliError::SyncNotConfigured)?;
    let ledger = FirestoreLedger::new(firestore)?;

    let (connectivity, probe) = match &config.probe_addr {
        Some(probe_addr) => {
            let addr = resolve_probe_addr(probe_addr).await?;
            let monitor = ConnectivityMonitor::new(probe_tcp(addr, PROBE_TIMEOUT).await);
            let probe = monitor.spawn_tcp_probe(addr, config.poll_interval());
            (monitor, Some(probe))
        }
        None => (
            ConnectivityMonitor::new(ConnectivityStatus::online(None)),
            None,
        ),
    };
    let identity = IdentitySignal::new(Some(user_id));

    let handle = SyncEngine::spawn(Arc::new(ledger), Arc::new(store), &identity, &connectivity);
    Ok(RunningEngine {
        handle,
        _identity: identity,
        _connectivity: connectivity,
        probe,
    })
}

async fn resolve_probe_addr(probe_addr: &str) -> Result<std::net::SocketAddr, CliError> {
    tokio::net::lookup_host(probe_addr)
        .await
        .map_err(|error| CliError::ProbeAddress(format!("{probe_addr}: {error}")))?
        .next()
        .ok_or_else(|| CliError::ProbeAddress(probe_addr.to_string()))
}
