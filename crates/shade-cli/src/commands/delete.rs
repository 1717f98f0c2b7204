use std::path::Path;

use shade_core::config::ShadeConfig;

use crate::commands::common::{normalize_card_identifier, open_store, resolve_card, start_engine};
use crate::error::CliError;

pub async fn run_delete(id: &str, config: &ShadeConfig, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_card_identifier(id)?;
    let store = open_store(db_path).await?;
    let card = resolve_card(&normalized_id, &store).await?;
    let engine = start_engine(config, store).await?;

    let result = engine.handle.delete_card(&card).await;
    if result.is_ok()
        && !engine
            .wait_until(|state| {
                state.phase == shade_core::SyncPhase::Live
                    && state.cards.iter().all(|synced| synced.id != card.id)
            })
            .await
    {
        tracing::warn!("Card removed remotely; the local cache will drop it on the next sync");
    }
    engine.stop().await;
    result?;

    println!("{}", card.id);
    Ok(())
}
