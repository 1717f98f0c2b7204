use std::path::Path;

use shade_core::config::ShadeConfig;

use crate::commands::common::{card_from_add_args, open_store, start_engine};
use crate::error::CliError;

pub async fn run_add(
    random: bool,
    values: &[String],
    config: &ShadeConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let card = card_from_add_args(random, values)?;
    let store = open_store(db_path).await?;
    let engine = start_engine(config, store).await?;

    let result = engine.handle.add_card(&card).await;
    if result.is_ok()
        && !engine
            .wait_until(|state| state.cards.iter().any(|synced| synced.id == card.id))
            .await
    {
        tracing::warn!("Card saved remotely; the local cache will pick it up on the next sync");
    }
    engine.stop().await;
    result?;

    println!("{}", card.id);
    Ok(())
}
