use std::path::Path;

use shade_core::config::ShadeConfig;

use crate::commands::common::{format_state_line, open_store, start_engine};
use crate::error::CliError;

pub async fn run_watch(config: &ShadeConfig, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let engine = start_engine(config, store).await?;
    let mut state = engine.handle.watch_state();
    println!("{}", format_state_line(&state.borrow_and_update()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = format_state_line(&state.borrow_and_update());
                println!("{line}");
            }
        }
    }

    engine.stop().await;
    Ok(())
}
