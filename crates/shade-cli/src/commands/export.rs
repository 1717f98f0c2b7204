use std::path::Path;

use chrono::Utc;
use shade_core::export::{render_cards_export, suggested_export_file_name};

use crate::cli::ExportFormat;
use crate::commands::common::list_cards;
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let cards = list_cards(db_path).await?;
    let rendered = render_cards_export(&cards, format.into())?;

    let Some(output_path) = output_path else {
        println!("{rendered}");
        return Ok(());
    };

    // a directory target gets a timestamped file inside it
    let target = if output_path.is_dir() {
        output_path.join(suggested_export_file_name(
            format.into(),
            Utc::now().timestamp_millis(),
        ))
    } else {
        output_path.to_path_buf()
    };
    std::fs::write(&target, rendered)?;
    println!("{}", target.display());
    Ok(())
}
