use std::path::Path;

use shade_core::{CardQuery, SortMode};

use crate::commands::common::{card_to_list_item, format_card_lines, list_cards, CardListItem};
use crate::error::CliError;

pub async fn run_list(
    search: Option<&str>,
    sort: SortMode,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let query = CardQuery::new(search.map(ToString::to_string), sort);
    let cards = query.apply(list_cards(db_path).await?);

    if as_json {
        let json_items = cards
            .iter()
            .map(card_to_list_item)
            .collect::<Vec<CardListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_card_lines(&cards) {
            println!("{line}");
        }
    }

    Ok(())
}
