//! Card export rendering.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{format_date, Card};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable card representation used in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCard {
    pub id: String,
    pub hex_code: String,
    pub colour_name: String,
    pub created_at: String,
}

impl From<&Card> for ExportCard {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.to_string(),
            hex_code: card.display_hex(),
            colour_name: card.colour_name.clone(),
            created_at: format_date(card.created_at),
        }
    }
}

/// Render cards as pretty-printed JSON.
pub fn render_json_export(cards: &[Card]) -> serde_json::Result<String> {
    let items = cards.iter().map(ExportCard::from).collect::<Vec<_>>();
    serde_json::to_string_pretty(&items)
}

/// Render cards as a Markdown table.
#[must_use]
pub fn render_markdown_export(cards: &[Card]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| Colour | Hex | Created | Id |");
    let _ = writeln!(output, "| --- | --- | --- | --- |");

    for card in cards {
        let item = ExportCard::from(card);
        let _ = writeln!(
            output,
            "| {} | `{}` | {} | {} |",
            escape_cell(&item.colour_name),
            item.hex_code,
            item.created_at,
            item.id
        );
    }

    output
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Render cards in the selected format.
pub fn render_cards_export(cards: &[Card], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(cards),
        ExportFormat::Markdown => Ok(render_markdown_export(cards)),
    }
}

/// Build a deterministic default file name for exports.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("shade-export-{timestamp_ms}.{}", format.extension())
}
