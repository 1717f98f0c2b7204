//! Display selection, filtering and sorting of cards.
//!
//! Everything here is a pure function of its inputs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::Card;

/// Sort order for displayed cards
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    DateAsc,
    #[default]
    DateDesc,
    NameAsc,
    NameDesc,
}

/// Filter and sort options applied to a card list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardQuery {
    pub search: Option<String>,
    pub sort: SortMode,
}

impl CardQuery {
    #[must_use]
    pub fn new(search: Option<String>, sort: SortMode) -> Self {
        Self { search, sort }
    }

    /// Filter then sort `cards`.
    #[must_use]
    pub fn apply(&self, cards: Vec<Card>) -> Vec<Card> {
        let mut cards = filter_cards(cards, self.search.as_deref().unwrap_or_default());
        sort_cards(&mut cards, self.sort);
        cards
    }
}

/// Cards to show: the live view while connected, the cache otherwise.
#[must_use]
pub fn select_display_cards(connected: bool, live_view: &[Card], stored: &[Card]) -> Vec<Card> {
    if connected {
        live_view.to_vec()
    } else {
        stored.to_vec()
    }
}

/// Keep cards whose colour name contains `query`, ignoring case.
///
/// A blank query keeps everything.
#[must_use]
pub fn filter_cards(cards: Vec<Card>, query: &str) -> Vec<Card> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return cards;
    }
    cards
        .into_iter()
        .filter(|card| card.colour_name.to_lowercase().contains(&needle))
        .collect()
}

/// Sort in place. Name modes compare case-insensitively and fall back to
/// creation time; the sort is stable.
pub fn sort_cards(cards: &mut [Card], mode: SortMode) {
    match mode {
        SortMode::DateAsc => cards.sort_by_key(|card| card.created_at),
        SortMode::DateDesc => cards.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::NameAsc => cards.sort_by(compare_names),
        SortMode::NameDesc => cards.sort_by(|a, b| compare_names(b, a)),
    }
}

fn compare_names(a: &Card, b: &Card) -> Ordering {
    a.colour_name
        .to_lowercase()
        .cmp(&b.colour_name.to_lowercase())
        .then(a.created_at.cmp(&b.created_at))
}
