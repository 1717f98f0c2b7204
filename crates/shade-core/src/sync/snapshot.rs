//! Snapshot to card-set transformation.

use std::collections::HashSet;

use crate::models::{Card, UserDocument};
use crate::remote::DocumentSnapshot;

/// Turn a pushed snapshot into the cards it carries, in received order.
///
/// An error snapshot, a missing document and an undecodable document all
/// yield an empty set. Entries with an empty hex code or colour name are
/// dropped. A repeated id keeps its first occurrence.
pub fn cards_from_snapshot(snapshot: &DocumentSnapshot) -> Vec<Card> {
    let fields = match snapshot {
        DocumentSnapshot::Exists(fields) => fields,
        DocumentSnapshot::Missing => {
            tracing::debug!("User document does not exist yet");
            return Vec::new();
        }
        DocumentSnapshot::Failed(error) => {
            tracing::warn!("Subscription reported an error: {}", error);
            return Vec::new();
        }
    };

    let document = match UserDocument::from_fields(fields) {
        Ok(document) => document,
        Err(error) => {
            tracing::warn!("Failed to decode user document: {}", error);
            return Vec::new();
        }
    };

    let received = document.saved_colours.len();
    let mut seen = HashSet::with_capacity(received);
    let mut cards = Vec::with_capacity(received);
    for entry in document.saved_colours {
        let Some(card) = entry.clone().into_card() else {
            tracing::debug!("Dropping invalid card entry: {:?}", entry);
            continue;
        };
        if !seen.insert(card.id.clone()) {
            tracing::debug!("Dropping duplicate card id {}", card.id);
            continue;
        }
        cards.push(card);
    }

    if cards.len() != received {
        tracing::info!(
            "Snapshot carried {} entries, {} usable",
            received,
            cards.len()
        );
    }
    cards
}
