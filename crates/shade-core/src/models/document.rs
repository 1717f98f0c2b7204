//! Wire shape of the remote `Users/{userId}` document.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Card, CardId};

/// Field of the user document holding the card array.
pub const SAVED_COLOURS_FIELD: &str = "savedColours";

/// One element of the `savedColours` array.
///
/// Missing `hexCode`/`colourName` decode as empty strings so the entry can be
/// dropped individually; a missing `id` or unreadable `date` fails the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCard {
    pub id: String,
    #[serde(default)]
    pub hex_code: String,
    #[serde(default)]
    pub colour_name: String,
    /// Unix ms
    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: i64,
}

impl RemoteCard {
    /// Convert into a local card, or `None` if the entry is not usable.
    #[must_use]
    pub fn into_card(self) -> Option<Card> {
        let card = Card {
            id: CardId::from(self.id.as_str()),
            hex_code: self.hex_code,
            colour_name: self.colour_name,
            created_at: self.date,
        };
        (card.is_valid() && !card.id.as_str().is_empty()).then_some(card)
    }
}

impl From<&Card> for RemoteCard {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.to_string(),
            hex_code: card.hex_code.clone(),
            colour_name: card.colour_name.clone(),
            date: card.created_at,
        }
    }
}

/// The per-user aggregate. Other top-level fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "savedColours", default)]
    pub saved_colours: Vec<RemoteCard>,
}

impl UserDocument {
    /// Decode the plain-JSON field data carried by a snapshot.
    pub fn from_fields(fields: &serde_json::Value) -> serde_json::Result<Self> {
        Self::deserialize(fields)
    }
}

/// RFC 3339 with millisecond precision, always UTC.
#[must_use]
pub fn format_date(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Parse an RFC 3339 timestamp into Unix ms.
pub fn parse_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|date_time| date_time.timestamp_millis())
}

/// Out-of-range timestamps are written as numeric Unix ms so they still decode.
fn serialize_date<S: Serializer>(timestamp_ms: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    if DateTime::from_timestamp_millis(*timestamp_ms).is_some() {
        serializer.serialize_str(&format_date(*timestamp_ms))
    } else {
        serializer.serialize_i64(*timestamp_ms)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireDate {
    Text(String),
    Millis(i64),
    Fractional(f64),
}

fn deserialize_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match WireDate::deserialize(deserializer)? {
        WireDate::Text(text) => parse_date(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC 3339 date '{text}'"))),
        WireDate::Millis(millis) => Ok(millis),
        #[allow(clippy::cast_possible_truncation)]
        WireDate::Fractional(millis) if millis.is_finite() => Ok(millis as i64),
        WireDate::Fractional(_) => Err(serde::de::Error::custom("date is not a finite number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_rfc3339_and_numeric_dates() {
        let doc = UserDocument::from_fields(&json!({
            "savedColours": [
                {"id": "A", "hexCode": "FF0000", "colourName": "Red", "date": "2025-08-14T10:00:00.000Z"},
                {"id": "B", "hexCode": "00FF00", "colourName": "Green", "date": 1_755_165_600_000_i64}
            ]
        }))
        .unwrap();

        assert_eq!(doc.saved_colours.len(), 2);
        assert_eq!(doc.saved_colours[0].date, 1_755_165_600_000);
        assert_eq!(doc.saved_colours[1].date, 1_755_165_600_000);
    }

    #[test]
    fn date_round_trips_through_wire_format() {
        let card = Card {
            id: CardId::from("A"),
            hex_code: "FF0000".to_string(),
            colour_name: "Red".to_string(),
            created_at: 1_755_165_600_123,
        };
        let encoded = serde_json::to_value(RemoteCard::from(&card)).unwrap();
        assert_eq!(encoded["date"], json!("2025-08-14T10:00:00.123Z"));

        let decoded: RemoteCard = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.into_card(), Some(card));
    }

    #[test]
    fn unrepresentable_date_round_trips_as_millis() {
        let card = Card {
            id: CardId::from("A"),
            hex_code: "FF0000".to_string(),
            colour_name: "Red".to_string(),
            created_at: i64::MAX,
        };
        let encoded = serde_json::to_value(RemoteCard::from(&card)).unwrap();
        assert_eq!(encoded["date"], json!(i64::MAX));

        let decoded: RemoteCard = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.into_card(), Some(card));
    }

    #[test]
    fn only_an_empty_id_is_unusable() {
        let entry = |id: &str| RemoteCard {
            id: id.to_string(),
            hex_code: "FF0000".to_string(),
            colour_name: "Red".to_string(),
            date: 0,
        };
        assert!(entry("").into_card().is_none());
        assert_eq!(entry("   ").into_card().unwrap().id.as_str(), "   ");
        assert_eq!(entry(" A").into_card().unwrap().id.as_str(), " A");
    }

    #[test]
    fn missing_saved_colours_is_empty() {
        let doc = UserDocument::from_fields(&json!({"displayName": "someone"})).unwrap();
        assert!(doc.saved_colours.is_empty());
    }

    #[test]
    fn missing_text_fields_decode_as_empty_and_are_rejected() {
        let doc = UserDocument::from_fields(&json!({
            "savedColours": [{"id": "A", "date": 0}]
        }))
        .unwrap();
        assert_eq!(doc.saved_colours[0].hex_code, "");
        assert!(doc.saved_colours[0].clone().into_card().is_none());
    }

    #[test]
    fn missing_id_fails_the_whole_document() {
        let result = UserDocument::from_fields(&json!({
            "savedColours": [{"hexCode": "FF0000", "colourName": "Red", "date": 0}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn wrong_shape_fails() {
        assert!(UserDocument::from_fields(&json!({"savedColours": "nope"})).is_err());
    }
}
