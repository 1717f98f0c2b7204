//! Card model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Opaque identifier for a card.
///
/// Cards created on this device get a UUID v7 (time-sortable) string; ids that
/// arrive from the remote ledger are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Create a new unique card ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("card id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A validated hex colour code: 6 (RGB) or 8 (RGBA) hex digits, stored
/// uppercase without a leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexCode(String);

impl HexCode {
    /// Parse user input such as `#c8a2c8` or `C8A2C8FF`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let digits = input.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);

        if !matches!(digits.len(), 6 | 8) {
            return Err(Error::InvalidInput(format!(
                "hex code must have 6 or 8 digits, got '{input}'"
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "hex code contains non-hex characters: '{input}'"
            )));
        }

        Ok(Self(digits.to_ascii_uppercase()))
    }

    /// A random opaque RGB colour.
    #[must_use]
    pub fn random() -> Self {
        let rgb = rand::random::<u32>() & 0x00FF_FFFF;
        Self(format!("{rgb:06X}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A saved colour swatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier, immutable after creation
    pub id: CardId,
    /// Hex digits without a leading `#`
    pub hex_code: String,
    /// Human label
    pub colour_name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Card {
    /// Create a new card stamped with the current time
    #[must_use]
    pub fn new(hex_code: HexCode, colour_name: impl Into<String>) -> Self {
        Self {
            id: CardId::new(),
            hex_code: hex_code.0,
            colour_name: colour_name.into().trim().to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a card with a random colour
    #[must_use]
    pub fn random(colour_name: impl Into<String>) -> Self {
        Self::new(HexCode::random(), colour_name)
    }

    /// A card is usable only when both its hex code and its name are non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.hex_code.is_empty() && !self.colour_name.is_empty()
    }

    /// Hex code with a leading `#`, for display
    #[must_use]
    pub fn display_hex(&self) -> String {
        format!("#{}", self.hex_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_unique() {
        assert_ne!(CardId::new(), CardId::new());
    }

    #[test]
    fn test_card_id_parse_rejects_empty() {
        assert!("  ".parse::<CardId>().is_err());
        assert_eq!("A".parse::<CardId>().unwrap().as_str(), "A");
    }

    #[test]
    fn test_hex_code_strips_hash_and_uppercases() {
        let hex = HexCode::parse("#c8a2c8").unwrap();
        assert_eq!(hex.as_str(), "C8A2C8");
    }

    #[test]
    fn test_hex_code_accepts_alpha() {
        let hex = HexCode::parse("ff000080").unwrap();
        assert_eq!(hex.as_str(), "FF000080");
    }

    #[test]
    fn test_hex_code_rejects_bad_input() {
        assert!(HexCode::parse("").is_err());
        assert!(HexCode::parse("#FFF").is_err());
        assert!(HexCode::parse("GG0000").is_err());
        assert!(HexCode::parse("FF00001").is_err());
    }

    #[test]
    fn test_random_hex_is_valid() {
        for _ in 0..32 {
            let hex = HexCode::random();
            assert!(HexCode::parse(hex.as_str()).is_ok());
        }
    }

    #[test]
    fn test_card_new() {
        let card = Card::new(HexCode::parse("00ff00").unwrap(), "  Green ");
        assert_eq!(card.hex_code, "00FF00");
        assert_eq!(card.colour_name, "Green");
        assert!(card.created_at > 0);
        assert!(card.is_valid());
        assert_eq!(card.display_hex(), "#00FF00");
    }

    #[test]
    fn test_card_validity() {
        let mut card = Card::random("Lilac");
        assert!(card.is_valid());
        card.colour_name.clear();
        assert!(!card.is_valid());
    }
}
