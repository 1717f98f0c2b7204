//! Data models for ShadeStash

mod card;
mod document;
mod user;

pub use card::{Card, CardId, HexCode};
pub use document::{format_date, parse_date, RemoteCard, UserDocument, SAVED_COLOURS_FIELD};
pub use user::UserId;
