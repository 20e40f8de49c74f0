/// Room model and invite codes
///
/// A room ("family" in the chat vocabulary) groups users around one shared
/// watch list. Rooms are never hard-deleted; the invite code is immutable
/// and globally unique for the lifetime of the system.
///
/// # Invite codes
///
/// Codes are short alphanumeric tokens drawn from an alphabet without the
/// lookalike characters 0/O/1/I, since users retype them from chat. Global
/// uniqueness is enforced by the store's `reserve_invite_code`
/// compare-and-set; the directory regenerates on collision.
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invite code length in characters
pub const INVITE_CODE_LEN: usize = 6;

/// Alphabet for invite codes (no 0/O/1/I)
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Room kind, dispatched through the summary formatting-strategy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// Flat order summary with per-line and overall subtotals
    GeneralShopping,

    /// Order summary grouped by assigned member with a consolidated total
    Food,
}

impl RoomKind {
    /// Converts kind to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::GeneralShopping => "general shopping",
            RoomKind::Food => "food",
        }
    }

    /// Parses a user-supplied room type, case-insensitive
    pub fn parse(raw: &str) -> Option<RoomKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "food" => Some(RoomKind::Food),
            "general" | "shopping" | "general_shopping" | "general shopping" => {
                Some(RoomKind::GeneralShopping)
            }
            _ => None,
        }
    }
}

/// A group of users sharing one watch list and invite code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Room ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Room kind; affects summary formatting only, never alerting
    pub kind: RoomKind,

    /// Immutable, globally unique join token
    pub invite_code: String,

    /// User who created the room
    pub owner_user_id: Uuid,

    /// When the room was created
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Creates a room with the given, already-reserved invite code
    pub fn new(name: impl Into<String>, kind: RoomKind, invite_code: String, owner: Uuid) -> Self {
        Room {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            invite_code,
            owner_user_id: owner,
            created_at: Utc::now(),
        }
    }
}

/// Generates a candidate invite code
///
/// Uniqueness is not guaranteed here; callers must reserve the code against
/// the store and retry on collision.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}
