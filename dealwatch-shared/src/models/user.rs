/// User model
///
/// A user is keyed by an opaque channel identity (`tg:12345`, a WhatsApp
/// phone number, and so on) and is created on the first inbound message from
/// an unseen identity. The transport that produced the identity is not the
/// core's concern.
///
/// `active_room_id`, when set, always references a room the user currently
/// belongs to; the directory serializes switch/leave per user to keep that
/// invariant under concurrent requests.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat user, one per channel identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: Uuid,

    /// Opaque channel identity the transport resolved the sender to
    pub channel_id: String,

    /// Optional display name, set via the NAME command
    pub display_name: Option<String>,

    /// Room implicitly used by scope-ambiguous commands
    pub active_room_id: Option<Uuid>,

    /// When the user was first seen
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a fresh user for a channel identity
    pub fn new(channel_id: impl Into<String>) -> Self {
        User {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            display_name: None,
            active_room_id: None,
            created_at: Utc::now(),
        }
    }

    /// Name shown in member listings and summaries
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.channel_id)
    }
}
