/// Membership model
///
/// A membership is the (room, user) pair with a role. Lifecycle:
/// none -> member (join/accept) -> admin/owner (promotion) -> removed
/// (leave or removal by an owner/admin). The pair is unique; the store's
/// `insert_membership` rejects duplicates.
///
/// # Roles
///
/// - **owner**: created the room; cannot be removed, cannot leave
/// - **admin**: may remove members (but never the owner) and promote
/// - **member**: manages their own watched items only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomRole {
    /// Full control of the room
    Owner,

    /// Can remove and promote members
    Admin,

    /// Regular participant
    Member,
}

impl RoomRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomRole::Owner => "owner",
            RoomRole::Admin => "admin",
            RoomRole::Member => "member",
        }
    }

    /// Can remove other members from the room
    pub fn can_remove_members(&self) -> bool {
        matches!(self, RoomRole::Owner | RoomRole::Admin)
    }

    /// Can promote a member to admin
    pub fn can_promote(&self) -> bool {
        matches!(self, RoomRole::Owner)
    }

    /// Can remove any watched item in the room, not just their own
    pub fn can_manage_items(&self) -> bool {
        matches!(self, RoomRole::Owner | RoomRole::Admin)
    }
}

/// User-room relationship with role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Room ID
    pub room_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the room
    pub role: RoomRole,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// Creates a membership with the given role
    pub fn new(room_id: Uuid, user_id: Uuid, role: RoomRole) -> Self {
        Membership {
            room_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}
