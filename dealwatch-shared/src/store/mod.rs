/// Persistence store contract
///
/// This module defines the CRUD seam between the domain core and whatever
/// engine holds the data. The storage format is an external concern; the
/// core only requires the operations below plus two atomic
/// compare-and-set primitives:
///
/// - `reserve_invite_code`: invite-code uniqueness under concurrent room
///   creation (generate, reserve, retry on collision)
/// - `claim_alert_slot`: the alert-cooldown stamp; exactly one of N racing
///   poll workers wins the set, all others observe the new timestamp
///
/// Ordering guarantees the core relies on:
///
/// - `memberships_for_user` returns rooms in membership-insertion order
/// - `items_for_room` returns items in creation order
///
/// # Example
///
/// ```no_run
/// use dealwatch_shared::store::{MemStore, Store};
///
/// # async fn example() -> Result<(), dealwatch_shared::error::StoreError> {
/// let store = MemStore::new();
/// let user = store.upsert_user_by_channel("tg:42").await?;
/// assert!(user.active_room_id.is_none());
/// # Ok(())
/// # }
/// ```

mod memory;

pub use memory::MemStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AlertEvent, Membership, Room, User, WatchedItem};

/// Persistence store trait
///
/// All methods take `&self`; implementations handle their own interior
/// synchronization.
#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---

    /// Finds a user by channel identity
    async fn find_user_by_channel(&self, channel_id: &str) -> Result<Option<User>, StoreError>;

    /// Finds a user by id
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Returns the user for a channel identity, creating one on first contact
    async fn upsert_user_by_channel(&self, channel_id: &str) -> Result<User, StoreError>;

    /// Sets a user's display name
    async fn set_display_name(&self, user_id: Uuid, name: &str) -> Result<(), StoreError>;

    /// Sets or clears a user's active-room pointer
    async fn set_active_room(&self, user_id: Uuid, room_id: Option<Uuid>) -> Result<(), StoreError>;

    // --- rooms ---

    /// Inserts a room; its invite code must already be reserved
    async fn insert_room(&self, room: Room) -> Result<(), StoreError>;

    /// Finds a room by id
    async fn find_room(&self, id: Uuid) -> Result<Option<Room>, StoreError>;

    /// Finds a room by invite code (exact, case-insensitive)
    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>, StoreError>;

    /// Atomically reserves an invite code; false means collision, retry
    async fn reserve_invite_code(&self, code: &str) -> Result<bool, StoreError>;

    // --- memberships ---

    /// Inserts a membership; errors with `Conflict` if the pair exists
    async fn insert_membership(&self, membership: Membership) -> Result<(), StoreError>;

    /// Finds the membership for a (room, user) pair
    async fn find_membership(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    /// Updates the role of an existing membership
    async fn update_membership_role(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        role: crate::models::RoomRole,
    ) -> Result<(), StoreError>;

    /// Deletes a membership; returns whether one existed
    async fn delete_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// All memberships for a user, in insertion order
    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError>;

    /// All memberships for a room, in insertion order
    async fn memberships_for_room(&self, room_id: Uuid) -> Result<Vec<Membership>, StoreError>;

    // --- watched items ---

    /// Inserts a watched item
    async fn insert_item(&self, item: WatchedItem) -> Result<(), StoreError>;

    /// Replaces an item by id
    async fn update_item(&self, item: WatchedItem) -> Result<(), StoreError>;

    /// Deletes an item; returns whether one existed
    async fn delete_item(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Finds an item by id
    async fn find_item(&self, id: Uuid) -> Result<Option<WatchedItem>, StoreError>;

    /// All items in a room, in creation order
    async fn items_for_room(&self, room_id: Uuid) -> Result<Vec<WatchedItem>, StoreError>;

    /// Every watched item system-wide, for the poll cycle
    async fn all_items(&self) -> Result<Vec<WatchedItem>, StoreError>;

    /// Atomically claims the alert slot for an item
    ///
    /// Returns true and stamps `last_alert_at = now` iff the stamp is unset
    /// or at least `cooldown` old. Under N concurrent callers exactly one
    /// receives true.
    async fn claim_alert_slot(
        &self,
        item_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, StoreError>;

    // --- alerts ---

    /// Inserts an alert event
    async fn insert_alert(&self, alert: AlertEvent) -> Result<(), StoreError>;

    /// Replaces an alert by id; delivered alerts are immutable
    async fn update_alert(&self, alert: AlertEvent) -> Result<(), StoreError>;

    /// Alerts awaiting a delivery retry
    async fn alerts_pending_retry(&self) -> Result<Vec<AlertEvent>, StoreError>;

    /// Most recent alert for an item, if any
    async fn latest_alert_for_item(&self, item_id: Uuid)
        -> Result<Option<AlertEvent>, StoreError>;
}
