/// In-memory store backend
///
/// The default backend for the binaries and the test suite. One `RwLock`
/// guards all tables, which makes the two compare-and-set primitives
/// trivially atomic: both run entirely under the write lock.
///
/// Items and memberships live in `Vec`s so that insertion order is the
/// iteration order the trait promises.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AlertEvent, AlertStatus, Membership, Room, RoomRole, User, WatchedItem};

use super::Store;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    users_by_channel: HashMap<String, Uuid>,
    rooms: HashMap<Uuid, Room>,
    rooms_by_code: HashMap<String, Uuid>,
    reserved_codes: HashSet<String>,
    memberships: Vec<Membership>,
    items: Vec<WatchedItem>,
    alerts: Vec<AlertEvent>,
}

/// In-memory `Store` implementation
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemStore {
    /// Creates an empty store
    pub fn new() -> Self {
        MemStore::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn find_user_by_channel(&self, channel_id: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .users_by_channel
            .get(channel_id)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn upsert_user_by_channel(&self, channel_id: &str) -> Result<User, StoreError> {
        let mut tables = self.inner.write().await;
        if let Some(id) = tables.users_by_channel.get(channel_id) {
            let id = *id;
            return Ok(tables.users[&id].clone());
        }
        let user = User::new(channel_id);
        tables.users_by_channel.insert(channel_id.to_string(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_display_name(&self, user_id: Uuid, name: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.display_name = Some(name.to_string());
        Ok(())
    }

    async fn set_active_room(
        &self,
        user_id: Uuid,
        room_id: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.active_room_id = room_id;
        Ok(())
    }

    async fn insert_room(&self, room: Room) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let code = room.invite_code.to_ascii_uppercase();
        // Promote the reservation to a live code.
        tables.reserved_codes.remove(&code);
        if tables.rooms_by_code.contains_key(&code) {
            return Err(StoreError::Conflict(format!("invite code {code} in use")));
        }
        tables.rooms_by_code.insert(code, room.id);
        tables.rooms.insert(room.id, room);
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.read().await.rooms.get(&id).cloned())
    }

    async fn find_room_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .rooms_by_code
            .get(&code.trim().to_ascii_uppercase())
            .and_then(|id| tables.rooms.get(id))
            .cloned())
    }

    async fn reserve_invite_code(&self, code: &str) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        let code = code.to_ascii_uppercase();
        if tables.rooms_by_code.contains_key(&code) || tables.reserved_codes.contains(&code) {
            return Ok(false);
        }
        tables.reserved_codes.insert(code);
        Ok(true)
    }

    async fn insert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        if tables
            .memberships
            .iter()
            .any(|m| m.room_id == membership.room_id && m.user_id == membership.user_id)
        {
            return Err(StoreError::Conflict("membership exists".to_string()));
        }
        tables.memberships.push(membership);
        Ok(())
    }

    async fn find_membership(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .memberships
            .iter()
            .find(|m| m.room_id == room_id && m.user_id == user_id)
            .cloned())
    }

    async fn update_membership_role(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        role: RoomRole,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let membership = tables
            .memberships
            .iter_mut()
            .find(|m| m.room_id == room_id && m.user_id == user_id)
            .ok_or(StoreError::NotFound("membership"))?;
        membership.role = role;
        Ok(())
    }

    async fn delete_membership(&self, room_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        let before = tables.memberships.len();
        tables
            .memberships
            .retain(|m| !(m.room_id == room_id && m.user_id == user_id));
        Ok(tables.memberships.len() < before)
    }

    async fn memberships_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn memberships_for_room(&self, room_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn insert_item(&self, item: WatchedItem) -> Result<(), StoreError> {
        self.inner.write().await.items.push(item);
        Ok(())
    }

    async fn update_item(&self, item: WatchedItem) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let slot = tables
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or(StoreError::NotFound("item"))?;
        // The cooldown stamp is owned by claim_alert_slot; a plain update
        // must not rewind it with a stale copy of the item.
        let last_alert_at = slot.last_alert_at.max(item.last_alert_at);
        *slot = item;
        slot.last_alert_at = last_alert_at;
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        let before = tables.items.len();
        tables.items.retain(|i| i.id != id);
        Ok(tables.items.len() < before)
    }

    async fn find_item(&self, id: Uuid) -> Result<Option<WatchedItem>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.items.iter().find(|i| i.id == id).cloned())
    }

    async fn items_for_room(&self, room_id: Uuid) -> Result<Vec<WatchedItem>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn all_items(&self) -> Result<Vec<WatchedItem>, StoreError> {
        Ok(self.inner.read().await.items.clone())
    }

    async fn claim_alert_slot(
        &self,
        item_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        let item = tables
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(StoreError::NotFound("item"))?;
        if let Some(stamp) = item.last_alert_at {
            if now - stamp < cooldown {
                return Ok(false);
            }
        }
        item.last_alert_at = Some(now);
        Ok(true)
    }

    async fn insert_alert(&self, alert: AlertEvent) -> Result<(), StoreError> {
        self.inner.write().await.alerts.push(alert);
        Ok(())
    }

    async fn update_alert(&self, alert: AlertEvent) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let slot = tables
            .alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or(StoreError::NotFound("alert"))?;
        if slot.status == AlertStatus::Delivered {
            return Err(StoreError::Conflict("delivered alert is immutable".to_string()));
        }
        *slot = alert;
        Ok(())
    }

    async fn alerts_pending_retry(&self) -> Result<Vec<AlertEvent>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::PendingRetry)
            .cloned()
            .collect())
    }

    async fn latest_alert_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<AlertEvent>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| a.item_id == item_id)
            .max_by_key(|a| a.triggered_at)
            .cloned())
    }
}
