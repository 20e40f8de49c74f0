/// Watch registry
///
/// Item CRUD within a room. Adding an item captures the baseline price at
/// add time through the price-fetch collaborator; adding a link that is
/// already watched in the room merges by summing quantities instead of
/// creating a duplicate row.
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::CommandError;
use crate::fetch::PriceFetcher;
use crate::models::{PollState, User, WatchedItem};
use crate::store::Store;

/// Listing scope for `list_items`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Items added by one user
    Mine(Uuid),

    /// Every item in the room
    All,

    /// Items assigned to one member name
    ByMember(String),
}

/// Outcome of `add_item`
#[derive(Debug, Clone)]
pub struct AddOutcome {
    /// The item as stored after the operation
    pub item: WatchedItem,

    /// True when an existing watch for the same link absorbed the quantity
    pub merged: bool,
}

/// Watch registry service
pub struct WatchRegistry {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn PriceFetcher>,
}

impl WatchRegistry {
    /// Creates a registry over the given store and price source
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn PriceFetcher>) -> Self {
        WatchRegistry { store, fetcher }
    }

    /// Adds a watch for a product link, or merges into an existing one
    ///
    /// The link must be http(s) and the quantity positive. The baseline
    /// price is captured now; if the fetch fails the item is still added
    /// with a zero baseline, which the poller backfills on its first
    /// successful visit.
    pub async fn add_item(
        &self,
        adder: &User,
        room_id: Uuid,
        link: &str,
        nickname: &str,
        assigned_to: Option<String>,
        quantity: u32,
    ) -> Result<AddOutcome, CommandError> {
        let link = link.trim();
        if !(link.starts_with("http://") || link.starts_with("https://")) {
            return Err(CommandError::InvalidArguments(
                "the link must start with http:// or https://".to_string(),
            ));
        }
        if quantity == 0 {
            return Err(CommandError::InvalidArguments(
                "quantity must be at least 1".to_string(),
            ));
        }
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(CommandError::InvalidArguments(
                "the item needs a nickname".to_string(),
            ));
        }

        // Same link in the same room: one watch, summed quantity.
        for existing in self.store.items_for_room(room_id).await? {
            if existing.link.eq_ignore_ascii_case(link) {
                let mut merged = existing;
                merged.quantity = merged.quantity.saturating_add(quantity);
                self.store.update_item(merged.clone()).await?;
                tracing::debug!(item_id = %merged.id, quantity = merged.quantity, "Merged duplicate watch");
                return Ok(AddOutcome {
                    item: merged,
                    merged: true,
                });
            }
        }

        let baseline = match self.fetcher.fetch(link).await {
            Ok(quote) => quote.price,
            Err(e) => {
                tracing::warn!(link = %link, error = %e, "Baseline fetch failed, deferring to poller");
                0.0
            }
        };

        let item = WatchedItem {
            id: Uuid::new_v4(),
            room_id,
            link: link.to_string(),
            nickname: nickname.to_string(),
            assigned_to: assigned_to
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            quantity,
            notes: None,
            baseline_price: baseline,
            last_price: baseline,
            poll_state: PollState::Active,
            fetch_failures: 0,
            muted: false,
            added_by: adder.id,
            last_alert_at: None,
            created_at: Utc::now(),
        };
        self.store.insert_item(item.clone()).await?;
        tracing::info!(item_id = %item.id, room_id = %room_id, nickname = %item.nickname, "Watch added");
        Ok(AddOutcome {
            item,
            merged: false,
        })
    }

    /// Items in a room filtered by scope, in creation order
    pub async fn list_items(
        &self,
        room_id: Uuid,
        scope: ListScope,
    ) -> Result<Vec<WatchedItem>, CommandError> {
        let items = self.store.items_for_room(room_id).await?;
        let filtered = match scope {
            ListScope::All => items,
            ListScope::Mine(user_id) => items.into_iter().filter(|i| i.added_by == user_id).collect(),
            ListScope::ByMember(name) => items
                .into_iter()
                .filter(|i| {
                    i.assigned_to
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(&name))
                })
                .collect(),
        };
        Ok(filtered)
    }

    /// Removes a watch; the adder or a room admin/owner may do this
    pub async fn remove_item(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        item_ref: &str,
    ) -> Result<WatchedItem, CommandError> {
        let item = self.resolve_item(room_id, item_ref).await?;
        self.authorize_manage(actor_id, &item).await?;
        self.store.delete_item(item.id).await?;
        tracing::info!(item_id = %item.id, actor = %actor_id, "Watch removed");
        Ok(item)
    }

    /// Removes every watch the caller added in the room
    ///
    /// Other members' watches are untouched. Returns how many were
    /// removed; zero is not an error.
    pub async fn remove_all(&self, actor_id: Uuid, room_id: Uuid) -> Result<usize, CommandError> {
        let mut removed = 0;
        for item in self.store.items_for_room(room_id).await? {
            if item.added_by == actor_id {
                self.store.delete_item(item.id).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(room_id = %room_id, actor = %actor_id, removed, "Bulk watch removal");
        }
        Ok(removed)
    }

    /// Toggles alert muting; polling continues either way
    pub async fn mute_item(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        item_ref: &str,
    ) -> Result<WatchedItem, CommandError> {
        let mut item = self.resolve_item(room_id, item_ref).await?;
        self.authorize_manage(actor_id, &item).await?;
        item.muted = !item.muted;
        self.store.update_item(item.clone()).await?;
        Ok(item)
    }

    async fn authorize_manage(
        &self,
        actor_id: Uuid,
        item: &WatchedItem,
    ) -> Result<(), CommandError> {
        if item.added_by == actor_id {
            return Ok(());
        }
        let membership = self
            .store
            .find_membership(item.room_id, actor_id)
            .await?
            .ok_or(CommandError::NotAMember)?;
        if membership.role.can_manage_items() {
            Ok(())
        } else {
            Err(CommandError::PermissionDenied)
        }
    }

    /// Resolves an item by 1-based position, nickname, or id prefix
    pub async fn resolve_item(
        &self,
        room_id: Uuid,
        item_ref: &str,
    ) -> Result<WatchedItem, CommandError> {
        let wanted = item_ref.trim();
        let items = self.store.items_for_room(room_id).await?;

        if let Ok(index) = wanted.parse::<usize>() {
            if index >= 1 && index <= items.len() {
                return Ok(items[index - 1].clone());
            }
        }
        for item in &items {
            if item.nickname.eq_ignore_ascii_case(wanted) {
                return Ok(item.clone());
            }
        }
        let lowered = wanted.to_ascii_lowercase();
        for item in &items {
            if item.id.to_string().starts_with(&lowered) {
                return Ok(item.clone());
            }
        }
        Err(CommandError::ItemNotFound(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, PriceQuote};
    use crate::models::{Membership, Room, RoomKind, RoomRole};
    use crate::store::MemStore;
    use async_trait::async_trait;

    struct FixedFetcher(f64);

    #[async_trait]
    impl PriceFetcher for FixedFetcher {
        async fn fetch(&self, _url: &str) -> Result<PriceQuote, FetchError> {
            Ok(PriceQuote { price: self.0 })
        }
    }

    struct BrokenFetcher;

    #[async_trait]
    impl PriceFetcher for BrokenFetcher {
        async fn fetch(&self, _url: &str) -> Result<PriceQuote, FetchError> {
            Err(FetchError::Permanent("no such product".to_string()))
        }
    }

    async fn setup(price: f64) -> (Arc<MemStore>, WatchRegistry, User, Room) {
        let store = Arc::new(MemStore::new());
        let registry = WatchRegistry::new(store.clone(), Arc::new(FixedFetcher(price)));
        let user = store.upsert_user_by_channel("tg:alice").await.unwrap();
        let code = crate::models::room::generate_invite_code();
        store.reserve_invite_code(&code).await.unwrap();
        let room = Room::new("Smiths", RoomKind::GeneralShopping, code, user.id);
        store.insert_room(room.clone()).await.unwrap();
        store
            .insert_membership(Membership::new(room.id, user.id, RoomRole::Owner))
            .await
            .unwrap();
        (store, registry, user, room)
    }

    #[tokio::test]
    async fn test_add_captures_baseline() {
        let (_, registry, user, room) = setup(4.0).await;
        let outcome = registry
            .add_item(&user, room.id, "https://shop.example/milk", "Milk", None, 2)
            .await
            .unwrap();
        assert!(!outcome.merged);
        assert_eq!(outcome.item.baseline_price, 4.0);
        assert_eq!(outcome.item.quantity, 2);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let (_, registry, user, room) = setup(4.0).await;
        let err = registry
            .add_item(&user, room.id, "ftp://x", "Milk", None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArguments(_)));

        let err = registry
            .add_item(&user, room.id, "https://x.example", "Milk", None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_same_link_merges_quantity() {
        let (store, registry, user, room) = setup(4.0).await;
        registry
            .add_item(&user, room.id, "https://shop.example/milk", "Milk", None, 2)
            .await
            .unwrap();
        let outcome = registry
            .add_item(&user, room.id, "HTTPS://shop.example/milk", "Milk", None, 3)
            .await
            .unwrap();
        assert!(outcome.merged);
        assert_eq!(outcome.item.quantity, 5);
        assert_eq!(store.items_for_room(room.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_baseline_defers_to_poller() {
        let store = Arc::new(MemStore::new());
        let registry = WatchRegistry::new(store.clone(), Arc::new(BrokenFetcher));
        let user = store.upsert_user_by_channel("tg:alice").await.unwrap();
        let room_id = Uuid::new_v4();
        let outcome = registry
            .add_item(&user, room_id, "https://shop.example/x", "X", None, 1)
            .await
            .unwrap();
        assert_eq!(outcome.item.baseline_price, 0.0);
        assert_eq!(outcome.item.poll_state, PollState::Active);
    }

    #[tokio::test]
    async fn test_list_scopes() {
        let (store, registry, alice, room) = setup(4.0).await;
        let bob = store.upsert_user_by_channel("tg:bob").await.unwrap();
        store
            .insert_membership(Membership::new(room.id, bob.id, RoomRole::Member))
            .await
            .unwrap();

        registry
            .add_item(&alice, room.id, "https://s.example/a", "A", Some("Bob".into()), 1)
            .await
            .unwrap();
        registry
            .add_item(&bob, room.id, "https://s.example/b", "B", None, 1)
            .await
            .unwrap();

        let all = registry.list_items(room.id, ListScope::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].nickname, "A");

        let mine = registry
            .list_items(room.id, ListScope::Mine(bob.id))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].nickname, "B");

        let for_bob = registry
            .list_items(room.id, ListScope::ByMember("bob".to_string()))
            .await
            .unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].nickname, "A");
    }

    #[tokio::test]
    async fn test_remove_requires_permission() {
        let (store, registry, alice, room) = setup(4.0).await;
        let bob = store.upsert_user_by_channel("tg:bob").await.unwrap();
        store
            .insert_membership(Membership::new(room.id, bob.id, RoomRole::Member))
            .await
            .unwrap();
        registry
            .add_item(&alice, room.id, "https://s.example/a", "A", None, 1)
            .await
            .unwrap();

        let err = registry.remove_item(bob.id, room.id, "A").await.unwrap_err();
        assert!(matches!(err, CommandError::PermissionDenied));

        // The room owner can remove anything.
        registry.remove_item(alice.id, room.id, "A").await.unwrap();
        assert!(store.items_for_room(room.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_all_only_touches_own_watches() {
        let (store, registry, alice, room) = setup(4.0).await;
        let bob = store.upsert_user_by_channel("tg:bob").await.unwrap();
        store
            .insert_membership(Membership::new(room.id, bob.id, RoomRole::Member))
            .await
            .unwrap();
        registry
            .add_item(&alice, room.id, "https://s.example/a", "A", None, 1)
            .await
            .unwrap();
        registry
            .add_item(&alice, room.id, "https://s.example/b", "B", None, 1)
            .await
            .unwrap();
        registry
            .add_item(&bob, room.id, "https://s.example/c", "C", None, 1)
            .await
            .unwrap();

        assert_eq!(registry.remove_all(alice.id, room.id).await.unwrap(), 2);
        let left = store.items_for_room(room.id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].nickname, "C");

        // Nothing of Alice's left; a repeat is a no-op, not an error.
        assert_eq!(registry.remove_all(alice.id, room.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_by_index_nickname_and_prefix() {
        let (_, registry, alice, room) = setup(4.0).await;
        let added = registry
            .add_item(&alice, room.id, "https://s.example/a", "Milk", None, 1)
            .await
            .unwrap()
            .item;
        registry
            .add_item(&alice, room.id, "https://s.example/b", "Bread", None, 1)
            .await
            .unwrap();

        assert_eq!(registry.resolve_item(room.id, "1").await.unwrap().id, added.id);
        assert_eq!(
            registry.resolve_item(room.id, "milk").await.unwrap().id,
            added.id
        );
        let prefix = added.id.to_string()[..8].to_string();
        assert_eq!(
            registry.resolve_item(room.id, &prefix).await.unwrap().id,
            added.id
        );
        assert!(matches!(
            registry.resolve_item(room.id, "nope").await.unwrap_err(),
            CommandError::ItemNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_mute_toggles() {
        let (_, registry, alice, room) = setup(4.0).await;
        registry
            .add_item(&alice, room.id, "https://s.example/a", "Milk", None, 1)
            .await
            .unwrap();
        let muted = registry.mute_item(alice.id, room.id, "Milk").await.unwrap();
        assert!(muted.muted);
        let unmuted = registry.mute_item(alice.id, room.id, "Milk").await.unwrap();
        assert!(!unmuted.muted);
    }
}
