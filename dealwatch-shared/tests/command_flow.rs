//! End-to-end command flows through the router against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use dealwatch_shared::directory::RoomDirectory;
use dealwatch_shared::fetch::{FetchError, PriceFetcher, PriceQuote};
use dealwatch_shared::registry::WatchRegistry;
use dealwatch_shared::router::CommandRouter;
use dealwatch_shared::store::{MemStore, Store};
use dealwatch_shared::summary::SummaryGenerator;

/// Fetcher with a fixed price per link
struct ScriptedFetcher(HashMap<&'static str, f64>);

#[async_trait]
impl PriceFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<PriceQuote, FetchError> {
        self.0
            .get(url)
            .map(|price| PriceQuote { price: *price })
            .ok_or_else(|| FetchError::Permanent(format!("no such product: {url}")))
    }
}

fn build(prices: &[(&'static str, f64)]) -> CommandRouter {
    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let directory = Arc::new(RoomDirectory::new(store.clone()));
    let registry = Arc::new(WatchRegistry::new(
        store.clone(),
        Arc::new(ScriptedFetcher(prices.iter().copied().collect())),
    ));
    let summary = Arc::new(SummaryGenerator::new(store));
    CommandRouter::new(directory, registry, summary)
}

fn invite_code(create_reply: &str) -> String {
    create_reply
        .split("Invite code: ")
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .expect("create reply carries an invite code")
        .to_string()
}

#[tokio::test]
async fn smith_family_order_summary() {
    let router = build(&[
        ("https://shop.example/milk", 4.0),
        ("https://shop.example/bread", 3.0),
    ]);

    let created = router
        .handle("tg:alice", "ROOMCREATE Smith Family | general shopping")
        .await;
    let code = invite_code(&created);
    router.handle("tg:alice", "NAME Alice").await;
    router.handle("tg:bob", &format!("ROOMJOIN {code}")).await;
    router.handle("tg:bob", "NAME Bob").await;

    let reply = router
        .handle("tg:bob", "ADD https://shop.example/milk | Milk | 2")
        .await;
    assert!(reply.contains("Watching Milk x2 at $4"), "got: {reply}");
    router
        .handle("tg:alice", "ADD https://shop.example/bread | Bread | 1")
        .await;

    let summary = router.handle("tg:alice", "ORDERSUMMARY").await;
    assert!(summary.contains("Bob: Milk x2 ($8)"), "got:\n{summary}");
    assert!(summary.contains("Alice: Bread x1 ($3)"), "got:\n{summary}");
    assert!(summary.ends_with("Total: $11"), "got:\n{summary}");

    // Byte-identical on repeat with unchanged state.
    let again = router.handle("tg:alice", "ORDERSUMMARY").await;
    assert_eq!(summary, again);
}

#[tokio::test]
async fn duplicate_link_merges_instead_of_duplicating() {
    let router = build(&[("https://shop.example/milk", 4.0)]);
    router.handle("tg:alice", "ROOMCREATE Smiths").await;
    router
        .handle("tg:alice", "ADD https://shop.example/milk | Milk | 2")
        .await;
    let reply = router
        .handle("tg:alice", "ADD https://shop.example/milk | Milk | 3")
        .await;
    assert!(reply.contains("quantity is now 5"), "got: {reply}");

    let all = router.handle("tg:alice", "ALL").await;
    assert!(all.contains("1. Milk x5"), "got: {all}");
    assert!(!all.contains("2."), "got: {all}");
}

#[tokio::test]
async fn switch_and_scoped_listing_follow_the_active_room() {
    let router = build(&[
        ("https://shop.example/milk", 4.0),
        ("https://shop.example/cake", 9.0),
    ]);
    router.handle("tg:alice", "ROOMCREATE Groceries").await;
    router
        .handle("tg:alice", "ADD https://shop.example/milk | Milk")
        .await;
    router.handle("tg:alice", "ROOMCREATE Birthday | food").await;
    router
        .handle("tg:alice", "ADD https://shop.example/cake | Cake")
        .await;

    let all = router.handle("tg:alice", "ALL").await;
    assert!(all.contains("Cake"), "got: {all}");
    assert!(!all.contains("Milk"), "got: {all}");

    router.handle("tg:alice", "ROOMSWITCH Groceries").await;
    let all = router.handle("tg:alice", "ALL").await;
    assert!(all.contains("Milk"), "got: {all}");

    let rooms = router.handle("tg:alice", "ROOMS").await;
    assert!(rooms.contains("Groceries (general shopping)"), "got: {rooms}");
    assert!(rooms.contains("Birthday (food)"), "got: {rooms}");
}

#[tokio::test]
async fn removal_and_permissions_flow() {
    let router = build(&[("https://shop.example/milk", 4.0)]);
    let created = router.handle("tg:alice", "ROOMCREATE Smiths").await;
    let code = invite_code(&created);
    router.handle("tg:bob", &format!("ROOMJOIN {code}")).await;
    router.handle("tg:bob", "NAME Bob").await;
    router
        .handle("tg:bob", "ADD https://shop.example/milk | Milk")
        .await;

    // Alice owns the room, so she may remove Bob's item.
    let reply = router.handle("tg:alice", "REMOVE Milk").await;
    assert_eq!(reply, "Stopped watching Milk.");

    // And remove Bob himself; his next scoped command lands in a fresh
    // personal room rather than the one he was removed from.
    router.handle("tg:alice", "ROOMREMOVE Bob").await;
    let my = router.handle("tg:bob", "MY").await;
    assert!(my.contains("Bob's list"), "got: {my}");
}

#[tokio::test]
async fn aliases_and_today_filter() {
    let router = build(&[("https://shop.example/milk", 4.0)]);
    router.handle("tg:alice", "ROOMCREATE Smiths").await;
    router
        .handle("tg:alice", "ADD https://shop.example/milk | Milk | 2")
        .await;

    // Legacy verb resolves to ALL.
    let listed = router.handle("tg:alice", "MYALL").await;
    assert!(listed.contains("Milk x2"), "got: {listed}");

    // The item was added today, so the filter keeps it.
    let today = router.handle("tg:alice", "SUMMARY TODAY").await;
    assert!(today.ends_with("Total: $8"), "got:\n{today}");
}
