/// Price poller
///
/// Walks every watched item on a fixed interval, refreshes prices through
/// the fetch collaborator, and feeds qualifying drops to the alert
/// dispatcher. One cycle is bounded three ways:
///
/// - a semaphore caps concurrent fetches,
/// - a deadline token cuts the cycle off wholesale; unvisited items are
///   simply left for the next cycle,
/// - a try-lock gate makes cycles single-flight; when a cycle overruns the
///   interval, the next tick is skipped, never queued.
///
/// A failing item never aborts the batch: transient failures back off and
/// retry up to the attempt cap, then the item goes `Stale` and the cycle
/// moves on.
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use dealwatch_shared::config::PollConfig;
use dealwatch_shared::error::StoreError;
use dealwatch_shared::fetch::PriceFetcher;
use dealwatch_shared::models::{PollState, WatchedItem};
use dealwatch_shared::store::Store;

use crate::dispatcher::AlertDispatcher;

/// Counters for one completed poll cycle
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    /// Items the cycle looked at
    pub scanned: usize,

    /// Items whose price was refreshed
    pub updated: usize,

    /// Items marked stale this cycle
    pub stale: usize,

    /// Alerts fired
    pub alerts: usize,

    /// Items left for the next cycle by the deadline
    pub deferred: usize,

    /// Items skipped because of an internal error
    pub errors: usize,
}

enum ItemOutcome {
    Updated { alerted: bool },
    Stale,
    Deferred,
}

/// Recurring price poller
pub struct PricePoller {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn PriceFetcher>,
    dispatcher: Arc<AlertDispatcher>,
    config: PollConfig,
    cycle_gate: Mutex<()>,
}

impl PricePoller {
    /// Creates a poller over the given collaborators
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn PriceFetcher>,
        dispatcher: Arc<AlertDispatcher>,
        config: PollConfig,
    ) -> Self {
        PricePoller {
            store,
            fetcher,
            dispatcher,
            config,
            cycle_gate: Mutex::new(()),
        }
    }

    /// Runs poll cycles until shutdown
    ///
    /// The first cycle starts immediately; later ones follow the configured
    /// interval. Missed ticks are skipped, not queued.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Poller shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(Some(stats)) => tracing::info!(
                            scanned = stats.scanned,
                            updated = stats.updated,
                            stale = stats.stale,
                            alerts = stats.alerts,
                            deferred = stats.deferred,
                            errors = stats.errors,
                            "Poll cycle finished"
                        ),
                        Ok(None) => {}
                        Err(e) => tracing::error!(error = %e, "Poll cycle failed"),
                    }
                }
            }
        }
    }

    /// Runs one poll cycle
    ///
    /// Returns `None` when a previous cycle is still in flight.
    pub async fn poll_once(&self) -> Result<Option<CycleStats>, StoreError> {
        let Ok(_gate) = self.cycle_gate.try_lock() else {
            tracing::warn!("Previous poll cycle still running; skipping this tick");
            return Ok(None);
        };

        // Parked deliveries go first so a broken channel heals as soon as
        // possible after an outage.
        if let Err(e) = self.dispatcher.retry_pending().await {
            tracing::error!(error = %e, "Retrying parked alerts failed");
        }

        let items = self.store.all_items().await?;
        let mut stats = CycleStats {
            scanned: items.len(),
            ..CycleStats::default()
        };

        let deadline = CancellationToken::new();
        let enforcer = {
            let deadline = deadline.clone();
            let budget = self.config.cycle_deadline();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                deadline.cancel();
            })
        };

        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut tasks = JoinSet::new();
        for item in items {
            let store = self.store.clone();
            let fetcher = self.fetcher.clone();
            let dispatcher = self.dispatcher.clone();
            let config = self.config.clone();
            let deadline = deadline.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = deadline.cancelled() => return Ok(ItemOutcome::Deferred),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return Ok(ItemOutcome::Deferred),
                    },
                };
                process_item(store, fetcher, dispatcher, &config, deadline, item).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(ItemOutcome::Updated { alerted })) => {
                    stats.updated += 1;
                    if alerted {
                        stats.alerts += 1;
                    }
                }
                Ok(Ok(ItemOutcome::Stale)) => stats.stale += 1,
                Ok(Ok(ItemOutcome::Deferred)) => stats.deferred += 1,
                Ok(Err(e)) => {
                    stats.errors += 1;
                    tracing::error!(error = %e, "Item poll failed");
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::error!(error = %e, "Item poll task panicked");
                }
            }
        }
        enforcer.abort();
        Ok(Some(stats))
    }
}

/// Fetches one item, persists the result, and evaluates alerting
async fn process_item(
    store: Arc<dyn Store>,
    fetcher: Arc<dyn PriceFetcher>,
    dispatcher: Arc<AlertDispatcher>,
    config: &PollConfig,
    deadline: CancellationToken,
    mut item: WatchedItem,
) -> Result<ItemOutcome, StoreError> {
    let mut attempt: u32 = 1;
    let quote = loop {
        let fetched = tokio::select! {
            _ = deadline.cancelled() => return Ok(ItemOutcome::Deferred),
            fetched = fetcher.fetch(&item.link) => fetched,
        };
        match fetched {
            Ok(quote) => break quote,
            Err(e) if e.is_transient() && attempt < config.fetch_attempt_cap => {
                tracing::debug!(item_id = %item.id, attempt, error = %e, "Transient fetch failure, backing off");
                tokio::select! {
                    _ = deadline.cancelled() => {
                        item.poll_state = PollState::FetchFailed;
                        item.fetch_failures = attempt;
                        store.update_item(item).await?;
                        return Ok(ItemOutcome::Deferred);
                    }
                    _ = tokio::time::sleep(config.backoff(attempt)) => {}
                }
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, error = %e, "Marking item stale");
                item.poll_state = PollState::Stale;
                if e.is_transient() {
                    item.fetch_failures = attempt;
                }
                store.update_item(item).await?;
                return Ok(ItemOutcome::Stale);
            }
        }
    };

    // A zero baseline means the add-time price check never landed; the
    // first successful poll becomes the baseline.
    if item.baseline_price <= 0.0 {
        item.baseline_price = quote.price;
    }
    item.last_price = quote.price;
    item.poll_state = PollState::PriceUpdated;
    item.fetch_failures = 0;
    store.update_item(item.clone()).await?;

    let alerted = match dispatcher.evaluate(&item, quote.price).await {
        Ok(alert) => alert.is_some(),
        Err(e) => {
            tracing::error!(item_id = %item.id, error = %e, "Alert evaluation failed");
            false
        }
    };
    Ok(ItemOutcome::Updated { alerted })
}
