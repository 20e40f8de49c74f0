/// Alert dispatcher
///
/// Decides whether an observed price fires an alert and drives delivery.
/// The firing rule is `drop_pct >= threshold` AND the cooldown has elapsed,
/// and the cooldown check is the store's `claim_alert_slot` compare-and-set,
/// so N workers observing the same drop produce exactly one alert.
///
/// Delivery failures park the alert as `PendingRetry`; each poll cycle
/// retries parked alerts until the attempt cap, after which the alert goes
/// terminal `Failed` and is surfaced by summaries instead of vanishing.
use std::sync::Arc;

use chrono::Utc;

use dealwatch_shared::config::AlertConfig;
use dealwatch_shared::error::StoreError;
use dealwatch_shared::models::{AlertEvent, AlertStatus, User, WatchedItem};
use dealwatch_shared::outbound::Messenger;
use dealwatch_shared::store::Store;

/// Alert dispatcher service
pub struct AlertDispatcher {
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
    config: AlertConfig,
}

impl AlertDispatcher {
    /// Creates a dispatcher over the given store and messenger
    pub fn new(store: Arc<dyn Store>, messenger: Arc<dyn Messenger>, config: AlertConfig) -> Self {
        AlertDispatcher {
            store,
            messenger,
            config,
        }
    }

    /// Evaluates a freshly observed price for an item
    ///
    /// Returns the alert that was created, if one fired. Muted items,
    /// sub-threshold drops, and items still inside the cooldown window all
    /// return `None`.
    pub async fn evaluate(
        &self,
        item: &WatchedItem,
        current: f64,
    ) -> Result<Option<AlertEvent>, StoreError> {
        if item.muted {
            return Ok(None);
        }
        let drop_pct = item.drop_pct(current);
        if drop_pct < self.config.min_drop_pct {
            return Ok(None);
        }
        if !self
            .store
            .claim_alert_slot(item.id, Utc::now(), self.config.cooldown())
            .await?
        {
            tracing::debug!(item_id = %item.id, "Drop qualifies but cooldown not elapsed");
            return Ok(None);
        }

        let mut alert = AlertEvent::new(item, drop_pct, current);
        self.store.insert_alert(alert.clone()).await?;
        tracing::info!(
            item_id = %item.id,
            alert_id = %alert.id,
            drop_pct = %format!("{:.1}%", drop_pct * 100.0),
            "Price-drop alert fired"
        );

        self.deliver(&mut alert, item).await?;
        Ok(Some(alert))
    }

    /// Attempts delivery of an alert and records the outcome
    async fn deliver(&self, alert: &mut AlertEvent, item: &WatchedItem) -> Result<(), StoreError> {
        let recipients = self.recipients_for(item).await?;
        let text = render_alert(alert, item);

        alert.delivery_attempts += 1;
        let mut failed = false;
        for recipient in &recipients {
            // The alert id is the idempotency key; re-sending to a recipient
            // who already got it on an earlier attempt is safe.
            if let Err(e) = self
                .messenger
                .send(&recipient.channel_id, alert.id, &text)
                .await
            {
                tracing::warn!(alert_id = %alert.id, error = %e, "Delivery attempt failed");
                failed = true;
            }
        }

        if !failed {
            alert.status = AlertStatus::Delivered;
            alert.delivered_at = Some(Utc::now());
        } else if alert.delivery_attempts >= self.config.delivery_attempt_cap {
            alert.status = AlertStatus::Failed;
            tracing::error!(alert_id = %alert.id, attempts = alert.delivery_attempts, "Alert delivery gave up");
        } else {
            alert.status = AlertStatus::PendingRetry;
        }
        self.store.update_alert(alert.clone()).await
    }

    /// Retries every alert parked in `PendingRetry`
    ///
    /// Called at the start of each poll cycle. Alerts whose item has since
    /// been removed go straight to `Failed`.
    pub async fn retry_pending(&self) -> Result<usize, StoreError> {
        let parked = self.store.alerts_pending_retry().await?;
        let mut retried = 0;
        for mut alert in parked {
            match self.store.find_item(alert.item_id).await? {
                Some(item) => {
                    self.deliver(&mut alert, &item).await?;
                    retried += 1;
                }
                None => {
                    alert.status = AlertStatus::Failed;
                    self.store.update_alert(alert.clone()).await?;
                    tracing::warn!(alert_id = %alert.id, "Alert's item is gone; giving up");
                }
            }
        }
        Ok(retried)
    }

    /// Recipients for an item's alerts
    ///
    /// The assigned member's user when the name resolves to one, otherwise
    /// every room member. Room kind plays no part here.
    async fn recipients_for(&self, item: &WatchedItem) -> Result<Vec<User>, StoreError> {
        let mut members = Vec::new();
        for membership in self.store.memberships_for_room(item.room_id).await? {
            if let Some(user) = self.store.find_user(membership.user_id).await? {
                members.push(user);
            }
        }
        if let Some(assigned) = &item.assigned_to {
            if let Some(user) = members
                .iter()
                .find(|u| u.label().eq_ignore_ascii_case(assigned))
            {
                return Ok(vec![user.clone()]);
            }
        }
        Ok(members)
    }
}

/// Renders the alert as chat text
fn render_alert(alert: &AlertEvent, item: &WatchedItem) -> String {
    format!(
        "Price drop: {} is down {:.0}% ({} from {}).\n{}",
        item.nickname,
        alert.drop_pct * 100.0,
        fmt_price(alert.new_price),
        fmt_price(alert.old_price),
        item.link
    )
}

fn fmt_price(amount: f64) -> String {
    if (amount - amount.trunc()).abs() < 1e-9 {
        format!("${}", amount.trunc() as i64)
    } else {
        format!("${amount:.2}")
    }
}
