/// Alert event model
///
/// One record per price-drop notification decision. Lifecycle:
///
/// ```text
/// Pending -> Delivered                     (immutable afterwards)
///         -> PendingRetry -> ... -> Failed (delivery cap exhausted)
/// ```
///
/// Failed alerts are terminal but surfaced: summaries mark the affected
/// items instead of silently dropping the notification.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WatchedItem;

/// Delivery state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Created, not yet handed to the messenger
    Pending,

    /// Handed off successfully; record is immutable from here
    Delivered,

    /// Last delivery attempt failed; retried on the next poll cycle
    PendingRetry,

    /// Delivery cap exhausted; terminal, surfaced in summaries
    Failed,
}

impl AlertStatus {
    /// Converts status to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Delivered => "delivered",
            AlertStatus::PendingRetry => "pending_retry",
            AlertStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Delivered | AlertStatus::Failed)
    }
}

/// A price-drop notification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Alert ID; doubles as the idempotency key for the messenger
    pub id: Uuid,

    /// Item the alert is about
    pub item_id: Uuid,

    /// Room the item belonged to at trigger time
    pub room_id: Uuid,

    /// When the drop was detected
    pub triggered_at: DateTime<Utc>,

    /// Relative drop, as a fraction of the baseline
    pub drop_pct: f64,

    /// Baseline price at trigger time
    pub old_price: f64,

    /// Observed price that triggered the alert
    pub new_price: f64,

    /// Delivery state
    pub status: AlertStatus,

    /// Delivery attempts so far
    pub delivery_attempts: u32,

    /// When delivery succeeded, if it did
    pub delivered_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    /// Creates a pending alert for an item at the given observed price
    pub fn new(item: &WatchedItem, drop_pct: f64, new_price: f64) -> Self {
        AlertEvent {
            id: Uuid::new_v4(),
            item_id: item.id,
            room_id: item.room_id,
            triggered_at: Utc::now(),
            drop_pct,
            old_price: item.baseline_price,
            new_price,
            status: AlertStatus::Pending,
            delivery_attempts: 0,
            delivered_at: None,
        }
    }
}
