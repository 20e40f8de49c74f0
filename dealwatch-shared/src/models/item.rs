/// Watched item model
///
/// A watched item is a tracked product link belonging to exactly one room.
/// The poller drives it through the per-item lifecycle:
///
/// ```text
/// Active -> PriceUpdated            (successful fetch)
///        -> FetchFailed (n <= cap)  (transient failure, will retry)
///        -> Stale                   (permanent failure or retries exhausted)
/// ```
///
/// `last_alert_at` is the cooldown stamp; it is only ever advanced through
/// the store's `claim_alert_slot` compare-and-set so that racing poll
/// workers cannot double-alert.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Poll lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Not yet visited by the current cycle
    Active,

    /// Last fetch succeeded and the price was refreshed
    PriceUpdated,

    /// Last fetch failed transiently; `fetch_failures` holds the count
    FetchFailed,

    /// Permanently failed or retries exhausted; surfaced in summaries
    Stale,
}

impl PollState {
    /// Converts state to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Active => "active",
            PollState::PriceUpdated => "price_updated",
            PollState::FetchFailed => "fetch_failed",
            PollState::Stale => "stale",
        }
    }
}

/// A tracked product with owner, quantity, and price history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedItem {
    /// Item ID
    pub id: Uuid,

    /// Room the item belongs to (exactly one)
    pub room_id: Uuid,

    /// Product link; unique within the room, duplicates merge by quantity
    pub link: String,

    /// Short display name
    pub nickname: String,

    /// Member the item is intended for, free-form name
    pub assigned_to: Option<String>,

    /// Quantity, always > 0
    pub quantity: u32,

    /// Free-form notes
    pub notes: Option<String>,

    /// Price observed when the item was added
    pub baseline_price: f64,

    /// Most recent observed price
    pub last_price: f64,

    /// Poll lifecycle state
    pub poll_state: PollState,

    /// Consecutive transient fetch failures
    pub fetch_failures: u32,

    /// Muted items keep polling but never alert
    pub muted: bool,

    /// User who added the item
    pub added_by: Uuid,

    /// Cooldown stamp; advanced only via `Store::claim_alert_slot`
    pub last_alert_at: Option<DateTime<Utc>>,

    /// When the item was added; listing and summary order key
    pub created_at: DateTime<Utc>,
}

impl WatchedItem {
    /// Relative decrease of `current` from the baseline price
    ///
    /// Returns a fraction (0.06 = 6% drop). Non-positive baselines yield
    /// 0.0 so a bad capture can never fire an alert.
    pub fn drop_pct(&self, current: f64) -> f64 {
        if self.baseline_price <= 0.0 {
            return 0.0;
        }
        (self.baseline_price - current) / self.baseline_price
    }

    /// Cost of this line at the last observed price
    pub fn line_total(&self) -> f64 {
        self.last_price * f64::from(self.quantity)
    }
}
