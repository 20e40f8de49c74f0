/// Domain models
///
/// Plain data structures shared by the directory, registry, router, poller,
/// and dispatcher. All persistence goes through the `store` module; models
/// carry no storage handles themselves.

pub mod alert;
pub mod item;
pub mod membership;
pub mod room;
pub mod user;

pub use alert::{AlertEvent, AlertStatus};
pub use item::{PollState, WatchedItem};
pub use membership::{Membership, RoomRole};
pub use room::{Room, RoomKind};
pub use user::User;
