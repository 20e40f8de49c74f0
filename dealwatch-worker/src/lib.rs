//! # Dealwatch Worker Library
//!
//! Background processing for Dealwatch: the price poller walks every
//! watched item on a fixed interval, and the alert dispatcher turns
//! qualifying price drops into outbound messages with cooldown and
//! delivery-retry handling.

pub mod dispatcher;
pub mod poller;
