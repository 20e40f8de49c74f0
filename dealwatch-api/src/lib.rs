//! # Dealwatch API Library
//!
//! The HTTP surface in front of the Dealwatch domain core: a health check,
//! the generic inbound-message endpoint that feeds the command router, and
//! a read endpoint for room order summaries. Transports (WhatsApp,
//! Telegram, ...) sit upstream and are expected to verify their own webhook
//! signatures before forwarding messages here.

pub mod app;
pub mod error;
pub mod routes;
