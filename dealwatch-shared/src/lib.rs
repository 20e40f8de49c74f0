//! # Dealwatch Shared Library
//!
//! This crate contains the domain core shared by the Dealwatch API server
//! and the price-polling worker.
//!
//! ## Module Organization
//!
//! - `models`: Domain entities (users, rooms, memberships, watched items, alerts)
//! - `store`: Persistence trait with atomic compare-and-set primitives, plus the in-memory backend
//! - `directory`: Identity & room directory (memberships, roles, invite codes, active-room pointer)
//! - `registry`: Per-room watch-item registry
//! - `router`: Chat command parsing and dispatch
//! - `summary`: Order summary generation
//! - `fetch`: Price-fetch collaborator contract and HTTP implementation
//! - `outbound`: Outbound messenger collaborator contract
//! - `config`: Configuration management
//! - `error`: Common error types

pub mod config;
pub mod directory;
pub mod error;
pub mod fetch;
pub mod models;
pub mod outbound;
pub mod registry;
pub mod router;
pub mod store;
pub mod summary;

/// Current version of the Dealwatch shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
