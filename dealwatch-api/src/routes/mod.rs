/// HTTP route handlers

pub mod health;
pub mod inbound;
pub mod summary;
