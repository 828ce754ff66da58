//! Postgres persistence for enriched events.

pub mod client;
pub mod config;
pub mod health;
pub mod schema;
pub mod sink;

pub use client::*;
pub use config::*;
pub use sink::*;
