//! Durable FIFO queue client for the semantic pipeline.

pub mod client;
pub mod config;
pub mod health;
pub mod redis_queue;

pub use client::*;
pub use config::*;
pub use redis_queue::RedisQueue;
