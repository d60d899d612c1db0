//! Inbound tick feed: WebSocket subscription, validation, reconnect policy.

pub mod backoff;
pub mod client;
pub mod normalizer;

pub use backoff::ReconnectBackoff;
pub use client::run_feed;
pub use normalizer::normalize;
