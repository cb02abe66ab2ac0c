//! Upstream API access layer.

mod client;

pub use client::{ApiClient, ApiClientConfig, RetryPolicy};
