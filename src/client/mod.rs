//! Remote entity fetch.
//!
//! The resolver only depends on the [`EntityClient`] trait. Failures of any
//! kind (network, auth, not found, bad payload) are treated uniformly by the
//! resolver: fall back to the cached text and flag the result as an error.
//! Timeout and retry policy belong to the client implementation.

use crate::entity::EntitySnapshot;
use anyhow::Result;
use async_trait::async_trait;

mod http;

pub use http::HttpEntityClient;

/// Source of on-demand entity snapshots.
#[async_trait]
pub trait EntityClient: Send + Sync {
    /// Fetches the current state and attributes of one entity.
    async fn get_entity(&self, entity_id: &str) -> Result<EntitySnapshot>;
}
