//! Adapter for the persistent tier of the derived-artifact cache.
//!
//! Entries are stored as-is, including their generation stamp. Staleness is
//! decided by the cache manager on read, the adapter only stores and removes.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;
use crate::types::CacheEntry;

#[async_trait]
pub trait CacheAdapter: Debug + Send + Sync {
	async fn read_entry(&self, key: &str) -> PrResult<Option<CacheEntry>>;

	async fn write_entry(&self, entry: &CacheEntry) -> PrResult<()>;

	/// Removes an entry, returns whether it existed
	async fn remove_entry(&self, key: &str) -> PrResult<bool>;
}

// vim: ts=4
