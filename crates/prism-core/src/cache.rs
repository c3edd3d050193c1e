//! Two-tier cache for derived artifacts
//!
//! The in-process tier is an LRU bounded by item count and total bytes. The
//! optional persistent tier is a [`CacheAdapter`]. Every entry is stamped with
//! the generation current at write time; an entry whose stamp differs from the
//! current generation is stale and treated as a miss.

use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::hooks::{ExtensionRegistry, points};
use crate::prelude::*;
use prism_types::cache_adapter::CacheAdapter;
use prism_types::types::{CacheEntry, Generation};

pub const DEFAULT_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_CACHE_MAX_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
	/// Entries in the in-process tier
	pub item_count: usize,
	/// Bytes held by the in-process tier
	pub total_bytes: usize,
	pub hit_count: u64,
	pub miss_count: u64,
}

struct MemoryTier {
	entries: LruCache<String, CacheEntry>,
	total_bytes: usize,
}

impl MemoryTier {
	fn remove(&mut self, key: &str) {
		if let Some(entry) = self.entries.pop(key) {
			self.total_bytes -= entry.size_bytes;
		}
	}

	fn insert(&mut self, entry: CacheEntry, max_bytes: usize) {
		self.remove(&entry.key);
		while self.total_bytes + entry.size_bytes > max_bytes {
			match self.entries.pop_lru() {
				Some((_, evicted)) => self.total_bytes -= evicted.size_bytes,
				None => break,
			}
		}
		self.total_bytes += entry.size_bytes;
		if let Some((_, evicted)) = self.entries.push(entry.key.clone(), entry) {
			self.total_bytes -= evicted.size_bytes;
		}
	}
}

pub struct CacheManager {
	memory: RwLock<MemoryTier>,
	persistent: Option<Arc<dyn CacheAdapter>>,
	generation: Generation,
	hooks: Arc<ExtensionRegistry>,
	max_bytes: usize,
	hits: AtomicU64,
	misses: AtomicU64,
}

impl CacheManager {
	pub fn new(
		capacity: usize,
		max_bytes: usize,
		generation: Generation,
		hooks: Arc<ExtensionRegistry>,
	) -> Self {
		let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self {
			memory: RwLock::new(MemoryTier { entries: LruCache::new(capacity), total_bytes: 0 }),
			persistent: None,
			generation,
			hooks,
			max_bytes,
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
		}
	}

	/// Attach a persistent tier
	pub fn with_persistent(mut self, adapter: Arc<dyn CacheAdapter>) -> Self {
		self.persistent = Some(adapter);
		self
	}

	pub fn generation(&self) -> &Generation {
		&self.generation
	}

	/// Look a key up, in-process tier first.
	///
	/// Persistent hits are copied back into the in-process tier. Persistent
	/// tier errors are logged and count as a miss.
	pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
		let generation = self.generation.current();

		{
			let mut memory = self.memory.write();
			if let Some(entry) = memory.entries.get(key) {
				if entry.generation == generation {
					self.hits.fetch_add(1, Ordering::Relaxed);
					debug!("Cache hit (memory): {}", key);
					return Some(entry.value.clone());
				}
				debug!("Evicting stale entry {} (generation {})", key, entry.generation);
				memory.remove(key);
			}
		}

		if let Some(adapter) = &self.persistent {
			match adapter.read_entry(key).await {
				Ok(Some(entry)) if entry.generation == generation => {
					self.hits.fetch_add(1, Ordering::Relaxed);
					debug!("Cache hit (persistent): {}", key);
					let value = entry.value.clone();
					if entry.size_bytes <= self.max_bytes {
						self.memory.write().insert(entry, self.max_bytes);
					}
					return Some(value);
				}
				Ok(Some(entry)) => {
					debug!("Removing stale persistent entry {} ({})", key, entry.generation);
					if let Err(e) = adapter.remove_entry(key).await {
						warn!("Failed to remove stale cache entry {}: {}", key, e);
					}
				}
				Ok(None) => {}
				Err(e) => warn!("Persistent cache read failed for {}: {}", key, e),
			}
		}

		self.misses.fetch_add(1, Ordering::Relaxed);
		debug!("Cache miss: {}", key);
		None
	}

	/// Store a value in both tiers, stamped with the current generation.
	///
	/// Entries larger than the in-process byte budget only go to the
	/// persistent tier.
	pub async fn put(&self, key: &str, value: Vec<u8>, size_bytes: usize) -> PrResult<()> {
		let entry = CacheEntry {
			key: key.to_string(),
			value,
			size_bytes,
			created_at: Timestamp::now(),
			generation: self.generation.current(),
		};

		if let Some(adapter) = &self.persistent {
			adapter.write_entry(&entry).await?;
		}

		if size_bytes <= self.max_bytes {
			self.memory.write().insert(entry, self.max_bytes);
		} else {
			debug!("Cache entry {} ({} bytes) exceeds in-process budget", key, size_bytes);
		}
		Ok(())
	}

	/// Drop every in-process entry.
	///
	/// Persistent entries are left in place; they go stale because the
	/// generation they carry no longer matches.
	pub fn invalidate_all(&self) {
		let generation = self.generation.current();
		{
			let mut memory = self.memory.write();
			memory.entries.clear();
			memory.total_bytes = 0;
		}
		debug!("Cache invalidated, generation {}", generation);
		self.hooks.invoke_action(points::CACHE_INVALIDATED, &[serde_json::json!(generation)]);
	}

	pub fn stats(&self) -> CacheStats {
		let memory = self.memory.read();
		CacheStats {
			item_count: memory.entries.len(),
			total_bytes: memory.total_bytes,
			hit_count: self.hits.load(Ordering::Relaxed),
			miss_count: self.misses.load(Ordering::Relaxed),
		}
	}
}

impl std::fmt::Debug for CacheManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CacheManager")
			.field("stats", &self.stats())
			.field("persistent", &self.persistent)
			.field("generation", &self.generation.current())
			.finish()
	}
}


// vim: ts=4
