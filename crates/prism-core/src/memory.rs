//! In-memory adapters
//!
//! Used for embedded setups without storage and throughout the test suites.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::prelude::*;
use prism_types::cache_adapter::CacheAdapter;
use prism_types::settings_adapter::SettingsAdapter;
use prism_types::types::{CacheEntry, SettingsSnapshot};

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemorySettingsAdapter {
	snapshot: RwLock<Option<SettingsSnapshot>>,
	fail_saves: AtomicBool,
	saves: AtomicUsize,
}

impl MemorySettingsAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start with a previously persisted snapshot
	pub fn with_snapshot(snapshot: SettingsSnapshot) -> Self {
		Self { snapshot: RwLock::new(Some(snapshot)), ..Self::default() }
	}

	/// Make every following save fail, simulating a storage outage
	pub fn set_fail_saves(&self, fail: bool) {
		self.fail_saves.store(fail, Ordering::SeqCst);
	}

	/// Number of successful saves
	pub fn save_count(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}

	pub fn stored(&self) -> Option<SettingsSnapshot> {
		self.snapshot.read().clone()
	}
}

#[async_trait]
impl SettingsAdapter for MemorySettingsAdapter {
	async fn load(&self) -> PrResult<Option<SettingsSnapshot>> {
		Ok(self.snapshot.read().clone())
	}

	async fn save(&self, snapshot: &SettingsSnapshot) -> PrResult<()> {
		if self.fail_saves.load(Ordering::SeqCst) {
			return Err(Error::PersistenceFailure("storage unavailable".into()));
		}
		*self.snapshot.write() = Some(snapshot.clone());
		self.saves.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Persistent cache tier backed by a map
#[derive(Debug, Default)]
pub struct MemoryCacheAdapter {
	entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

#[async_trait]
impl CacheAdapter for MemoryCacheAdapter {
	async fn read_entry(&self, key: &str) -> PrResult<Option<CacheEntry>> {
		Ok(self.entries.read().get(key).cloned())
	}

	async fn write_entry(&self, entry: &CacheEntry) -> PrResult<()> {
		self.entries.write().insert(entry.key.clone(), entry.clone());
		Ok(())
	}

	async fn remove_entry(&self, key: &str) -> PrResult<bool> {
		Ok(self.entries.write().remove(key).is_some())
	}
}


// vim: ts=4
