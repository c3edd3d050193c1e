//! Settings store
//!
//! Holds the one authoritative snapshot of option values. Readers get the
//! current snapshot lock-free; writers go through [`SettingsStore::commit`],
//! which is serialized and all-or-nothing.

pub mod export;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::hooks::{ExtensionRegistry, points};
use crate::options::FrozenOptionRegistry;
use crate::prelude::*;
use crate::sanitize::SanitizationPipeline;
use prism_types::settings_adapter::SettingsAdapter;
use prism_types::types::{Generation, SettingValue, SettingsSnapshot, Values, values_to_json};

pub use export::{EXPORT_FORMAT_VERSION, ExportDocument};

/// Phase of the commit in progress.
///
/// `Rejected` and `Committed` are held while the matching extension points
/// run; the store is back to `Idle` once `commit` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitState {
	Idle,
	Validating,
	Rejected,
	Persisting,
	Committed,
}

pub struct SettingsStore {
	options: Arc<FrozenOptionRegistry>,
	hooks: Arc<ExtensionRegistry>,
	pipeline: SanitizationPipeline,
	cache: Arc<CacheManager>,
	adapter: Arc<dyn SettingsAdapter>,
	current: ArcSwap<SettingsSnapshot>,
	generation: Generation,
	state: Mutex<CommitState>,
	/// Serializes commits and loads
	commit_lock: tokio::sync::Mutex<()>,
}

impl SettingsStore {
	/// Create a store holding the defaults at version 0. Call
	/// [`load`](Self::load) to pick up persisted values.
	pub fn new(
		options: Arc<FrozenOptionRegistry>,
		hooks: Arc<ExtensionRegistry>,
		cache: Arc<CacheManager>,
		adapter: Arc<dyn SettingsAdapter>,
	) -> Self {
		let initial = SettingsSnapshot::new(0, options.defaults());
		let generation = cache.generation().clone();
		generation.publish(initial.version);

		Self {
			pipeline: SanitizationPipeline::new(options.clone(), hooks.clone()),
			options,
			hooks,
			cache,
			adapter,
			current: ArcSwap::from_pointee(initial),
			generation,
			state: Mutex::new(CommitState::Idle),
			commit_lock: tokio::sync::Mutex::new(()),
		}
	}

	/// Read persisted values and merge them onto the defaults.
	///
	/// Persisted keys that are no longer registered (and not whitelisted as
	/// extras) and values that no longer validate are dropped with a warning.
	pub async fn load(&self) -> PrResult<Arc<SettingsSnapshot>> {
		let _guard = self.commit_lock.lock().await;

		let Some(persisted) = self.adapter.load().await? else {
			info!("No persisted settings, starting from defaults");
			return Ok(self.current.load_full());
		};

		let mut values = self.options.defaults();
		let unknown: Vec<String> =
			persisted.values.keys().filter(|k| !self.options.contains(k)).cloned().collect();
		let extras = self.pipeline.whitelist_extra_keys(&unknown);

		for (key, value) in persisted.values {
			if let Some(descriptor) = self.options.get(&key) {
				match descriptor.validate(&value.to_json()) {
					Ok(value) => {
						values.insert(key, value);
					}
					Err((reason, detail)) => {
						warn!("Dropping persisted value of '{}': {} ({})", key, reason, detail);
					}
				}
			} else if extras.contains(&key) {
				values.insert(key, value);
			} else {
				warn!("Dropping persisted value of unknown option '{}'", key);
			}
		}

		let snapshot = Arc::new(SettingsSnapshot {
			version: persisted.version,
			values,
			updated_at: persisted.updated_at,
		});
		self.current.store(snapshot.clone());
		self.generation.publish(snapshot.version);
		self.cache.invalidate_all();

		info!("Loaded settings snapshot version {}", snapshot.version);
		Ok(snapshot)
	}

	pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
		self.current.load_full()
	}

	pub fn get_value(&self, key: &str) -> Option<SettingValue> {
		self.current.load().get(key).cloned()
	}

	pub fn state(&self) -> CommitState {
		*self.state.lock()
	}

	fn set_state(&self, state: CommitState) {
		debug!("Commit state: {:?}", state);
		*self.state.lock() = state;
	}

	pub fn options(&self) -> &Arc<FrozenOptionRegistry> {
		&self.options
	}

	pub fn pipeline(&self) -> &SanitizationPipeline {
		&self.pipeline
	}

	/// Validate, persist and publish a batch of changes.
	///
	/// On success the new snapshot has `version + 1`. On any failure the
	/// current snapshot is untouched.
	pub async fn commit(&self, raw: &Value) -> PrResult<Arc<SettingsSnapshot>> {
		let _guard = self.commit_lock.lock().await;
		let _idle = IdleOnExit(self);
		let current = self.current.load_full();

		// Validate
		self.set_state(CommitState::Validating);
		let values = match self.pipeline.sanitize_and_validate(raw, &current.values) {
			Ok(values) => values,
			Err(errors) => {
				self.set_state(CommitState::Rejected);
				let payload = serde_json::to_value(&errors).unwrap_or_default();
				self.hooks.invoke_action(points::SETTINGS_COMMIT_REJECTED, &[payload]);
				return Err(Error::from_validation(errors));
			}
		};

		let snapshot = Arc::new(SettingsSnapshot::new(current.version + 1, values));
		self.hooks.invoke_action(points::SETTINGS_BEFORE_COMMIT, &[snapshot.to_json()]);

		// Persist
		self.set_state(CommitState::Persisting);
		if let Err(e) = self.adapter.save(&snapshot).await {
			error!("Failed to persist settings version {}: {}", snapshot.version, e);
			return Err(match e {
				Error::PersistenceFailure(msg) => Error::PersistenceFailure(msg),
				e => Error::PersistenceFailure(e.to_string()),
			});
		}

		// Publish
		self.current.store(snapshot.clone());
		self.generation.publish(snapshot.version);
		self.set_state(CommitState::Committed);
		info!("Committed settings version {}", snapshot.version);

		self.hooks.invoke_action(points::SETTINGS_AFTER_COMMIT, &[snapshot.to_json()]);
		self.cache.invalidate_all();

		Ok(snapshot)
	}

	/// Export the current snapshot as a versioned JSON document
	pub fn export_snapshot(&self) -> PrResult<String> {
		ExportDocument::from_snapshot(&self.snapshot()).to_text()
	}

	/// Import an exported document through the regular commit path
	pub async fn import_snapshot(&self, text: &str) -> PrResult<Arc<SettingsSnapshot>> {
		let values = ExportDocument::parse(text)?;
		self.commit(&values).await
	}

	pub async fn reset_to_defaults(&self) -> PrResult<Arc<SettingsSnapshot>> {
		self.commit(&values_to_json(&self.defaults())).await
	}

	pub fn defaults(&self) -> Values {
		self.options.defaults()
	}
}

/// Returns the store to `Idle` when a commit attempt ends, including when
/// the commit future is dropped
struct IdleOnExit<'a>(&'a SettingsStore);

impl Drop for IdleOnExit<'_> {
	fn drop(&mut self) {
		self.0.set_state(CommitState::Idle);
	}
}

impl std::fmt::Debug for SettingsStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SettingsStore")
			.field("version", &self.current.load().version)
			.field("state", &self.state())
			.field("adapter", &self.adapter)
			.finish()
	}
}


// vim: ts=4
