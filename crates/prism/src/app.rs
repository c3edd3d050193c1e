//! Engine builder - wires the Prism components together

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::prelude::*;
use prism_core::cache::{CacheManager, CacheStats};
use prism_core::hooks::{ExecutionStat, ExtensionRegistry};
use prism_core::memory::MemorySettingsAdapter;
use prism_core::options::{FrozenOptionRegistry, OptionRegistry, builtin};
use prism_core::preview::PreviewDispatcher;
use prism_core::store::SettingsStore;
use prism_core::stylesheet::StylesheetGenerator;
use prism_types::cache_adapter::CacheAdapter;
use prism_types::permission::{PermissionCheck, RolePermission};
use prism_types::render_adapter::{NullRenderer, Renderer};
use prism_types::settings_adapter::SettingsAdapter;
use prism_types::types::Generation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Type alias for option catalog registration callbacks
type RegisterOptions = Box<dyn FnOnce(&mut OptionRegistry) -> PrResult<()> + Send>;

pub struct EngineBuilder {
	opts: EngineOpts,
	settings_adapter: Option<Arc<dyn SettingsAdapter>>,
	cache_adapter: Option<Arc<dyn CacheAdapter>>,
	renderer: Option<Arc<dyn Renderer>>,
	permission: Option<Arc<dyn PermissionCheck>>,
	builtin_options: bool,
	register_options: Vec<RegisterOptions>,
	hooks: Arc<ExtensionRegistry>,
}

impl EngineBuilder {
	/// Builder starting from [`EngineOpts::from_env`]. Explicit setters
	/// override the environment.
	pub fn new() -> Self {
		// Embedders may have installed their own subscriber already
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		EngineBuilder {
			opts: EngineOpts::from_env(),
			settings_adapter: None,
			cache_adapter: None,
			renderer: None,
			permission: None,
			builtin_options: true,
			register_options: Vec::new(),
			hooks: Arc::new(ExtensionRegistry::new()),
		}
	}

	// Opts
	pub fn opts(&mut self, opts: EngineOpts) -> &mut Self {
		self.opts = opts;
		self
	}
	pub fn debounce(&mut self, debounce: Duration) -> &mut Self {
		self.opts.debounce = debounce;
		self
	}
	pub fn cache_capacity(&mut self, capacity: usize) -> &mut Self {
		self.opts.cache_capacity = capacity;
		self
	}
	pub fn cache_max_bytes(&mut self, max_bytes: usize) -> &mut Self {
		self.opts.cache_max_bytes = max_bytes;
		self
	}
	pub fn capability(&mut self, capability: impl Into<Box<str>>) -> &mut Self {
		self.opts.capability = capability.into();
		self
	}

	// Collaborators
	pub fn settings_adapter(&mut self, adapter: Arc<dyn SettingsAdapter>) -> &mut Self {
		self.settings_adapter = Some(adapter);
		self
	}
	pub fn cache_adapter(&mut self, adapter: Arc<dyn CacheAdapter>) -> &mut Self {
		self.cache_adapter = Some(adapter);
		self
	}
	pub fn renderer(&mut self, renderer: Arc<dyn Renderer>) -> &mut Self {
		self.renderer = Some(renderer);
		self
	}
	pub fn permission(&mut self, permission: Arc<dyn PermissionCheck>) -> &mut Self {
		self.permission = Some(permission);
		self
	}

	/// Skip the built-in admin styling catalog
	pub fn without_builtin_options(&mut self) -> &mut Self {
		self.builtin_options = false;
		self
	}

	/// Register additional option descriptors when the engine is built
	pub fn register_options<F>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(&mut OptionRegistry) -> PrResult<()> + Send + 'static,
	{
		self.register_options.push(Box::new(f));
		self
	}

	/// Extension registry of the engine being built.
	///
	/// Callbacks that must see the initial load (e.g. `validate.extraKeys`)
	/// have to be registered here, before [`build`](Self::build).
	pub fn hooks(&self) -> &Arc<ExtensionRegistry> {
		&self.hooks
	}

	pub async fn build(self) -> PrResult<Engine> {
		info!("Prism settings engine V{}", VERSION);

		// Option catalog
		let mut registry = OptionRegistry::new();
		if self.builtin_options {
			builtin::register_options(&mut registry)?;
		}
		for register in self.register_options {
			register(&mut registry)?;
		}
		if registry.is_empty() {
			error!("FATAL: No options registered");
			return Err(Error::ConfigError("No options registered".into()));
		}
		info!("Registered {} options", registry.len());
		let options = Arc::new(registry.freeze());

		let settings_adapter = self.settings_adapter.unwrap_or_else(|| {
			warn!("No settings adapter configured, changes will not survive a restart");
			Arc::new(MemorySettingsAdapter::new())
		});

		// Cache
		let mut cache = CacheManager::new(
			self.opts.cache_capacity,
			self.opts.cache_max_bytes,
			Generation::default(),
			self.hooks.clone(),
		);
		if let Some(cache_adapter) = self.cache_adapter {
			cache = cache.with_persistent(cache_adapter);
		}
		let cache = Arc::new(cache);
		info!(
			"Cache initialized (capacity: {}, max bytes: {})",
			self.opts.cache_capacity, self.opts.cache_max_bytes
		);

		// Settings store
		let store = Arc::new(SettingsStore::new(
			options.clone(),
			self.hooks.clone(),
			cache.clone(),
			settings_adapter,
		));
		store.load().await?;

		let renderer = self.renderer.unwrap_or_else(|| Arc::new(NullRenderer));
		let permission = self
			.permission
			.unwrap_or_else(|| Arc::new(RolePermission::new(self.opts.capability.clone())));

		let preview = Arc::new(PreviewDispatcher::new(
			store.clone(),
			self.hooks.clone(),
			renderer,
			self.opts.debounce,
			self.opts.outcome_buffer,
		));
		let stylesheet =
			Arc::new(StylesheetGenerator::new(store.clone(), cache.clone(), self.hooks.clone()));

		info!("Engine ready at settings version {}", store.snapshot().version);
		Ok(Engine {
			opts: Arc::new(self.opts),
			options,
			hooks: self.hooks,
			cache,
			store,
			preview,
			stylesheet,
			permission,
		})
	}
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Diagnostics view of a running engine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
	pub snapshot_version: u64,
	pub hooks: HashMap<String, ExecutionStat>,
	pub cache: CacheStats,
}

/// A running engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
	pub opts: Arc<EngineOpts>,
	pub options: Arc<FrozenOptionRegistry>,
	pub hooks: Arc<ExtensionRegistry>,
	pub cache: Arc<CacheManager>,
	pub store: Arc<SettingsStore>,
	pub preview: Arc<PreviewDispatcher>,
	pub stylesheet: Arc<StylesheetGenerator>,
	permission: Arc<dyn PermissionCheck>,
}

impl Engine {
	pub fn builder() -> EngineBuilder {
		EngineBuilder::new()
	}

	pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
		self.store.snapshot()
	}

	pub fn check_permission(&self, actor: &Actor) -> PrResult<()> {
		if self.permission.can_modify_settings(actor) {
			Ok(())
		} else {
			warn!("Permission denied for actor '{}'", actor.id);
			Err(Error::PermissionDenied)
		}
	}

	/// Commit on behalf of an actor
	pub async fn commit_as(
		&self,
		actor: &Actor,
		raw: &serde_json::Value,
	) -> PrResult<Arc<SettingsSnapshot>> {
		self.check_permission(actor)?;
		self.store.commit(raw).await
	}

	/// Import an export document on behalf of an actor.
	///
	/// Pending preview edits are dropped and every bound effect is refreshed
	/// from the imported values.
	pub async fn import_as(&self, actor: &Actor, text: &str) -> PrResult<Arc<SettingsSnapshot>> {
		self.check_permission(actor)?;
		self.preview.import_snapshot(text).await
	}

	/// Reset every option to its default on behalf of an actor
	pub async fn reset_as(&self, actor: &Actor) -> PrResult<Arc<SettingsSnapshot>> {
		self.check_permission(actor)?;
		self.preview.reset_to_defaults().await
	}

	pub fn export(&self) -> PrResult<String> {
		self.store.export_snapshot()
	}

	/// Generated stylesheet for the current snapshot
	pub async fn stylesheet(&self) -> PrResult<Arc<str>> {
		self.stylesheet.stylesheet().await
	}

	pub fn stats(&self) -> EngineStats {
		EngineStats {
			snapshot_version: self.store.snapshot().version,
			hooks: self.hooks.get_stats(),
			cache: self.cache.stats(),
		}
	}
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("opts", &self.opts)
			.field("store", &self.store)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}


// vim: ts=4
