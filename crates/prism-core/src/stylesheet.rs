//! Stylesheet generation
//!
//! Renders the committed snapshot into one stylesheet: a `:root` block with
//! every CSS variable binding, followed by the raw CSS blocks in key order.
//! Results are cached under a fingerprint of the snapshot values.

use std::fmt::Write;
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::hooks::{ExtensionRegistry, points};
use crate::options::{EffectKind, FrozenOptionRegistry};
use crate::prelude::*;
use crate::store::SettingsStore;
use prism_types::hasher::fingerprint;
use prism_types::types::SettingsSnapshot;

pub struct StylesheetGenerator {
	store: Arc<SettingsStore>,
	cache: Arc<CacheManager>,
	hooks: Arc<ExtensionRegistry>,
}

impl StylesheetGenerator {
	pub fn new(
		store: Arc<SettingsStore>,
		cache: Arc<CacheManager>,
		hooks: Arc<ExtensionRegistry>,
	) -> Self {
		Self { store, cache, hooks }
	}

	/// Cache key of the stylesheet for a snapshot
	pub fn cache_key(snapshot: &SettingsSnapshot) -> String {
		fingerprint("css", [snapshot.values_json().to_string()])
	}

	/// Stylesheet for the current snapshot, generated on cache miss
	pub async fn stylesheet(&self) -> PrResult<Arc<str>> {
		let snapshot = self.store.snapshot();
		let key = Self::cache_key(&snapshot);

		if let Some(bytes) = self.cache.get(&key).await {
			match String::from_utf8(bytes) {
				Ok(css) => return Ok(css.into()),
				Err(_) => warn!("Cached stylesheet {} is not UTF-8, regenerating", key),
			}
		}

		let rendered = render(self.store.options(), &snapshot);
		let filtered = self.hooks.apply_filter(
			points::STYLESHEET_GENERATED,
			serde_json::Value::String(rendered.clone()),
			&[snapshot.to_json()],
		);
		let css = match filtered {
			serde_json::Value::String(css) => css,
			_ => {
				warn!("{} returned a non-string, keeping generated text", points::STYLESHEET_GENERATED);
				rendered
			}
		};

		let size = css.len();
		if let Err(e) = self.cache.put(&key, css.clone().into_bytes(), size).await {
			warn!("Failed to cache stylesheet {}: {}", key, e);
		}
		debug!("Generated stylesheet for version {} ({} bytes)", snapshot.version, size);
		Ok(css.into())
	}
}

/// Render a snapshot without caching or filtering
pub fn render(options: &FrozenOptionRegistry, snapshot: &SettingsSnapshot) -> String {
	let mut variables = String::new();
	let mut blocks = String::new();

	for descriptor in options.with_effects() {
		let (Some(effect), Some(value)) = (&descriptor.effect, snapshot.get(&descriptor.key))
		else {
			continue;
		};
		match effect.kind {
			EffectKind::CssVariable => {
				let _ = writeln!(variables, "\t{}: {};", effect.target, effect.css_value(value));
			}
			EffectKind::RawCssBlock => {
				let block = effect.render_block(value);
				if !value.to_string().trim().is_empty() && !block.trim().is_empty() {
					let _ = writeln!(blocks, "{}", block.trim());
				}
			}
			EffectKind::BodyClass | EffectKind::ComponentRefresh => {}
		}
	}

	let mut css = String::new();
	if !variables.is_empty() {
		let _ = writeln!(css, ":root {{\n{}}}", variables);
	}
	css.push_str(&blocks);
	css
}


// vim: ts=4
