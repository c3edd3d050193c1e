//! Option registry
//!
//! Built mutable during startup, then frozen. Everything downstream of the
//! engine builder only ever sees the frozen registry.

use std::collections::HashMap;

use crate::prelude::*;
use prism_types::types::Values;

use super::types::OptionDescriptor;

/// Mutable registry used during engine initialization
pub struct OptionRegistry {
	descriptors: HashMap<String, OptionDescriptor>,
}

impl OptionRegistry {
	pub fn new() -> Self {
		Self { descriptors: HashMap::new() }
	}

	/// Register a new option descriptor
	pub fn register(&mut self, descriptor: OptionDescriptor) -> PrResult<()> {
		if self.descriptors.contains_key(&descriptor.key) {
			return Err(Error::ConfigError(format!(
				"Option '{}' is already registered",
				descriptor.key
			)));
		}

		debug!("Registering option: {}", descriptor.key);
		self.descriptors.insert(descriptor.key.clone(), descriptor);
		Ok(())
	}

	/// Freeze the registry (make it immutable)
	pub fn freeze(self) -> FrozenOptionRegistry {
		info!("Freezing option registry with {} descriptors", self.descriptors.len());
		let mut keys: Vec<String> = self.descriptors.keys().cloned().collect();
		keys.sort();
		FrozenOptionRegistry { descriptors: self.descriptors, keys }
	}

	pub fn len(&self) -> usize {
		self.descriptors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.descriptors.is_empty()
	}
}

impl Default for OptionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Immutable registry shared by all engine components
pub struct FrozenOptionRegistry {
	descriptors: HashMap<String, OptionDescriptor>,
	/// Keys in sorted order, for deterministic iteration
	keys: Vec<String>,
}

impl FrozenOptionRegistry {
	pub fn get(&self, key: &str) -> Option<&OptionDescriptor> {
		self.descriptors.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.descriptors.contains_key(key)
	}

	/// All descriptors in key order
	pub fn list(&self) -> impl Iterator<Item = &OptionDescriptor> {
		self.keys.iter().filter_map(|k| self.descriptors.get(k))
	}

	/// Descriptors that carry an effect binding, in key order
	pub fn with_effects(&self) -> impl Iterator<Item = &OptionDescriptor> {
		self.list().filter(|d| d.effect.is_some())
	}

	/// Default values of every option
	pub fn defaults(&self) -> Values {
		self.list().map(|d| (d.key.clone(), d.default.clone())).collect()
	}

	pub fn len(&self) -> usize {
		self.descriptors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.descriptors.is_empty()
	}
}


// vim: ts=4
