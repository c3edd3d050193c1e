//! Engine options

use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_MAX_BYTES};
use crate::prelude::*;
use crate::preview::{DEFAULT_DEBOUNCE, DEFAULT_OUTCOME_BUFFER};

pub const DEFAULT_CAPABILITY: &str = "manage_options";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOpts {
	/// Quiet period before pending preview edits are committed
	pub debounce: Duration,
	/// In-process cache item limit
	pub cache_capacity: usize,
	/// In-process cache byte budget
	pub cache_max_bytes: usize,
	/// Flush outcomes buffered per preview subscriber
	pub outcome_buffer: usize,
	/// Role an actor needs to modify settings
	pub capability: Box<str>,
}

impl Default for EngineOpts {
	fn default() -> Self {
		Self {
			debounce: DEFAULT_DEBOUNCE,
			cache_capacity: DEFAULT_CACHE_CAPACITY,
			cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
			outcome_buffer: DEFAULT_OUTCOME_BUFFER,
			capability: DEFAULT_CAPABILITY.into(),
		}
	}
}

impl EngineOpts {
	/// Defaults overridden by `PRISM_*` environment variables.
	///
	/// Unparsable values are logged and ignored.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let mut opts = Self::default();
		if let Some(ms) = parse_var::<u64>(&lookup, "PRISM_DEBOUNCE_MS") {
			opts.debounce = Duration::from_millis(ms);
		}
		if let Some(capacity) = parse_var(&lookup, "PRISM_CACHE_CAPACITY") {
			opts.cache_capacity = capacity;
		}
		if let Some(max_bytes) = parse_var(&lookup, "PRISM_CACHE_MAX_BYTES") {
			opts.cache_max_bytes = max_bytes;
		}
		if let Some(capability) = lookup("PRISM_CAPABILITY").filter(|c| !c.trim().is_empty()) {
			opts.capability = capability.trim().into();
		}
		opts
	}
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
	let raw = lookup(name)?;
	match raw.trim().parse() {
		Ok(value) => Some(value),
		Err(_) => {
			warn!("Ignoring invalid value for {}: {:?}", name, raw);
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_defaults() {
		let opts = EngineOpts::default();
		assert_eq!(opts.debounce, Duration::from_millis(400));
		assert_eq!(opts.cache_capacity, 256);
		assert_eq!(opts.cache_max_bytes, 4 * 1024 * 1024);
		assert_eq!(&*opts.capability, "manage_options");
	}

	#[test]
	fn test_overrides() {
		let vars: HashMap<&str, &str> = [
			("PRISM_DEBOUNCE_MS", "150"),
			("PRISM_CACHE_CAPACITY", "lots"),
			("PRISM_CACHE_MAX_BYTES", " 1024 "),
			("PRISM_CAPABILITY", "edit_theme_options"),
		]
		.into_iter()
		.collect();
		let opts = EngineOpts::from_lookup(|name| vars.get(name).map(ToString::to_string));

		assert_eq!(opts.debounce, Duration::from_millis(150));
		assert_eq!(opts.cache_capacity, 256);
		assert_eq!(opts.cache_max_bytes, 1024);
		assert_eq!(&*opts.capability, "edit_theme_options");
	}
}

// vim: ts=4
