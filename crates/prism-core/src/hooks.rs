//! Extension point registry (actions and filters)
//!
//! Third parties attach callbacks to named extension points. Actions are
//! side-effecting, filters transform a value passed along the chain.
//!
//! Callbacks run sequentially in ascending priority; equal priorities run in
//! registration order. A failing callback (returned error or panic) is
//! contained: it is logged and counted, and the chain continues. The registry
//! lock is never held while a callback runs, so callbacks may register or
//! unregister other callbacks.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::prelude::*;

pub const DEFAULT_PRIORITY: i32 = 10;

/// Well-known extension point names
pub mod points {
	/// Filter: array of unknown keys in, whitelisted subset out
	pub const VALIDATE_EXTRA_KEYS: &str = "validate.extraKeys";
	/// Filter: array of `{name, pattern}` threat rules
	pub const SECURITY_THREAT_PATTERNS: &str = "security.threatPatterns";
	/// Filter: validated values object before it is merged
	pub const SETTINGS_BEFORE_SAVE: &str = "settings.beforeSave";
	/// Action: new snapshot, before it becomes current
	pub const SETTINGS_BEFORE_COMMIT: &str = "settings.beforeCommit";
	/// Action: new snapshot, after it became current
	pub const SETTINGS_AFTER_COMMIT: &str = "settings.afterCommit";
	/// Action: validation errors of a rejected commit
	pub const SETTINGS_COMMIT_REJECTED: &str = "settings.commitRejected";
	/// Action: new cache generation
	pub const CACHE_INVALIDATED: &str = "cache.invalidated";
	/// Filter: generated stylesheet text
	pub const STYLESHEET_GENERATED: &str = "stylesheet.generated";
	/// Action: option key and raw value of a locally applied effect
	pub const PREVIEW_EFFECT_APPLIED: &str = "preview.effectApplied";
}

pub type CallbackId = u64;

/// Action callback: receives the invocation arguments
pub type ActionFunction = Arc<dyn Fn(&[Value]) -> PrResult<()> + Send + Sync>;

/// Filter callback: receives the current value and the invocation arguments
pub type FilterFunction = Arc<dyn Fn(Value, &[Value]) -> PrResult<Value> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointKind {
	Action,
	Filter,
}

impl PointKind {
	pub fn as_str(self) -> &'static str {
		match self {
			PointKind::Action => "action",
			PointKind::Filter => "filter",
		}
	}
}

/// A registered callback implementation
#[derive(Clone)]
pub enum Handler {
	Action(ActionFunction),
	Filter(FilterFunction),
}

impl Handler {
	pub fn action<F>(f: F) -> Self
	where
		F: Fn(&[Value]) -> PrResult<()> + Send + Sync + 'static,
	{
		Handler::Action(Arc::new(f))
	}

	pub fn filter<F>(f: F) -> Self
	where
		F: Fn(Value, &[Value]) -> PrResult<Value> + Send + Sync + 'static,
	{
		Handler::Filter(Arc::new(f))
	}

	pub fn kind(&self) -> PointKind {
		match self {
			Handler::Action(_) => PointKind::Action,
			Handler::Filter(_) => PointKind::Filter,
		}
	}
}

impl std::fmt::Debug for Handler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Handler::Action(_) => f.debug_tuple("Action").field(&"<function>").finish(),
			Handler::Filter(_) => f.debug_tuple("Filter").field(&"<function>").finish(),
		}
	}
}

#[derive(Debug, Clone)]
struct Callback {
	id: CallbackId,
	priority: i32,
	handler: Handler,
}

#[derive(Debug)]
struct ExtensionPoint {
	kind: PointKind,
	/// Sorted by priority, registration order within a priority
	callbacks: Vec<Callback>,
}

/// Execution telemetry for one extension point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStat {
	pub extension_point_name: String,
	pub invocation_count: u64,
	pub total_duration_nanos: u64,
	pub last_invoked_at: Option<Timestamp>,
	/// Contained callback failures (errors and panics)
	pub failure_count: u64,
}

/// Registry of extension points
pub struct ExtensionRegistry {
	points: RwLock<HashMap<String, ExtensionPoint>>,
	stats: Mutex<HashMap<String, ExecutionStat>>,
	next_id: AtomicU64,
}

impl ExtensionRegistry {
	pub fn new() -> Self {
		Self {
			points: RwLock::new(HashMap::new()),
			stats: Mutex::new(HashMap::new()),
			next_id: AtomicU64::new(1),
		}
	}

	/// Register a callback, creating the extension point on first use.
	///
	/// Fails only when the point already exists with the other kind.
	pub fn register(&self, point: &str, handler: Handler, priority: i32) -> PrResult<CallbackId> {
		let kind = handler.kind();
		let mut points = self.points.write();
		let entry = points
			.entry(point.to_string())
			.or_insert_with(|| ExtensionPoint { kind, callbacks: Vec::new() });

		if entry.kind != kind {
			return Err(Error::ConfigError(format!(
				"Extension point '{}' is an {}, cannot register {} callback",
				point,
				entry.kind.as_str(),
				kind.as_str()
			)));
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let pos = entry.callbacks.partition_point(|cb| cb.priority <= priority);
		entry.callbacks.insert(pos, Callback { id, priority, handler });

		debug!("Registered {} callback #{} on '{}' (priority {})", kind.as_str(), id, point, priority);
		Ok(id)
	}

	/// Register an action callback
	pub fn add_action<F>(&self, point: &str, priority: i32, f: F) -> PrResult<CallbackId>
	where
		F: Fn(&[Value]) -> PrResult<()> + Send + Sync + 'static,
	{
		self.register(point, Handler::action(f), priority)
	}

	/// Register a filter callback
	pub fn add_filter<F>(&self, point: &str, priority: i32, f: F) -> PrResult<CallbackId>
	where
		F: Fn(Value, &[Value]) -> PrResult<Value> + Send + Sync + 'static,
	{
		self.register(point, Handler::filter(f), priority)
	}

	/// Remove a callback, returns whether one was found
	pub fn unregister(&self, point: &str, id: CallbackId) -> bool {
		let mut points = self.points.write();
		let Some(entry) = points.get_mut(point) else {
			return false;
		};
		let before = entry.callbacks.len();
		entry.callbacks.retain(|cb| cb.id != id);
		before != entry.callbacks.len()
	}

	/// Empty an extension point. The point itself is kept.
	pub fn clear_point(&self, point: &str) -> usize {
		let mut points = self.points.write();
		points.get_mut(point).map_or(0, |entry| {
			let removed = entry.callbacks.len();
			entry.callbacks.clear();
			removed
		})
	}

	pub fn kind_of(&self, point: &str) -> Option<PointKind> {
		self.points.read().get(point).map(|entry| entry.kind)
	}

	pub fn callback_count(&self, point: &str) -> usize {
		self.points.read().get(point).map_or(0, |entry| entry.callbacks.len())
	}

	pub fn has_callbacks(&self, point: &str) -> bool {
		self.callback_count(point) > 0
	}

	/// Clone the callback chain so no lock is held while callbacks run
	fn chain(&self, point: &str, kind: PointKind) -> Vec<Callback> {
		let points = self.points.read();
		match points.get(point) {
			Some(entry) if entry.kind == kind => entry.callbacks.clone(),
			Some(entry) => {
				warn!(
					"Extension point '{}' is an {}, invoked as {}",
					point,
					entry.kind.as_str(),
					kind.as_str()
				);
				Vec::new()
			}
			None => Vec::new(),
		}
	}

	/// Run every action callback of `point` in priority order
	pub fn invoke_action(&self, point: &str, args: &[Value]) {
		let chain = self.chain(point, PointKind::Action);
		let start = Instant::now();
		let mut failures = 0;

		for cb in &chain {
			let Handler::Action(f) = &cb.handler else { continue };
			match catch_unwind(AssertUnwindSafe(|| f(args))) {
				Ok(Ok(())) => {}
				Ok(Err(e)) => {
					failures += 1;
					warn!("Action callback #{} on '{}' failed: {}", cb.id, point, e);
				}
				Err(panic) => {
					failures += 1;
					warn!(
						"Action callback #{} on '{}' panicked: {}",
						cb.id,
						point,
						panic_message(panic.as_ref())
					);
				}
			}
		}

		self.record(point, start, failures);
	}

	/// Pass `value` through every filter callback of `point` in priority order.
	///
	/// A failing callback is skipped and the value is left unchanged for that
	/// step. With no callbacks this is the identity.
	pub fn apply_filter(&self, point: &str, value: Value, args: &[Value]) -> Value {
		let chain = self.chain(point, PointKind::Filter);
		let start = Instant::now();
		let mut failures = 0;
		let mut current = value;

		for cb in &chain {
			let Handler::Filter(f) = &cb.handler else { continue };
			let input = current.clone();
			match catch_unwind(AssertUnwindSafe(|| f(input, args))) {
				Ok(Ok(next)) => current = next,
				Ok(Err(e)) => {
					failures += 1;
					warn!("Filter callback #{} on '{}' failed: {}", cb.id, point, e);
				}
				Err(panic) => {
					failures += 1;
					warn!(
						"Filter callback #{} on '{}' panicked: {}",
						cb.id,
						point,
						panic_message(panic.as_ref())
					);
				}
			}
		}

		self.record(point, start, failures);
		current
	}

	fn record(&self, point: &str, start: Instant, failures: u64) {
		let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
		let mut stats = self.stats.lock();
		let stat = stats.entry(point.to_string()).or_insert_with(|| ExecutionStat {
			extension_point_name: point.to_string(),
			..ExecutionStat::default()
		});
		stat.invocation_count += 1;
		stat.total_duration_nanos = stat.total_duration_nanos.saturating_add(elapsed);
		stat.last_invoked_at = Some(Timestamp::now());
		stat.failure_count += failures;
	}

	pub fn get_stats(&self) -> HashMap<String, ExecutionStat> {
		self.stats.lock().clone()
	}

	pub fn clear_stats(&self) {
		self.stats.lock().clear();
	}
}

impl Default for ExtensionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for ExtensionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let points = self.points.read();
		let mut names: Vec<&String> = points.keys().collect();
		names.sort();
		f.debug_struct("ExtensionRegistry").field("points", &names).finish()
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s
	} else {
		"<non-string panic payload>"
	}
}


// vim: ts=4
