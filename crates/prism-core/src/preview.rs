//! Live preview dispatcher
//!
//! Control edits are applied to the renderer immediately and collected into a
//! pending batch. After the debounce window passes without further edits the
//! batch is sent to the settings store as one commit.
//!
//! - At most one flush is in flight. Edits arriving meanwhile are buffered and
//!   start a new debounce cycle once it resolves.
//! - A rejected or failed flush reverts the effects of its keys to the last
//!   committed values, unless they were edited again in the meantime.
//! - [`PreviewDispatcher::refresh_all`] drops the pending batch and detaches
//!   any in-flight flush from the buffer and the rendered effects.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::hooks::{ExtensionRegistry, points};
use crate::options::{EffectBinding, EffectKind};
use crate::prelude::*;
use crate::store::SettingsStore;
use prism_types::error::ValidationError;
use prism_types::render_adapter::Renderer;
use prism_types::types::{SettingValue, SettingsSnapshot};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);
pub const DEFAULT_OUTCOME_BUFFER: usize = 32;

/// Result of one flush, published to subscribers
#[derive(Debug, Clone)]
pub enum FlushOutcome {
	Committed(Arc<SettingsSnapshot>),
	Rejected(Vec<ValidationError>),
	/// The store failed for a reason other than validation
	Failed(String),
}

impl FlushOutcome {
	pub fn is_committed(&self) -> bool {
		matches!(self, FlushOutcome::Committed(_))
	}
}

#[derive(Default)]
struct DispatchState {
	/// control id -> option key
	bindings: HashMap<String, String>,
	/// option key -> raw value, last write wins
	pending: BTreeMap<String, Value>,
	/// Token of the armed debounce timer. Timer tasks are never aborted; a
	/// task whose token no longer matches wakes up and does nothing.
	timer: Option<u64>,
	next_timer: u64,
	flushing: bool,
	/// Bumped whenever pending work is cancelled
	epoch: u64,
}

impl DispatchState {
	fn cancel(&mut self) {
		self.timer = None;
		self.pending.clear();
		self.epoch += 1;
	}
}

struct Inner {
	store: Arc<SettingsStore>,
	hooks: Arc<ExtensionRegistry>,
	renderer: Arc<dyn Renderer>,
	debounce: Duration,
	state: Mutex<DispatchState>,
	outcomes: broadcast::Sender<FlushOutcome>,
}

pub struct PreviewDispatcher {
	inner: Arc<Inner>,
}

impl PreviewDispatcher {
	pub fn new(
		store: Arc<SettingsStore>,
		hooks: Arc<ExtensionRegistry>,
		renderer: Arc<dyn Renderer>,
		debounce: Duration,
		outcome_buffer: usize,
	) -> Self {
		let (outcomes, _) = broadcast::channel(outcome_buffer.max(1));
		Self {
			inner: Arc::new(Inner {
				store,
				hooks,
				renderer,
				debounce,
				state: Mutex::new(DispatchState::default()),
				outcomes,
			}),
		}
	}

	/// Bind a UI control to an option
	pub fn bind(&self, control_id: &str, option_key: &str) -> PrResult<()> {
		if !self.inner.store.options().contains(option_key) {
			return Err(Error::ConfigError(format!(
				"Cannot bind control '{}' to unknown option '{}'",
				control_id, option_key
			)));
		}
		debug!("Binding control {} -> {}", control_id, option_key);
		self.inner.state.lock().bindings.insert(control_id.to_string(), option_key.to_string());
		Ok(())
	}

	pub fn unbind(&self, control_id: &str) -> bool {
		self.inner.state.lock().bindings.remove(control_id).is_some()
	}

	/// Option key a control is bound to
	pub fn binding(&self, control_id: &str) -> Option<String> {
		self.inner.state.lock().bindings.get(control_id).cloned()
	}

	/// Handle an edit of a bound control.
	///
	/// The effect is applied right away without validation; the value only
	/// reaches the store through the debounced flush.
	pub fn on_control_changed(&self, control_id: &str, raw: Value) -> PrResult<()> {
		let Some(key) = self.binding(control_id) else {
			return Err(Error::UnknownControl(control_id.to_string()));
		};

		match SettingValue::from_json(&raw) {
			Some(value) => self.inner.apply_effect(&key, &value),
			None => debug!("Not previewing non-scalar value for {}", key),
		}
		let args = [json!(key), raw.clone()];
		self.inner.hooks.invoke_action(points::PREVIEW_EFFECT_APPLIED, &args);

		let mut state = self.inner.state.lock();
		state.pending.insert(key, raw);
		state.timer = None;
		if !state.flushing {
			self.inner.arm_timer(&mut state)?;
		}
		Ok(())
	}

	/// Flush the pending batch immediately.
	///
	/// Returns `None` when there is nothing to flush or a flush is already in
	/// flight.
	pub async fn flush_now(&self) -> Option<FlushOutcome> {
		self.inner.state.lock().timer = None;
		// The commit runs in its own task so dropping this future can't
		// leave the dispatcher stuck mid-flush
		let inner = self.inner.clone();
		match tokio::spawn(async move { inner.flush(None).await }).await {
			Ok(outcome) => outcome,
			Err(e) => {
				warn!("Preview flush task failed: {}", e);
				None
			}
		}
	}

	/// Drop pending edits and re-apply every bound effect from the current
	/// snapshot.
	///
	/// Returns the committed value for every bound control, so the UI can
	/// reset its widgets.
	pub fn refresh_all(&self) -> Vec<(String, SettingValue)> {
		self.inner.state.lock().cancel();
		self.inner.reapply_all()
	}

	/// Cancel pending edits, reset the store to defaults and refresh
	pub async fn reset_to_defaults(&self) -> PrResult<Arc<SettingsSnapshot>> {
		self.inner.state.lock().cancel();
		let result = self.inner.store.reset_to_defaults().await;
		self.settle("Reset to defaults", result)
	}

	/// Cancel pending edits, import an export document and refresh
	pub async fn import_snapshot(&self, text: &str) -> PrResult<Arc<SettingsSnapshot>> {
		self.inner.state.lock().cancel();
		let result = self.inner.store.import_snapshot(text).await;
		self.settle("Import", result)
	}

	/// Re-apply effects after a store-level replacement and publish it
	fn settle(
		&self,
		what: &str,
		result: PrResult<Arc<SettingsSnapshot>>,
	) -> PrResult<Arc<SettingsSnapshot>> {
		self.inner.reapply_all();
		match &result {
			Ok(snapshot) => self.inner.publish(FlushOutcome::Committed(snapshot.clone())),
			Err(e) => warn!("{} failed: {}", what, e),
		}
		result
	}

	pub fn subscribe(&self) -> broadcast::Receiver<FlushOutcome> {
		self.inner.outcomes.subscribe()
	}

	/// Edits waiting for the next flush
	pub fn pending(&self) -> BTreeMap<String, Value> {
		self.inner.state.lock().pending.clone()
	}

	pub fn is_flushing(&self) -> bool {
		self.inner.state.lock().flushing
	}
}

impl Drop for PreviewDispatcher {
	fn drop(&mut self) {
		// A sleeping timer finds its token gone and exits
		self.inner.state.lock().timer = None;
	}
}

impl std::fmt::Debug for PreviewDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("PreviewDispatcher")
			.field("bindings", &state.bindings.len())
			.field("pending", &state.pending.len())
			.field("flushing", &state.flushing)
			.field("debounce", &self.inner.debounce)
			.finish()
	}
}

impl Inner {
	/// Start a debounce timer and make it the armed one
	fn arm_timer(self: &Arc<Self>, state: &mut DispatchState) -> PrResult<()> {
		let handle = tokio::runtime::Handle::try_current()
			.map_err(|e| Error::Internal(format!("no async runtime for debounce timer: {}", e)))?;
		state.next_timer += 1;
		let token = state.next_timer;
		state.timer = Some(token);

		let inner = self.clone();
		handle.spawn(async move {
			tokio::time::sleep(inner.debounce).await;
			inner.flush(Some(token)).await;
		});
		Ok(())
	}

	/// Commit the pending batch.
	///
	/// A timer passes its token and only flushes while it is still the armed
	/// timer.
	async fn flush(self: &Arc<Self>, token: Option<u64>) -> Option<FlushOutcome> {
		let (batch, epoch) = {
			let mut state = self.state.lock();
			if token.is_some() && state.timer != token {
				return None;
			}
			state.timer = None;
			if state.flushing || state.pending.is_empty() {
				return None;
			}
			state.flushing = true;
			(std::mem::take(&mut state.pending), state.epoch)
		};

		debug!("Flushing {} pending edit(s)", batch.len());
		let raw = Value::Object(batch.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
		let outcome = match self.store.commit(&raw).await {
			Ok(snapshot) => FlushOutcome::Committed(snapshot),
			Err(e) => match e.validation_errors() {
				Some(errors) => FlushOutcome::Rejected(errors.to_vec()),
				None => FlushOutcome::Failed(e.to_string()),
			},
		};

		let revert: Vec<String> = {
			let mut state = self.state.lock();
			state.flushing = false;
			if !state.pending.is_empty() && state.timer.is_none() {
				if let Err(e) = self.arm_timer(&mut state) {
					warn!("Cannot schedule follow-up flush: {}", e);
				}
			}

			if state.epoch != epoch || outcome.is_committed() {
				Vec::new()
			} else {
				batch.into_keys().filter(|key| !state.pending.contains_key(key)).collect()
			}
		};

		if !revert.is_empty() {
			debug!("Reverting preview of {} key(s)", revert.len());
			let snapshot = self.store.snapshot();
			for key in &revert {
				if let Some(value) = snapshot.get(key) {
					self.apply_effect(key, value);
				}
			}
		}

		self.publish(outcome.clone());
		Some(outcome)
	}

	fn publish(&self, outcome: FlushOutcome) {
		// No subscribers is fine
		let _ = self.outcomes.send(outcome);
	}

	fn apply_effect(&self, key: &str, value: &SettingValue) {
		let Some(effect) = self.store.options().get(key).and_then(|d| d.effect.as_ref()) else {
			return;
		};
		render_effect(self.renderer.as_ref(), key, effect, value);
	}

	fn reapply_all(&self) -> Vec<(String, SettingValue)> {
		let bindings: Vec<(String, String)> = {
			let state = self.state.lock();
			let mut bindings: Vec<_> =
				state.bindings.iter().map(|(c, k)| (c.clone(), k.clone())).collect();
			bindings.sort();
			bindings
		};

		let snapshot = self.store.snapshot();
		let mut applied = BTreeSet::new();
		let mut controls = Vec::with_capacity(bindings.len());
		for (control, key) in bindings {
			let Some(value) = snapshot.get(&key) else { continue };
			if applied.insert(key.clone()) {
				self.apply_effect(&key, value);
			}
			controls.push((control, value.clone()));
		}
		debug!("Re-applied {} effect(s) from version {}", applied.len(), snapshot.version);
		controls
	}
}

/// Render one effect binding through the renderer
pub fn render_effect(
	renderer: &dyn Renderer,
	key: &str,
	effect: &EffectBinding,
	value: &SettingValue,
) {
	match effect.kind {
		EffectKind::CssVariable => {
			renderer.set_css_variable(&effect.target, &effect.css_value(value));
		}
		EffectKind::BodyClass => renderer.toggle_body_class(&effect.target, value.is_truthy()),
		EffectKind::RawCssBlock => renderer.replace_css_block(key, &effect.render_block(value)),
		EffectKind::ComponentRefresh => renderer.refresh_component(&effect.target, value),
	}
}


// vim: ts=4
