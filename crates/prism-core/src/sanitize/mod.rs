//! Sanitization pipeline
//!
//! Turns an untrusted input map into typed values, or rejects the whole batch.
//! Stages: unknown-key handling, type validation, threat scanning, then the
//! `settings.beforeSave` filter and a merge onto the current values.

pub mod threat;
pub mod validators;

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::hooks::{ExtensionRegistry, points};
use crate::options::FrozenOptionRegistry;
use crate::prelude::*;
use prism_types::error::{ValidationError, ValidationReason};
use prism_types::types::{SettingValue, Values, values_to_json};

pub use threat::{ThreatPattern, ThreatScanner};

pub struct SanitizationPipeline {
	options: Arc<FrozenOptionRegistry>,
	hooks: Arc<ExtensionRegistry>,
	/// Last compiled rule set with the filter output it was compiled from
	scanner: Mutex<Option<(Value, Arc<ThreatScanner>)>>,
}

impl SanitizationPipeline {
	pub fn new(options: Arc<FrozenOptionRegistry>, hooks: Arc<ExtensionRegistry>) -> Self {
		Self { options, hooks, scanner: Mutex::new(None) }
	}

	/// Extra keys the `validate.extraKeys` filter lets through
	pub fn whitelist_extra_keys(&self, unknown: &[String]) -> HashSet<String> {
		if unknown.is_empty() {
			return HashSet::new();
		}
		let input = Value::Array(unknown.iter().cloned().map(Value::String).collect());
		let output = self.hooks.apply_filter(points::VALIDATE_EXTRA_KEYS, input, &[]);
		let Some(allowed) = output.as_array() else {
			warn!("{} returned a non-array, no extra keys allowed", points::VALIDATE_EXTRA_KEYS);
			return HashSet::new();
		};
		allowed
			.iter()
			.filter_map(Value::as_str)
			.filter(|key| unknown.iter().any(|k| k == key))
			.map(str::to_string)
			.collect()
	}

	/// Active threat rules, recompiled only when the filter output changes
	pub fn threat_scanner(&self) -> Arc<ThreatScanner> {
		let patterns = self.hooks.apply_filter(
			points::SECURITY_THREAT_PATTERNS,
			threat::patterns_to_json(&threat::default_patterns()),
			&[],
		);

		let mut cached = self.scanner.lock();
		if let Some((source, scanner)) = cached.as_ref() {
			if *source == patterns {
				return scanner.clone();
			}
		}
		let scanner = Arc::new(ThreatScanner::from_json(&patterns));
		debug!("Compiled {} threat patterns", scanner.len());
		*cached = Some((patterns, scanner.clone()));
		scanner
	}

	/// Validate `raw` and merge it onto `current`.
	///
	/// All-or-nothing: on any field error the full error list is returned and
	/// nothing is merged.
	pub fn sanitize_and_validate(
		&self,
		raw: &Value,
		current: &Values,
	) -> Result<Values, Vec<ValidationError>> {
		let Some(input) = raw.as_object() else {
			return Err(vec![
				ValidationError::new("", ValidationReason::TypeMismatch)
					.with_detail("input must be an object"),
			]);
		};

		let mut keys: Vec<&String> = input.keys().collect();
		keys.sort();

		let unknown: Vec<String> =
			keys.iter().filter(|k| !self.options.contains(k)).map(|k| (*k).clone()).collect();
		let extras = self.whitelist_extra_keys(&unknown);
		let scanner = self.threat_scanner();

		let mut typed = Values::new();
		let mut errors = Vec::new();

		for key in keys {
			let raw_value = &input[key.as_str()];
			let (value, scannable) = if let Some(descriptor) = self.options.get(key) {
				match descriptor.validate(raw_value) {
					Ok(value) => (value, descriptor.kind().is_scannable()),
					Err((reason, detail)) => {
						errors.push(ValidationError::new(key.as_str(), reason).with_detail(detail));
						continue;
					}
				}
			} else if extras.contains(key.as_str()) {
				match SettingValue::from_json(raw_value) {
					Some(value) => (value, true),
					None => {
						errors.push(
							ValidationError::new(key.as_str(), ValidationReason::TypeMismatch)
								.with_detail("extra keys accept scalar values only"),
						);
						continue;
					}
				}
			} else {
				errors.push(ValidationError::new(key.as_str(), ValidationReason::UnknownKey));
				continue;
			};

			if scannable {
				if let Some(rule) = value.as_str().and_then(|text| scanner.scan(text)) {
					errors.push(
						ValidationError::new(key.as_str(), ValidationReason::ThreatPatternMatched)
							.with_detail(format!("matched rule '{}'", rule)),
					);
					continue;
				}
			}
			typed.insert(key.clone(), value);
		}

		if !errors.is_empty() {
			if errors.iter().any(|e| e.reason == ValidationReason::ThreatPatternMatched) {
				let keys: Vec<&str> = errors
					.iter()
					.filter(|e| e.reason == ValidationReason::ThreatPatternMatched)
					.map(|e| e.key.as_str())
					.collect();
				warn!("Security rejection, threat patterns matched in: {}", keys.join(", "));
			} else {
				debug!("Validation rejected {} field(s)", errors.len());
			}
			return Err(errors);
		}

		let filtered = self.before_save(typed, current, &extras);
		let mut merged = current.clone();
		merged.extend(filtered);
		Ok(merged)
	}

	/// Run `settings.beforeSave`, falling back to `typed` on malformed output
	fn before_save(&self, typed: Values, current: &Values, extras: &HashSet<String>) -> Values {
		let output = self.hooks.apply_filter(
			points::SETTINGS_BEFORE_SAVE,
			values_to_json(&typed),
			&[values_to_json(current)],
		);

		let Some(object) = output.as_object() else {
			warn!("{} returned a non-object, result discarded", points::SETTINGS_BEFORE_SAVE);
			return typed;
		};

		let mut filtered = Values::new();
		for (key, raw) in object {
			let Some(value) = SettingValue::from_json(raw) else {
				warn!(
					"{} returned a non-scalar for '{}', result discarded",
					points::SETTINGS_BEFORE_SAVE,
					key
				);
				return typed;
			};
			match self.options.get(key) {
				Some(descriptor) if !value.matches_type(&descriptor.default) => {
					warn!(
						"{} changed the type of '{}' to {}, keeping validated value",
						points::SETTINGS_BEFORE_SAVE,
						key,
						value.type_name()
					);
					if let Some(original) = typed.get(key) {
						filtered.insert(key.clone(), original.clone());
					}
				}
				Some(_) => {
					filtered.insert(key.clone(), value);
				}
				None if extras.contains(key) || current.contains_key(key) => {
					filtered.insert(key.clone(), value);
				}
				None => {
					warn!("{} added unknown key '{}', dropped", points::SETTINGS_BEFORE_SAVE, key);
				}
			}
		}
		filtered
	}
}

impl std::fmt::Debug for SanitizationPipeline {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SanitizationPipeline").field("options", &self.options.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::options::{OptionRegistry, builtin};
	use serde_json::json;

	fn pipeline() -> (SanitizationPipeline, Arc<ExtensionRegistry>, Values) {
		let mut registry = OptionRegistry::new();
		builtin::register_options(&mut registry).unwrap();
		let options = Arc::new(registry.freeze());
		let defaults = options.defaults();
		let hooks = Arc::new(ExtensionRegistry::new());
		(SanitizationPipeline::new(options, hooks.clone()), hooks, defaults)
	}

	fn reasons(errors: &[ValidationError]) -> Vec<(&str, ValidationReason)> {
		errors.iter().map(|e| (e.key.as_str(), e.reason)).collect()
	}

	#[test]
	fn test_valid_batch_merges_onto_current() {
		let (pipeline, _, defaults) = pipeline();
		let values = pipeline
			.sanitize_and_validate(
				&json!({"admin_bar_background": "#FF0000", "menu_width": "240"}),
				&defaults,
			)
			.unwrap();
		assert_eq!(values["admin_bar_background"], SettingValue::String("#ff0000".into()));
		assert_eq!(values["menu_width"], SettingValue::Number(240.0));
		assert_eq!(values.len(), defaults.len());
		assert_eq!(values["menu_collapsed"], defaults["menu_collapsed"]);
	}

	#[test]
	fn test_all_or_nothing() {
		let (pipeline, _, defaults) = pipeline();
		let errors = pipeline
			.sanitize_and_validate(
				&json!({
					"admin_bar_background": "#00ff00",
					"menu_width": 9000,
					"compact_mode": "perhaps",
					"no_such_option": 1,
				}),
				&defaults,
			)
			.unwrap_err();
		assert_eq!(
			reasons(&errors),
			vec![
				("compact_mode", ValidationReason::TypeMismatch),
				("menu_width", ValidationReason::OutOfRange),
				("no_such_option", ValidationReason::UnknownKey),
			]
		);
	}

	#[test]
	fn test_script_in_footer_rejected() {
		let (pipeline, _, defaults) = pipeline();
		let errors = pipeline
			.sanitize_and_validate(&json!({"footer_text": "<script>alert(1)</script>"}), &defaults)
			.unwrap_err();
		assert_eq!(reasons(&errors), vec![("footer_text", ValidationReason::ThreatPatternMatched)]);
	}

	#[test]
	fn test_colors_are_not_scanned() {
		let (pipeline, hooks, defaults) = pipeline();
		hooks
			.add_filter(points::SECURITY_THREAT_PATTERNS, 10, |_, _| {
				Ok(json!([{"name": "hex", "pattern": "#"}]))
			})
			.unwrap();
		assert!(
			pipeline
				.sanitize_and_validate(&json!({"admin_bar_background": "#123456"}), &defaults)
				.is_ok()
		);
		assert!(
			pipeline.sanitize_and_validate(&json!({"footer_text": "#1 theme"}), &defaults).is_err()
		);
	}

	#[test]
	fn test_threat_patterns_filter_can_narrow() {
		let (pipeline, hooks, defaults) = pipeline();
		hooks
			.add_filter(points::SECURITY_THREAT_PATTERNS, 10, |patterns, _| {
				let kept: Vec<Value> = patterns
					.as_array()
					.into_iter()
					.flatten()
					.filter(|p| p["name"] != "code_execution")
					.cloned()
					.collect();
				Ok(Value::Array(kept))
			})
			.unwrap();
		assert!(
			pipeline
				.sanitize_and_validate(&json!({"footer_text": "Run system() daily"}), &defaults)
				.is_ok()
		);
	}

	#[test]
	fn test_extra_keys_whitelist() {
		let (pipeline, hooks, defaults) = pipeline();
		hooks
			.add_filter(points::VALIDATE_EXTRA_KEYS, 10, |keys, _| {
				let kept: Vec<Value> = keys
					.as_array()
					.into_iter()
					.flatten()
					.filter(|k| k.as_str().is_some_and(|k| k.starts_with("ext_")))
					.cloned()
					.collect();
				Ok(Value::Array(kept))
			})
			.unwrap();

		let values = pipeline
			.sanitize_and_validate(&json!({"ext_badge": "new", "ext_count": 3}), &defaults)
			.unwrap();
		assert_eq!(values["ext_badge"], SettingValue::String("new".into()));

		let errors = pipeline
			.sanitize_and_validate(&json!({"ext_list": [1], "other": 1}), &defaults)
			.unwrap_err();
		assert_eq!(
			reasons(&errors),
			vec![
				("ext_list", ValidationReason::TypeMismatch),
				("other", ValidationReason::UnknownKey),
			]
		);

		let errors = pipeline
			.sanitize_and_validate(&json!({"ext_badge": "javascript:alert(1)"}), &defaults)
			.unwrap_err();
		assert_eq!(reasons(&errors), vec![("ext_badge", ValidationReason::ThreatPatternMatched)]);
	}

	#[test]
	fn test_before_save_filter() {
		let (pipeline, hooks, defaults) = pipeline();
		hooks
			.add_filter(points::SETTINGS_BEFORE_SAVE, 10, |mut values, _| {
				values["compact_mode"] = json!(true);
				values["menu_width"] = json!("not a number");
				values["injected"] = json!("x");
				Ok(values)
			})
			.unwrap();

		let values =
			pipeline.sanitize_and_validate(&json!({"menu_width": 200}), &defaults).unwrap();
		assert_eq!(values["compact_mode"], SettingValue::Bool(true));
		assert_eq!(values["menu_width"], SettingValue::Number(200.0));
		assert!(!values.contains_key("injected"));
	}

	#[test]
	fn test_before_save_malformed_result_discarded() {
		let (pipeline, hooks, defaults) = pipeline();
		hooks.add_filter(points::SETTINGS_BEFORE_SAVE, 10, |_, _| Ok(json!([1, 2]))).unwrap();
		let values =
			pipeline.sanitize_and_validate(&json!({"menu_width": 200}), &defaults).unwrap();
		assert_eq!(values["menu_width"], SettingValue::Number(200.0));
	}

	#[test]
	fn test_non_object_input() {
		let (pipeline, _, defaults) = pipeline();
		let errors = pipeline.sanitize_and_validate(&json!("nope"), &defaults).unwrap_err();
		assert_eq!(errors[0].reason, ValidationReason::TypeMismatch);
	}
}

// vim: ts=4
