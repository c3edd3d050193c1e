//! Option descriptor types and definitions
//!
//! Declarative metadata for each option: its type and constraints, default
//! value, optional custom validator, and the live-preview effect it drives.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::prelude::*;
use crate::sanitize::validators;
use prism_types::error::ValidationReason;
use prism_types::types::SettingValue;

/// Type alias for a custom option validator, run after type validation
pub type OptionValidator = Box<dyn Fn(&SettingValue) -> Result<(), String> + Send + Sync>;

/// Plain option kind, without constraint data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionKind {
	Color,
	Number,
	Boolean,
	Text,
	Choice,
	FreeformCss,
}

impl OptionKind {
	/// Whether values of this kind may embed markup or code and must be scanned
	pub fn is_scannable(self) -> bool {
		matches!(self, OptionKind::Text | OptionKind::FreeformCss)
	}
}

/// Option type with its constraints
#[derive(Debug, Clone, PartialEq)]
pub enum OptionType {
	Color,
	Number { min: Option<f64>, max: Option<f64> },
	Boolean,
	Text { max_len: Option<usize> },
	Choice(Box<[Box<str>]>),
	FreeformCss { max_len: Option<usize> },
}

impl OptionType {
	pub fn number(min: f64, max: f64) -> Self {
		OptionType::Number { min: Some(min), max: Some(max) }
	}

	pub fn text() -> Self {
		OptionType::Text { max_len: None }
	}

	pub fn choice(choices: &[&str]) -> Self {
		OptionType::Choice(choices.iter().map(|c| Box::from(*c)).collect())
	}

	pub fn freeform_css() -> Self {
		OptionType::FreeformCss { max_len: None }
	}

	pub fn kind(&self) -> OptionKind {
		match self {
			OptionType::Color => OptionKind::Color,
			OptionType::Number { .. } => OptionKind::Number,
			OptionType::Boolean => OptionKind::Boolean,
			OptionType::Text { .. } => OptionKind::Text,
			OptionType::Choice(_) => OptionKind::Choice,
			OptionType::FreeformCss { .. } => OptionKind::FreeformCss,
		}
	}
}

/// Kind of live visual effect an option drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
	/// Set a CSS custom property; target is the property name
	CssVariable,
	/// Toggle a class on the body; target is the class token
	BodyClass,
	/// Inject a CSS rule block; target is a selector template
	RawCssBlock,
	/// Re-invoke a named renderer; target is the component name
	ComponentRefresh,
}

/// Mapping from an option to an immediately-applicable visual effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectBinding {
	pub kind: EffectKind,
	pub target: Box<str>,
	/// Unit appended to numeric values of CSS variables (e.g. `px`)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unit: Option<Box<str>>,
}

impl EffectBinding {
	pub fn css_variable(name: &str) -> Self {
		Self { kind: EffectKind::CssVariable, target: name.into(), unit: None }
	}

	pub fn body_class(class: &str) -> Self {
		Self { kind: EffectKind::BodyClass, target: class.into(), unit: None }
	}

	pub fn raw_css_block(template: &str) -> Self {
		Self { kind: EffectKind::RawCssBlock, target: template.into(), unit: None }
	}

	pub fn component_refresh(component: &str) -> Self {
		Self { kind: EffectKind::ComponentRefresh, target: component.into(), unit: None }
	}

	pub fn with_unit(mut self, unit: &str) -> Self {
		self.unit = Some(unit.into());
		self
	}

	/// Value as it is written into CSS.
	///
	/// Numeric strings (raw control input) get the unit too.
	pub fn css_value(&self, value: &SettingValue) -> String {
		match (value, &self.unit) {
			(SettingValue::Number(_), Some(unit)) => format!("{}{}", value, unit),
			(SettingValue::String(s), Some(unit)) if s.trim().parse::<f64>().is_ok() => {
				format!("{}{}", s.trim(), unit)
			}
			_ => value.to_string(),
		}
	}

	/// Render a `RawCssBlock` template for a value.
	///
	/// `{value}` placeholders are substituted; a template without one is
	/// treated as a selector wrapping the value.
	pub fn render_block(&self, value: &SettingValue) -> String {
		let css = self.css_value(value);
		if self.target.contains("{value}") {
			self.target.replace("{value}", &css)
		} else {
			format!("{} {{ {} }}", self.target, css)
		}
	}
}

/// Option descriptor - defines metadata for each option
pub struct OptionDescriptor {
	/// Unique key (e.g., "admin_bar_background")
	pub key: String,

	/// Human-readable label
	pub label: String,

	pub option_type: OptionType,

	pub default: SettingValue,

	/// Optional custom validation function
	pub validator: Option<OptionValidator>,

	pub effect: Option<EffectBinding>,
}

impl Debug for OptionDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OptionDescriptor")
			.field("key", &self.key)
			.field("label", &self.label)
			.field("option_type", &self.option_type)
			.field("default", &self.default)
			.field("validator", &self.validator.is_some())
			.field("effect", &self.effect)
			.finish()
	}
}

impl OptionDescriptor {
	/// Create a builder for constructing an OptionDescriptor
	pub fn builder(key: impl Into<String>) -> OptionDescriptorBuilder {
		OptionDescriptorBuilder::new(key)
	}

	pub fn kind(&self) -> OptionKind {
		self.option_type.kind()
	}

	/// Run the type validator and the custom validator on a raw value
	pub fn validate(
		&self,
		raw: &serde_json::Value,
	) -> Result<SettingValue, (ValidationReason, String)> {
		let value = validators::coerce(&self.option_type, raw)?;
		if let Some(validator) = &self.validator {
			validator(&value).map_err(|msg| (ValidationReason::OutOfRange, msg))?;
		}
		Ok(value)
	}
}

/// Builder for OptionDescriptor with fluent API
pub struct OptionDescriptorBuilder {
	key: String,
	label: Option<String>,
	option_type: Option<OptionType>,
	default: Option<SettingValue>,
	validator: Option<OptionValidator>,
	effect: Option<EffectBinding>,
}

impl OptionDescriptorBuilder {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			label: None,
			option_type: None,
			default: None,
			validator: None,
			effect: None,
		}
	}

	/// Set the label (defaults to the key)
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	/// Set the option type (required)
	pub fn option_type(mut self, option_type: OptionType) -> Self {
		self.option_type = Some(option_type);
		self
	}

	/// Set the default value (required)
	pub fn default(mut self, value: SettingValue) -> Self {
		self.default = Some(value);
		self
	}

	/// Set a validation function
	pub fn validator<F>(mut self, f: F) -> Self
	where
		F: Fn(&SettingValue) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(f));
		self
	}

	/// Bind a live-preview effect
	pub fn effect(mut self, effect: EffectBinding) -> Self {
		self.effect = Some(effect);
		self
	}

	/// Build the OptionDescriptor
	pub fn build(self) -> PrResult<OptionDescriptor> {
		if self.key.is_empty() {
			return Err(Error::ConfigError("Option key must not be empty".into()));
		}
		let option_type = self.option_type.ok_or_else(|| {
			Error::ConfigError(format!("Option '{}' has no type", self.key))
		})?;
		let default = self.default.ok_or_else(|| {
			Error::ConfigError(format!("Option '{}' has no default value", self.key))
		})?;

		if let Some(effect) = &self.effect {
			if effect.target.trim().is_empty() {
				return Err(Error::ConfigError(format!(
					"Option '{}' has an effect binding with an empty target",
					self.key
				)));
			}
		}

		let descriptor = OptionDescriptor {
			label: self.label.unwrap_or_else(|| self.key.clone()),
			key: self.key,
			option_type,
			default,
			validator: self.validator,
			effect: self.effect,
		};

		// The default must survive its own validation, otherwise reset would fail
		match descriptor.validate(&descriptor.default.to_json()) {
			Ok(value) if value == descriptor.default => Ok(descriptor),
			Ok(value) => Err(Error::ConfigError(format!(
				"Default of option '{}' is not in canonical form (expected {:?})",
				descriptor.key, value
			))),
			Err((reason, detail)) => Err(Error::ConfigError(format!(
				"Default of option '{}' is invalid: {} ({})",
				descriptor.key, reason, detail
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_requires_type_and_default() {
		assert!(OptionDescriptor::builder("x").build().is_err());
		assert!(
			OptionDescriptor::builder("x").option_type(OptionType::Boolean).build().is_err()
		);
		assert!(
			OptionDescriptor::builder("x")
				.option_type(OptionType::Boolean)
				.default(SettingValue::Bool(false))
				.build()
				.is_ok()
		);
	}

	#[test]
	fn test_builder_rejects_empty_effect_target() {
		let res = OptionDescriptor::builder("bar_bg")
			.option_type(OptionType::Color)
			.default(SettingValue::String("#23282d".into()))
			.effect(EffectBinding::css_variable("  "))
			.build();
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_builder_rejects_invalid_default() {
		let res = OptionDescriptor::builder("width")
			.option_type(OptionType::number(160.0, 400.0))
			.default(SettingValue::Number(20.0))
			.build();
		assert!(matches!(res, Err(Error::ConfigError(_))));

		let res = OptionDescriptor::builder("bar_bg")
			.option_type(OptionType::Color)
			.default(SettingValue::String("#ABCDEF".into()))
			.build();
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_custom_validator() {
		let desc = OptionDescriptor::builder("even")
			.option_type(OptionType::Number { min: None, max: None })
			.default(SettingValue::Number(2.0))
			.validator(|v| match v.as_f64() {
				Some(n) if n % 2.0 == 0.0 => Ok(()),
				_ => Err("must be even".into()),
			})
			.build()
			.unwrap();
		assert!(desc.validate(&serde_json::json!(4)).is_ok());
		let err = desc.validate(&serde_json::json!(3)).unwrap_err();
		assert_eq!(err.0, ValidationReason::OutOfRange);
	}

	#[test]
	fn test_effect_rendering() {
		let width = EffectBinding::css_variable("--mas-menu-width").with_unit("px");
		assert_eq!(width.css_value(&SettingValue::Number(240.0)), "240px");

		let block =
			EffectBinding::raw_css_block("#wpadminbar { height: {value}; }").with_unit("px");
		assert_eq!(
			block.render_block(&SettingValue::Number(40.0)),
			"#wpadminbar { height: 40px; }"
		);

		let wrap = EffectBinding::raw_css_block("body.mas");
		assert_eq!(
			wrap.render_block(&SettingValue::String("color: red;".into())),
			"body.mas { color: red; }"
		);
	}
}

// vim: ts=4
