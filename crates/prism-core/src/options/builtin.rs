//! Built-in option catalog
//!
//! Registers the admin styling options shipped with the engine. Third-party
//! catalogs register their own descriptors the same way.

use crate::prelude::*;
use prism_types::types::SettingValue;

use super::registry::OptionRegistry;
use super::types::{EffectBinding, OptionDescriptor, OptionType};

fn color(value: &str) -> SettingValue {
	SettingValue::String(value.into())
}

/// Register all built-in options
pub fn register_options(registry: &mut OptionRegistry) -> PrResult<()> {
	// Admin bar
	registry.register(
		OptionDescriptor::builder("admin_bar_background")
			.label("Admin bar background")
			.option_type(OptionType::Color)
			.default(color("#23282d"))
			.effect(EffectBinding::css_variable("--mas-bar-bg"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("admin_bar_text_color")
			.label("Admin bar text color")
			.option_type(OptionType::Color)
			.default(color("#ffffff"))
			.effect(EffectBinding::css_variable("--mas-bar-text"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("admin_bar_height")
			.label("Admin bar height")
			.option_type(OptionType::number(24.0, 64.0))
			.default(SettingValue::Number(32.0))
			.effect(EffectBinding::css_variable("--mas-bar-height").with_unit("px"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("admin_bar_floating")
			.label("Floating admin bar")
			.option_type(OptionType::Boolean)
			.default(SettingValue::Bool(false))
			.effect(EffectBinding::body_class("mas-bar-floating"))
			.build()?,
	)?;

	// Admin menu
	registry.register(
		OptionDescriptor::builder("menu_background")
			.label("Menu background")
			.option_type(OptionType::Color)
			.default(color("#23282d"))
			.effect(EffectBinding::css_variable("--mas-menu-bg"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("menu_text_color")
			.label("Menu text color")
			.option_type(OptionType::Color)
			.default(color("#f0f0f1"))
			.effect(EffectBinding::css_variable("--mas-menu-text"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("menu_width")
			.label("Menu width")
			.option_type(OptionType::number(160.0, 400.0))
			.default(SettingValue::Number(160.0))
			.effect(EffectBinding::css_variable("--mas-menu-width").with_unit("px"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("menu_border_radius")
			.label("Menu border radius")
			.option_type(OptionType::number(0.0, 32.0))
			.default(SettingValue::Number(0.0))
			.effect(
				EffectBinding::raw_css_block("#adminmenu li { border-radius: {value}; }")
					.with_unit("px"),
			)
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("menu_collapsed")
			.label("Collapse menu")
			.option_type(OptionType::Boolean)
			.default(SettingValue::Bool(false))
			.effect(EffectBinding::body_class("folded"))
			.build()?,
	)?;

	// General
	registry.register(
		OptionDescriptor::builder("color_scheme")
			.label("Color scheme")
			.option_type(OptionType::choice(&["light", "dark", "auto"]))
			.default(SettingValue::String("light".into()))
			.effect(EffectBinding::component_refresh("color-scheme"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("compact_mode")
			.label("Compact mode")
			.option_type(OptionType::Boolean)
			.default(SettingValue::Bool(false))
			.effect(EffectBinding::body_class("mas-compact"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("footer_text")
			.label("Footer text")
			.option_type(OptionType::Text { max_len: Some(500) })
			.default(SettingValue::String(String::new()))
			.effect(EffectBinding::component_refresh("footer"))
			.build()?,
	)?;
	registry.register(
		OptionDescriptor::builder("custom_css")
			.label("Custom CSS")
			.option_type(OptionType::FreeformCss { max_len: Some(64 * 1024) })
			.default(SettingValue::String(String::new()))
			.effect(EffectBinding::raw_css_block("{value}"))
			.build()?,
	)?;

	Ok(())
}


// vim: ts=4
