//! Rendering collaborator contract.
//!
//! Implemented by whatever UI layer hosts the live preview dispatcher. All
//! calls are presentational: they never fail and never touch persisted state.

use crate::types::SettingValue;

pub trait Renderer: Send + Sync {
	/// Set a CSS custom property (e.g. `--mas-bar-bg`) on the live view
	fn set_css_variable(&self, name: &str, value: &str);

	/// Add or remove a class token on the document body
	fn toggle_body_class(&self, class: &str, enabled: bool);

	/// Inject or replace the CSS rule block identified by `block_id`
	fn replace_css_block(&self, block_id: &str, css: &str);

	/// Re-invoke a named component renderer
	fn refresh_component(&self, component: &str, value: &SettingValue);
}

/// Renderer that discards every call, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
	fn set_css_variable(&self, _name: &str, _value: &str) {}
	fn toggle_body_class(&self, _class: &str, _enabled: bool) {}
	fn replace_css_block(&self, _block_id: &str, _css: &str) {}
	fn refresh_component(&self, _component: &str, _value: &SettingValue) {}
}

// vim: ts=4
