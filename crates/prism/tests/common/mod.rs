//! Shared helpers for engine integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use prism::prelude::*;
use prism::render_adapter::Renderer;

/// Route engine logs to the test harness output
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// Renderer that records every call as a line of text
#[derive(Default)]
pub struct RecordingRenderer {
	calls: Mutex<Vec<String>>,
}

impl RecordingRenderer {
	pub fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.calls.lock().unwrap())
	}

	fn push(&self, call: String) {
		self.calls.lock().unwrap().push(call);
	}
}

impl Renderer for RecordingRenderer {
	fn set_css_variable(&self, name: &str, value: &str) {
		self.push(format!("var {}={}", name, value));
	}
	fn toggle_body_class(&self, class: &str, enabled: bool) {
		self.push(format!("class {}={}", class, enabled));
	}
	fn replace_css_block(&self, block_id: &str, css: &str) {
		self.push(format!("block {}={}", block_id, css));
	}
	fn refresh_component(&self, component: &str, value: &SettingValue) {
		self.push(format!("refresh {}={}", component, value));
	}
}

pub fn admin() -> Actor {
	Actor::new("admin", &["manage_options"])
}

/// Engine with the built-in catalog, in-memory persistence and a recording renderer
pub async fn create_test_engine() -> (Engine, Arc<RecordingRenderer>) {
	setup_test_logging();
	let renderer = Arc::new(RecordingRenderer::default());
	let mut builder = Engine::builder();
	builder.renderer(renderer.clone());
	let engine = builder.build().await.expect("Failed to build engine");
	(engine, renderer)
}

// vim: ts=4
