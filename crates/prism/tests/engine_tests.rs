//! End-to-end engine scenarios
//!
//! Live preview through the debounced commit, rejection of hostile input,
//! export and import, stylesheet caching, and extension point ordering.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{RecordingRenderer, admin, create_test_engine};
use prism::error::{Error, ValidationReason};
use prism::prelude::*;
use prism::preview::FlushOutcome;
use prism::types::Values;
use serde_json::json;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_preview_applies_immediately_and_commits_after_debounce() {
	let (engine, renderer) = create_test_engine().await;
	engine.preview.bind("bar-bg", "admin_bar_background").unwrap();
	let mut outcomes = engine.preview.subscribe();

	let start = Instant::now();
	engine.preview.on_control_changed("bar-bg", json!("#FF0000")).unwrap();

	assert_eq!(renderer.take(), vec!["var --mas-bar-bg=#FF0000".to_string()]);
	assert_eq!(engine.snapshot().version, 0);

	let outcome = outcomes.recv().await.unwrap();
	assert!(start.elapsed() >= Duration::from_millis(400));
	let FlushOutcome::Committed(snapshot) = &outcome else {
		panic!("expected a commit, got {:?}", outcome);
	};
	assert_eq!(snapshot.version, 1);
	assert_eq!(
		engine.store.get_value("admin_bar_background"),
		Some(SettingValue::String("#ff0000".into()))
	);
	assert!(engine.preview.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_commits_once() {
	let (engine, _renderer) = create_test_engine().await;
	engine.preview.bind("menu-width", "menu_width").unwrap();
	let mut outcomes = engine.preview.subscribe();

	for width in [180, 200, 220, 240] {
		engine.preview.on_control_changed("menu-width", json!(width)).unwrap();
		tokio::time::sleep(Duration::from_millis(100)).await;
	}

	let outcome = outcomes.recv().await.unwrap();
	assert!(outcome.is_committed());
	assert_eq!(engine.snapshot().version, 1);
	assert_eq!(engine.store.get_value("menu_width"), Some(SettingValue::Number(240.0)));
}

#[tokio::test]
async fn test_script_in_footer_is_rejected() {
	let (engine, _renderer) = create_test_engine().await;
	let rejected = Arc::new(Mutex::new(Vec::new()));
	let sink = rejected.clone();
	engine
		.hooks
		.add_action(points::SETTINGS_COMMIT_REJECTED, DEFAULT_PRIORITY, move |args| {
			sink.lock().unwrap().extend(args.iter().cloned());
			Ok(())
		})
		.unwrap();

	let res = engine
		.commit_as(
			&admin(),
			&json!({"footer_text": "<script>alert(1)</script>", "menu_width": 200}),
		)
		.await;

	let Err(Error::SecurityRejection(errors)) = &res else {
		panic!("expected a security rejection, got {:?}", res);
	};
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].key, "footer_text");
	assert_eq!(errors[0].reason, ValidationReason::ThreatPatternMatched);

	// Nothing from the batch was applied
	let snapshot = engine.snapshot();
	assert_eq!(snapshot.version, 0);
	assert_eq!(snapshot.get("menu_width"), Some(&SettingValue::Number(160.0)));
	assert_eq!(rejected.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_commit_requires_capability() {
	let (engine, _renderer) = create_test_engine().await;
	let editor = Actor::new("editor", &["edit_posts"]);

	let res = engine.commit_as(&editor, &json!({"menu_width": 200})).await;
	assert!(matches!(res, Err(Error::PermissionDenied)));
	assert!(matches!(engine.reset_as(&editor).await, Err(Error::PermissionDenied)));
	assert_eq!(engine.snapshot().version, 0);
}

#[tokio::test]
async fn test_stylesheet_regenerated_after_commit() {
	let (engine, _renderer) = create_test_engine().await;

	let before = engine.stylesheet().await.unwrap();
	assert!(before.contains("--mas-bar-bg: #23282d;"));
	let _ = engine.stylesheet().await.unwrap();
	assert_eq!(engine.stats().cache.hit_count, 1);

	let snapshot = engine.commit_as(&admin(), &json!({"admin_bar_background": "#336699"})).await.unwrap();
	assert_eq!(snapshot.version, 1);

	let after = engine.stylesheet().await.unwrap();
	assert!(after.contains("--mas-bar-bg: #336699;"));
	let stats = engine.stats();
	assert_eq!(stats.snapshot_version, 1);
	assert_eq!(stats.cache.miss_count, 2);
}

#[tokio::test]
async fn test_export_import_round_trip() {
	let (source, _) = create_test_engine().await;
	source
		.commit_as(&admin(), &json!({"menu_width": 300, "compact_mode": true, "footer_text": "Hi"}))
		.await
		.unwrap();
	let exported = source.export().unwrap();

	let (target, _) = create_test_engine().await;
	let imported = target.import_as(&admin(), &exported).await.unwrap();
	assert_eq!(imported.version, 1);
	assert_eq!(imported.values, source.snapshot().values);

	let res = target.import_as(&admin(), "{\"formatVersion\": 99, \"values\": {}}").await;
	assert!(matches!(res, Err(Error::ImportFormat(_))));
	assert_eq!(target.snapshot().version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_import_discards_pending_preview() {
	let (engine, renderer) = create_test_engine().await;
	engine.preview.bind("w", "menu_width").unwrap();
	let exported = engine.export().unwrap();

	engine.preview.on_control_changed("w", json!(300)).unwrap();
	assert_eq!(renderer.take(), vec!["var --mas-menu-width=300px".to_string()]);

	let imported = engine.import_as(&admin(), &exported).await.unwrap();
	assert_eq!(imported.version, 1);
	assert_eq!(renderer.take(), vec!["var --mas-menu-width=160px".to_string()]);

	tokio::time::sleep(Duration::from_secs(2)).await;
	let snapshot = engine.snapshot();
	assert_eq!(snapshot.version, 1);
	assert_eq!(snapshot.get("menu_width"), Some(&SettingValue::Number(160.0)));
}

#[tokio::test]
async fn test_hook_priorities_order_filters() {
	let (engine, _renderer) = create_test_engine().await;
	let order = Arc::new(Mutex::new(Vec::new()));

	for (priority, tag) in [(20, "late"), (5, "early"), (10, "default")] {
		let order = order.clone();
		engine
			.hooks
			.add_filter(points::SETTINGS_BEFORE_SAVE, priority, move |value, _| {
				order.lock().unwrap().push(tag);
				Ok(value)
			})
			.unwrap();
	}

	engine.commit_as(&admin(), &json!({"menu_width": 200})).await.unwrap();
	assert_eq!(*order.lock().unwrap(), vec!["early", "default", "late"]);

	let stats = engine.stats();
	assert_eq!(stats.hooks[points::SETTINGS_BEFORE_SAVE].invocation_count, 1);
}

#[tokio::test]
async fn test_before_save_filter_adjusts_values() {
	let (engine, _renderer) = create_test_engine().await;
	engine
		.hooks
		.add_filter(points::SETTINGS_BEFORE_SAVE, DEFAULT_PRIORITY, |mut value, _| {
			if let Some(obj) = value.as_object_mut() {
				obj.insert("compact_mode".into(), json!(true));
			}
			Ok(value)
		})
		.unwrap();

	let snapshot = engine.commit_as(&admin(), &json!({"menu_width": 200})).await.unwrap();
	assert_eq!(snapshot.get("compact_mode"), Some(&SettingValue::Bool(true)));
	assert_eq!(snapshot.get("menu_width"), Some(&SettingValue::Number(200.0)));
}

#[tokio::test]
async fn test_whitelisted_extra_keys_are_kept() {
	common::setup_test_logging();
	let builder = Engine::builder();
	builder
		.hooks()
		.add_filter(points::VALIDATE_EXTRA_KEYS, DEFAULT_PRIORITY, |keys, _| {
			let allowed: Vec<_> = keys
				.as_array()
				.into_iter()
				.flatten()
				.filter(|k| k.as_str().is_some_and(|k| k.starts_with("ext_")))
				.cloned()
				.collect();
			Ok(json!(allowed))
		})
		.unwrap();
	let engine = builder.build().await.unwrap();

	let snapshot = engine
		.commit_as(&admin(), &json!({"ext_badge": "beta"}))
		.await
		.unwrap();
	assert_eq!(snapshot.get("ext_badge"), Some(&SettingValue::String("beta".into())));

	let res = engine.commit_as(&admin(), &json!({"badge": "beta"})).await;
	let errors = res.unwrap_err();
	assert_eq!(errors.validation_errors().unwrap()[0].reason, ValidationReason::UnknownKey);
}

#[tokio::test(start_paused = true)]
async fn test_reset_restores_defaults_and_preview() {
	let (engine, renderer) = create_test_engine().await;
	engine.preview.bind("compact", "compact_mode").unwrap();
	engine.commit_as(&admin(), &json!({"compact_mode": true})).await.unwrap();
	renderer.take();

	engine.preview.on_control_changed("compact", json!(false)).unwrap();
	let snapshot = engine.reset_as(&admin()).await.unwrap();

	assert_eq!(snapshot.version, 2);
	assert_eq!(snapshot.values, defaults(&engine));
	assert!(engine.preview.pending().is_empty());
	assert_eq!(
		renderer.take(),
		vec!["class mas-compact=false".to_string(), "class mas-compact=false".to_string()]
	);
}

#[tokio::test]
async fn test_custom_option_catalog() {
	common::setup_test_logging();
	let renderer = Arc::new(RecordingRenderer::default());
	let mut builder = Engine::builder();
	builder.without_builtin_options().renderer(renderer.clone()).register_options(|registry| {
		registry.register(
			prism::options::OptionDescriptor::builder("accent")
				.option_type(prism::options::OptionType::Color)
				.default(SettingValue::String("#000000".into()))
				.effect(prism::options::EffectBinding::css_variable("--accent"))
				.build()?,
		)
	});
	let engine = builder.build().await.unwrap();

	assert_eq!(engine.options.len(), 1);
	let css = engine.stylesheet().await.unwrap();
	assert_eq!(&*css, ":root {\n\t--accent: #000000;\n}\n");
}

#[tokio::test]
async fn test_empty_catalog_is_a_config_error() {
	let mut builder = Engine::builder();
	builder.without_builtin_options();
	assert!(matches!(builder.build().await, Err(Error::ConfigError(_))));
}

fn defaults(engine: &Engine) -> Values {
	engine.store.defaults()
}

// vim: ts=4
