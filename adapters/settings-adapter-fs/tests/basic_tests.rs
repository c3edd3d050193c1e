//! Filesystem adapter tests
//!
//! Settings persistence round trips and persistent cache tier operations

use prism_settings_adapter_fs::{CacheAdapterFs, SettingsAdapterFs};
use prism_types::cache_adapter::CacheAdapter;
use prism_types::error::Error;
use prism_types::settings_adapter::SettingsAdapter;
use prism_types::types::{CacheEntry, SettingValue, SettingsSnapshot, Timestamp, Values};
use tempfile::TempDir;

async fn create_settings_adapter() -> (SettingsAdapterFs, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter = SettingsAdapterFs::new(temp_dir.path().into())
		.await
		.expect("Failed to create adapter");
	(adapter, temp_dir)
}

async fn create_cache_adapter() -> (CacheAdapterFs, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter =
		CacheAdapterFs::new(temp_dir.path().join("cache").into()).await.expect("Failed to create adapter");
	(adapter, temp_dir)
}

fn entry(key: &str, value: &[u8], generation: u64) -> CacheEntry {
	CacheEntry {
		key: key.to_string(),
		value: value.to_vec(),
		size_bytes: value.len(),
		created_at: Timestamp(1_700_000_000),
		generation,
	}
}

#[tokio::test]
async fn test_load_without_file() {
	let (adapter, _temp) = create_settings_adapter().await;
	assert!(adapter.load().await.expect("load failed").is_none());
}

#[tokio::test]
async fn test_save_and_load_snapshot() {
	let (adapter, temp) = create_settings_adapter().await;
	let mut values = Values::new();
	values.insert("admin_bar_background".into(), SettingValue::String("#ff0000".into()));
	values.insert("menu_width".into(), SettingValue::Number(240.0));
	values.insert("compact_mode".into(), SettingValue::Bool(true));
	let snapshot = SettingsSnapshot::new(4, values);

	adapter.save(&snapshot).await.expect("save failed");
	let loaded = adapter.load().await.expect("load failed").expect("snapshot missing");
	assert_eq!(loaded, snapshot);

	// Only the settings file is left behind
	let names: Vec<String> = std::fs::read_dir(temp.path())
		.expect("read_dir failed")
		.filter_map(|e| e.ok().map(|e| e.file_name().to_string_lossy().into_owned()))
		.collect();
	assert_eq!(names, vec!["settings.json".to_string()]);
}

#[tokio::test]
async fn test_save_overwrites() {
	let (adapter, _temp) = create_settings_adapter().await;
	adapter.save(&SettingsSnapshot::new(1, Values::new())).await.expect("save failed");
	adapter.save(&SettingsSnapshot::new(2, Values::new())).await.expect("save failed");
	let loaded = adapter.load().await.expect("load failed").expect("snapshot missing");
	assert_eq!(loaded.version, 2);
}

#[tokio::test]
async fn test_corrupt_settings_file() {
	let (adapter, _temp) = create_settings_adapter().await;
	std::fs::write(adapter.path(), b"{ not json").expect("write failed");
	assert!(matches!(adapter.load().await, Err(Error::Parse)));
}

#[tokio::test]
async fn test_save_failure_is_persistence_failure() {
	let (adapter, temp) = create_settings_adapter().await;
	// A directory in place of the target makes the rename fail
	std::fs::create_dir(temp.path().join("settings.json")).expect("mkdir failed");
	let res = adapter.save(&SettingsSnapshot::new(1, Values::new())).await;
	assert!(matches!(res, Err(Error::PersistenceFailure(_))));
}

#[tokio::test]
async fn test_cache_entry_round_trip() {
	let (adapter, _temp) = create_cache_adapter().await;
	let stored = entry("css~Zm9vYmFy", b":root {\n\t--mas-bar-bg: #23282d;\n}\n", 3);

	adapter.write_entry(&stored).await.expect("write failed");
	let loaded = adapter.read_entry("css~Zm9vYmFy").await.expect("read failed");
	assert_eq!(loaded, Some(stored));
}

#[tokio::test]
async fn test_cache_missing_entry() {
	let (adapter, _temp) = create_cache_adapter().await;
	assert_eq!(adapter.read_entry("css~missing").await.expect("read failed"), None);
	assert!(!adapter.remove_entry("css~missing").await.expect("remove failed"));
}

#[tokio::test]
async fn test_cache_remove_entry() {
	let (adapter, _temp) = create_cache_adapter().await;
	adapter.write_entry(&entry("css~abcdef", b"body{}", 1)).await.expect("write failed");
	assert!(adapter.remove_entry("css~abcdef").await.expect("remove failed"));
	assert_eq!(adapter.read_entry("css~abcdef").await.expect("read failed"), None);
}

#[tokio::test]
async fn test_cache_binary_value_with_newlines() {
	let (adapter, _temp) = create_cache_adapter().await;
	let value = [0u8, b'\n', 255, b'\n', 7];
	adapter.write_entry(&entry("bin~xyzxyz", &value, 9)).await.expect("write failed");
	let loaded = adapter.read_entry("bin~xyzxyz").await.expect("read failed").expect("missing");
	assert_eq!(loaded.value, value);
	assert_eq!(loaded.generation, 9);
}

#[tokio::test]
async fn test_cache_invalid_key() {
	let (adapter, _temp) = create_cache_adapter().await;
	assert!(adapter.read_entry("../../settings").await.is_err());
	assert!(adapter.write_entry(&entry("a/b~cd", b"x", 1)).await.is_err());
}

// vim: ts=4
