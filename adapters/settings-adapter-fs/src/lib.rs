use std::{
	fmt::Debug,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
	fs::{File, create_dir_all, read, remove_file, rename},
	io::AsyncWriteExt,
};

use prism_types::{
	cache_adapter::CacheAdapter,
	prelude::*,
	settings_adapter::SettingsAdapter,
	types::{CacheEntry, SettingsSnapshot},
};

const SETTINGS_FILE: &str = "settings.json";

/// Writes `data` next to `path` and renames it into place
async fn write_atomic(path: &Path, data: &[u8], seq: &AtomicU64) -> PrResult<()> {
	let tmp_path = path.with_extension(format!(
		"tmp-{}-{}",
		std::process::id(),
		seq.fetch_add(1, Ordering::Relaxed)
	));

	let res = async {
		let mut file = File::create(&tmp_path).await?;
		file.write_all(data).await?;
		file.sync_all().await?;
		rename(&tmp_path, path).await?;
		Ok::<(), Error>(())
	}
	.await;
	if res.is_err() {
		debug!("write failed, removing tmpfile: {:?}", &tmp_path);
		let _ = remove_file(&tmp_path).await;
	}
	res
}

// Settings //
//**********//
/// Persists the settings snapshot as one JSON document
#[derive(Debug)]
pub struct SettingsAdapterFs {
	path: Box<Path>,
	tmp_seq: AtomicU64,
}

impl SettingsAdapterFs {
	pub async fn new(base_dir: Box<Path>) -> PrResult<Self> {
		create_dir_all(&base_dir).await?;
		Ok(Self { path: base_dir.join(SETTINGS_FILE).into(), tmp_seq: AtomicU64::new(0) })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait]
impl SettingsAdapter for SettingsAdapterFs {
	async fn load(&self) -> PrResult<Option<SettingsSnapshot>> {
		let data = match read(&self.path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let snapshot: SettingsSnapshot = serde_json::from_slice(&data)?;
		info!("Loaded settings version {} from {:?}", snapshot.version, self.path);
		Ok(Some(snapshot))
	}

	async fn save(&self, snapshot: &SettingsSnapshot) -> PrResult<()> {
		let data = serde_json::to_vec_pretty(snapshot)?;
		write_atomic(&self.path, &data, &self.tmp_seq)
			.await
			.map_err(|e| Error::PersistenceFailure(format!("{:?}: {}", self.path, e)))?;
		debug!("Saved settings version {} to {:?}", snapshot.version, self.path);
		Ok(())
	}
}

// Cache //
//*******//
/// Entry metadata, stored as the first line of an entry file
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryHeader {
	key: String,
	size_bytes: usize,
	created_at: Timestamp,
	generation: u64,
}

/// Checks a cache key and returns the part after the namespace prefix
fn key_hash(key: &str) -> PrResult<&str> {
	let valid = !key.is_empty()
		&& key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '~'));
	if !valid {
		Err(Error::Parse)?
	}
	let hash = key.find('~').map_or(key, |pos| &key[pos + 1..]);
	if hash.len() < 2 {
		Err(Error::Parse)?
	}
	Ok(hash)
}

/// Calculates the path of a cache entry, sharded by the first two hash characters
fn entry_path(base_dir: &Path, key: &str) -> PrResult<PathBuf> {
	let hash = key_hash(key)?;
	Ok(PathBuf::from(base_dir).join(&hash[0..2]).join(key))
}

/// Persistent cache tier storing one file per entry
#[derive(Debug)]
pub struct CacheAdapterFs {
	base_dir: Box<Path>,
	tmp_seq: AtomicU64,
}

impl CacheAdapterFs {
	pub async fn new(base_dir: Box<Path>) -> PrResult<Self> {
		create_dir_all(&base_dir).await?;
		Ok(Self { base_dir, tmp_seq: AtomicU64::new(0) })
	}
}

#[async_trait]
impl CacheAdapter for CacheAdapterFs {
	async fn read_entry(&self, key: &str) -> PrResult<Option<CacheEntry>> {
		let path = entry_path(&self.base_dir, key)?;
		let data = match read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};

		let split = data.iter().position(|b| *b == b'\n').ok_or(Error::Parse)?;
		let header: EntryHeader = serde_json::from_slice(&data[..split])?;
		if header.key != key {
			warn!("Cache entry {:?} holds key {}, ignoring", path, header.key);
			return Ok(None);
		}

		Ok(Some(CacheEntry {
			key: header.key,
			value: data[split + 1..].to_vec(),
			size_bytes: header.size_bytes,
			created_at: header.created_at,
			generation: header.generation,
		}))
	}

	async fn write_entry(&self, entry: &CacheEntry) -> PrResult<()> {
		let path = entry_path(&self.base_dir, &entry.key)?;
		if let Some(dir) = path.parent() {
			create_dir_all(dir).await?;
		}

		let header = EntryHeader {
			key: entry.key.clone(),
			size_bytes: entry.size_bytes,
			created_at: entry.created_at,
			generation: entry.generation,
		};
		let mut data = serde_json::to_vec(&header)?;
		data.push(b'\n');
		data.extend_from_slice(&entry.value);

		write_atomic(&path, &data, &self.tmp_seq).await
	}

	async fn remove_entry(&self, key: &str) -> PrResult<bool> {
		match remove_file(entry_path(&self.base_dir, key)?).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod test {
	use std::path::{Path, PathBuf};

	use crate::entry_path;

	#[test]
	fn test_entry_path() {
		let path = entry_path(Path::new("cache"), "css~AbCdEf").unwrap_or_default();
		assert_eq!(path, PathBuf::from("cache/Ab/css~AbCdEf"));
	}

	#[test]
	fn test_entry_path_rejects_traversal() {
		assert!(entry_path(Path::new("cache"), "../etc/passwd").is_err());
		assert!(entry_path(Path::new("cache"), "css~a/b").is_err());
		assert!(entry_path(Path::new("cache"), "css~").is_err());
		assert!(entry_path(Path::new("cache"), "").is_err());
	}
}

// vim: ts=4
