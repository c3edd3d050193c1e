//! Content fingerprints for cache keys.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Incremental fingerprint builder
pub struct Hasher {
	hasher: Sha256,
}

impl Hasher {
	pub fn new() -> Self {
		Self { hasher: Sha256::new() }
	}

	/// Feeds one part; parts are length-prefixed so ("ab","c") != ("a","bc")
	pub fn update(&mut self, data: &[u8]) {
		self.hasher.update((data.len() as u64).to_le_bytes());
		self.hasher.update(data);
	}

	pub fn finalize(self, prefix: &str) -> String {
		let result = self.hasher.finalize();
		format!("{}~{}", prefix, URL_SAFE_NO_PAD.encode(result))
	}
}

impl Default for Hasher {
	fn default() -> Self {
		Self::new()
	}
}

/// Fingerprint a list of parts under a namespace prefix (e.g. `"css"`)
pub fn fingerprint<I, P>(namespace: &str, parts: I) -> String
where
	I: IntoIterator<Item = P>,
	P: AsRef<[u8]>,
{
	let mut hasher = Hasher::new();
	hasher.update(namespace.as_bytes());
	for part in parts {
		hasher.update(part.as_ref());
	}
	hasher.finalize(namespace)
}


// vim: ts=4
