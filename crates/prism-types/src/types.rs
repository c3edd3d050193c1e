//! Common types used throughout the Prism engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

// Timestamp //
//***********//
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
	}

	pub fn add_seconds(&self, seconds: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(seconds))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// SettingValue //
//**************//
/// Typed option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)] // No type tag - type inferred from OptionDescriptor
pub enum SettingValue {
	Bool(bool),
	Number(f64),
	String(String),
}

impl SettingValue {
	/// Check if this value matches the type of another value
	pub fn matches_type(&self, other: &SettingValue) -> bool {
		matches!(
			(self, other),
			(SettingValue::String(_), SettingValue::String(_))
				| (SettingValue::Number(_), SettingValue::Number(_))
				| (SettingValue::Bool(_), SettingValue::Bool(_))
		)
	}

	/// Get the type name for error messages
	pub fn type_name(&self) -> &'static str {
		match self {
			SettingValue::String(_) => "string",
			SettingValue::Number(_) => "number",
			SettingValue::Bool(_) => "bool",
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			SettingValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			SettingValue::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			SettingValue::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Convert a scalar JSON value. Arrays, objects and null yield `None`.
	pub fn from_json(value: &serde_json::Value) -> Option<SettingValue> {
		match value {
			serde_json::Value::Bool(b) => Some(SettingValue::Bool(*b)),
			serde_json::Value::Number(n) => n.as_f64().map(SettingValue::Number),
			serde_json::Value::String(s) => Some(SettingValue::String(s.clone())),
			_ => None,
		}
	}

	pub fn to_json(&self) -> serde_json::Value {
		match self {
			SettingValue::Bool(b) => serde_json::Value::Bool(*b),
			SettingValue::Number(n) => serde_json::Number::from_f64(*n)
				.map_or(serde_json::Value::Null, serde_json::Value::Number),
			SettingValue::String(s) => serde_json::Value::String(s.clone()),
		}
	}

	/// Truthiness as used by class toggles
	pub fn is_truthy(&self) -> bool {
		match self {
			SettingValue::Bool(b) => *b,
			SettingValue::Number(n) => *n != 0.0,
			SettingValue::String(s) => !s.is_empty() && s != "0" && s != "false",
		}
	}
}

/// Renders numbers without a trailing `.0` when they are integral.
impl std::fmt::Display for SettingValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SettingValue::Bool(b) => write!(f, "{}", b),
			SettingValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
				write!(f, "{:.0}", n)
			}
			SettingValue::Number(n) => write!(f, "{}", n),
			SettingValue::String(s) => f.write_str(s),
		}
	}
}

/// Option values keyed by option key, in key order
pub type Values = BTreeMap<String, SettingValue>;

// SettingsSnapshot //
//******************//
/// A complete, immutable view of all option values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
	pub version: u64,
	pub values: Values,
	pub updated_at: Timestamp,
}

impl SettingsSnapshot {
	pub fn new(version: u64, values: Values) -> Self {
		Self { version, values, updated_at: Timestamp::now() }
	}

	pub fn get(&self, key: &str) -> Option<&SettingValue> {
		self.values.get(key)
	}

	/// Values as a JSON object, the shape handed to extension points
	pub fn values_json(&self) -> serde_json::Value {
		values_to_json(&self.values)
	}

	pub fn to_json(&self) -> serde_json::Value {
		serde_json::json!({
			"version": self.version,
			"values": self.values_json(),
			"updatedAt": self.updated_at.0,
		})
	}
}

pub fn values_to_json(values: &Values) -> serde_json::Value {
	serde_json::Value::Object(values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

// Generation //
//************//
/// Shared generation counter.
///
/// The settings store publishes its snapshot version here; cache entries
/// stamped with any other value are stale.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
	pub fn new(value: u64) -> Self {
		Self(Arc::new(AtomicU64::new(value)))
	}

	pub fn current(&self) -> u64 {
		self.0.load(Ordering::Acquire)
	}

	pub fn publish(&self, value: u64) {
		self.0.store(value, Ordering::Release);
	}
}

// CacheEntry //
//************//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
	/// Content fingerprint
	pub key: String,
	pub value: Vec<u8>,
	pub size_bytes: usize,
	pub created_at: Timestamp,
	pub generation: u64,
}

// Actor //
//*******//
/// The party attempting a settings change, as seen by the permission collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
	pub id: Box<str>,
	pub roles: Box<[Box<str>]>,
}

impl Actor {
	pub fn new(id: &str, roles: &[&str]) -> Self {
		Self { id: id.into(), roles: roles.iter().map(|r| Box::from(*r)).collect() }
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r.as_ref() == role)
	}
}


// vim: ts=4
