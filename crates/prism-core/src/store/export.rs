//! Export document format

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prelude::*;
use prism_types::types::SettingsSnapshot;

pub const EXPORT_FORMAT_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
	pub format_version: u64,
	pub exported_at: Timestamp,
	pub values: Value,
}

impl ExportDocument {
	pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Self {
		Self {
			format_version: EXPORT_FORMAT_VERSION,
			exported_at: Timestamp::now(),
			values: snapshot.values_json(),
		}
	}

	pub fn to_text(&self) -> PrResult<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	/// Parse an export document and check its format version.
	///
	/// Returns the raw values object. Values are not validated here.
	pub fn parse(text: &str) -> PrResult<Value> {
		let doc: Value = serde_json::from_str(text)
			.map_err(|e| Error::ImportFormat(format!("not a JSON document: {}", e)))?;

		let version = doc
			.get("formatVersion")
			.ok_or_else(|| Error::ImportFormat("missing formatVersion".into()))?;
		if version.as_u64() != Some(EXPORT_FORMAT_VERSION) {
			return Err(Error::ImportFormat(format!("unsupported formatVersion {}", version)));
		}

		match doc.get("values") {
			Some(values @ Value::Object(_)) => Ok(values.clone()),
			Some(_) => Err(Error::ImportFormat("values must be an object".into())),
			None => Err(Error::ImportFormat("missing values".into())),
		}
	}
}


// vim: ts=4
