//! Error types shared by all Prism crates.
//!
//! Field-level validation failures are collected into [`ValidationError`]
//! lists and carried by [`Error::Validation`] or, when a threat pattern
//! matched, by [`Error::SecurityRejection`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub type PrResult<T> = std::result::Result<T, Error>;

/// Reason a single field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationReason {
	TypeMismatch,
	OutOfRange,
	ThreatPatternMatched,
	UnknownKey,
}

impl ValidationReason {
	pub fn as_str(self) -> &'static str {
		match self {
			ValidationReason::TypeMismatch => "typeMismatch",
			ValidationReason::OutOfRange => "outOfRange",
			ValidationReason::ThreatPatternMatched => "threatPatternMatched",
			ValidationReason::UnknownKey => "unknownKey",
		}
	}
}

impl fmt::Display for ValidationReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Field-level validation failure. Produced, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
	pub key: String,
	pub reason: ValidationReason,
	/// Human readable explanation
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub detail: String,
}

impl ValidationError {
	pub fn new(key: impl Into<String>, reason: ValidationReason) -> Self {
		Self { key: key.into(), reason, detail: String::new() }
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = detail.into();
		self
	}
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.detail.is_empty() {
			write!(f, "{}: {}", self.key, self.reason)
		} else {
			write!(f, "{}: {} ({})", self.key, self.reason, self.detail)
		}
	}
}

#[derive(Debug)]
pub enum Error {
	/// One or more fields failed type or range validation
	Validation(Vec<ValidationError>),
	/// The batch contained a value matching a threat pattern
	SecurityRejection(Vec<ValidationError>),
	/// The persistence collaborator failed, the snapshot was not advanced
	PersistenceFailure(String),
	/// Unknown or unsupported export format
	ImportFormat(String),
	PermissionDenied,
	UnknownControl(String),
	NotFound,
	ConfigError(String),
	Internal(String),
	Parse,

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Field errors carried by a rejected commit, if any
	pub fn validation_errors(&self) -> Option<&[ValidationError]> {
		match self {
			Error::Validation(errors) | Error::SecurityRejection(errors) => Some(errors),
			_ => None,
		}
	}

	/// Build the batch-level error for a list of field errors.
	///
	/// Any threat match turns the whole batch into a security rejection.
	pub fn from_validation(errors: Vec<ValidationError>) -> Self {
		if errors.iter().any(|e| e.reason == ValidationReason::ThreatPatternMatched) {
			Error::SecurityRejection(errors)
		} else {
			Error::Validation(errors)
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Validation(errors) => {
				write!(f, "validation failed: ")?;
				write_list(f, errors)
			}
			Error::SecurityRejection(errors) => {
				write!(f, "rejected by security scan: ")?;
				write_list(f, errors)
			}
			Error::PersistenceFailure(msg) => write!(f, "persistence failure: {}", msg),
			Error::ImportFormat(msg) => write!(f, "import format error: {}", msg),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::UnknownControl(id) => write!(f, "unknown control: {}", id),
			Error::NotFound => write!(f, "not found"),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Parse => write!(f, "parse error"),
			Error::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

fn write_list(f: &mut fmt::Formatter<'_>, errors: &[ValidationError]) -> fmt::Result {
	for (i, e) in errors.iter().enumerate() {
		if i > 0 {
			write!(f, "; ")?;
		}
		write!(f, "{}", e)?;
	}
	Ok(())
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("serde_json error: {}", err);
		Self::Parse
	}
}


// vim: ts=4
