//! Threat-pattern scanner
//!
//! A data-driven list of named regular expressions. Free text and stylesheet
//! values are rejected when any rule matches. The list is exposed to the
//! `security.threatPatterns` filter so it can be extended or narrowed.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatPattern {
	pub name: String,
	pub pattern: String,
}

impl ThreatPattern {
	pub fn new(name: &str, pattern: &str) -> Self {
		Self { name: name.to_string(), pattern: pattern.to_string() }
	}
}

/// Built-in rules
pub fn default_patterns() -> Vec<ThreatPattern> {
	vec![
		ThreatPattern::new("script_tag", r"(?i)<\s*/?\s*script\b"),
		ThreatPattern::new("embedded_frame", r"(?i)<\s*(iframe|object|embed|applet)\b"),
		ThreatPattern::new("javascript_uri", r"(?i)javascript\s*:"),
		ThreatPattern::new("vbscript_uri", r"(?i)vbscript\s*:"),
		ThreatPattern::new("data_html_uri", r"(?i)data\s*:\s*text/html"),
		// Inside a tag, or after a quote that breaks out of an attribute
		ThreatPattern::new("event_handler", r#"(?i)(^|[\s"'/;<>])on[a-z]+\s*="#),
		ThreatPattern::new("css_expression", r"(?i)expression\s*\("),
		ThreatPattern::new("css_url_script", r#"(?i)url\s*\(\s*['"]?\s*(javascript|vbscript)"#),
		ThreatPattern::new("moz_binding", r"(?i)-moz-binding"),
		ThreatPattern::new("ie_behavior", r"(?i)\bbehavior\s*:"),
		ThreatPattern::new("php_open_tag", r"(?i)<\?(php\b|=)"),
		ThreatPattern::new(
			"code_execution",
			r"(?i)\b(eval|exec|system|passthru|shell_exec|popen|proc_open|base64_decode)\s*\(",
		),
	]
}

pub fn patterns_to_json(patterns: &[ThreatPattern]) -> serde_json::Value {
	serde_json::to_value(patterns).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

/// Compiled rule set
#[derive(Debug)]
pub struct ThreatScanner {
	rules: Vec<(String, Regex)>,
}

impl ThreatScanner {
	/// Compile a rule list. Invalid patterns are skipped with a warning.
	pub fn compile(patterns: &[ThreatPattern]) -> Self {
		let rules = patterns
			.iter()
			.filter_map(|p| match Regex::new(&p.pattern) {
				Ok(re) => Some((p.name.clone(), re)),
				Err(e) => {
					warn!("Skipping invalid threat pattern '{}': {}", p.name, e);
					None
				}
			})
			.collect();
		Self { rules }
	}

	/// Compile a filter result of `[{name, pattern}]`.
	///
	/// Entries that don't have that shape are skipped with a warning.
	pub fn from_json(value: &serde_json::Value) -> Self {
		let Some(items) = value.as_array() else {
			warn!("Threat pattern list is not an array, no patterns active");
			return Self { rules: Vec::new() };
		};
		let patterns: Vec<ThreatPattern> = items
			.iter()
			.filter_map(|item| match serde_json::from_value::<ThreatPattern>(item.clone()) {
				Ok(p) => Some(p),
				Err(e) => {
					warn!("Skipping malformed threat pattern {}: {}", item, e);
					None
				}
			})
			.collect();
		Self::compile(&patterns)
	}

	/// Name of the first matching rule
	pub fn scan(&self, text: &str) -> Option<&str> {
		self.rules.iter().find(|(_, re)| re.is_match(text)).map(|(name, _)| name.as_str())
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

impl Default for ThreatScanner {
	fn default() -> Self {
		Self::compile(&default_patterns())
	}
}


// vim: ts=4
