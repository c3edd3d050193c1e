//! Per-type validators
//!
//! Each validator coerces a raw JSON value into the canonical typed value of
//! an option, or reports why it can't.

use serde_json::Value;

use crate::options::OptionType;
use prism_types::error::ValidationReason;
use prism_types::types::SettingValue;

type Rejection = (ValidationReason, String);

fn mismatch(expected: &str, raw: &Value) -> Rejection {
	(ValidationReason::TypeMismatch, format!("expected {}, got {}", expected, json_type(raw)))
}

fn json_type(raw: &Value) -> &'static str {
	match raw {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

/// Coerce a raw value to the canonical form for an option type
pub fn coerce(option_type: &OptionType, raw: &Value) -> Result<SettingValue, Rejection> {
	match option_type {
		OptionType::Color => color(raw),
		OptionType::Number { min, max } => number(raw, *min, *max),
		OptionType::Boolean => boolean(raw),
		OptionType::Text { max_len } => {
			let text = raw.as_str().ok_or_else(|| mismatch("string", raw))?;
			check_len(text, *max_len)?;
			Ok(SettingValue::String(text.to_string()))
		}
		OptionType::Choice(choices) => {
			let choice = raw.as_str().ok_or_else(|| mismatch("string", raw))?;
			if choices.iter().any(|c| c.as_ref() == choice) {
				Ok(SettingValue::String(choice.to_string()))
			} else {
				Err((
					ValidationReason::OutOfRange,
					format!("'{}' is not one of [{}]", choice, choices.join(", ")),
				))
			}
		}
		OptionType::FreeformCss { max_len } => {
			let css = raw.as_str().ok_or_else(|| mismatch("string", raw))?;
			check_len(css, *max_len)?;
			check_css_syntax(css).map_err(|msg| (ValidationReason::TypeMismatch, msg))?;
			Ok(SettingValue::String(css.to_string()))
		}
	}
}

fn check_len(text: &str, max_len: Option<usize>) -> Result<(), Rejection> {
	match max_len {
		Some(max) if text.chars().count() > max => {
			Err((ValidationReason::OutOfRange, format!("longer than {} characters", max)))
		}
		_ => Ok(()),
	}
}

/// Hex color: `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`, normalized to lower case
fn color(raw: &Value) -> Result<SettingValue, Rejection> {
	let text = raw.as_str().ok_or_else(|| mismatch("color string", raw))?.trim();
	let valid = text.strip_prefix('#').is_some_and(|hex| {
		matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
	});
	if valid {
		Ok(SettingValue::String(text.to_ascii_lowercase()))
	} else {
		Err((ValidationReason::TypeMismatch, format!("'{}' is not a hex color", text)))
	}
}

fn number(raw: &Value, min: Option<f64>, max: Option<f64>) -> Result<SettingValue, Rejection> {
	let n = match raw {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse::<f64>().ok(),
		_ => None,
	}
	.filter(|n| n.is_finite())
	.ok_or_else(|| mismatch("finite number", raw))?;

	if let Some(min) = min.filter(|min| n < *min) {
		return Err((ValidationReason::OutOfRange, format!("{} is below minimum {}", n, min)));
	}
	if let Some(max) = max.filter(|max| n > *max) {
		return Err((ValidationReason::OutOfRange, format!("{} is above maximum {}", n, max)));
	}
	Ok(SettingValue::Number(n))
}

fn boolean(raw: &Value) -> Result<SettingValue, Rejection> {
	match raw {
		Value::Bool(b) => Ok(SettingValue::Bool(*b)),
		Value::Number(n) => match n.as_f64() {
			Some(v) if v == 0.0 => Ok(SettingValue::Bool(false)),
			Some(v) if (v - 1.0).abs() < f64::EPSILON => Ok(SettingValue::Bool(true)),
			_ => Err((ValidationReason::TypeMismatch, format!("{} is not 0 or 1", n))),
		},
		Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
			"1" | "true" | "on" | "yes" => Ok(SettingValue::Bool(true)),
			"0" | "false" | "off" | "no" | "" => Ok(SettingValue::Bool(false)),
			other => Err((ValidationReason::TypeMismatch, format!("'{}' is not a boolean", other))),
		},
		_ => Err(mismatch("boolean", raw)),
	}
}

/// Structural sanity check for stylesheet text.
///
/// Braces, brackets and parentheses must balance outside strings and
/// comments; comments and strings must be terminated; the text must not be
/// able to close the surrounding style element.
pub fn check_css_syntax(css: &str) -> Result<(), String> {
	if css.to_ascii_lowercase().contains("</style") {
		return Err("contains a closing style tag".into());
	}

	let mut stack: Vec<char> = Vec::new();
	let mut chars = css.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'/' if chars.peek() == Some(&'*') => {
				chars.next();
				let mut closed = false;
				while let Some(c) = chars.next() {
					if c == '*' && chars.peek() == Some(&'/') {
						chars.next();
						closed = true;
						break;
					}
				}
				if !closed {
					return Err("unterminated comment".into());
				}
			}
			'"' | '\'' => {
				let quote = c;
				let mut closed = false;
				while let Some(c) = chars.next() {
					match c {
						'\\' => {
							chars.next();
						}
						'\n' => break,
						c if c == quote => {
							closed = true;
							break;
						}
						_ => {}
					}
				}
				if !closed {
					return Err("unterminated string".into());
				}
			}
			'{' | '[' | '(' => stack.push(c),
			'}' | ']' | ')' => {
				let open = match c {
					'}' => '{',
					']' => '[',
					_ => '(',
				};
				if stack.pop() != Some(open) {
					return Err(format!("unbalanced '{}'", c));
				}
			}
			_ => {}
		}
	}

	match stack.last() {
		Some(open) => Err(format!("unclosed '{}'", open)),
		None => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_color() {
		assert_eq!(color(&json!("#ABC")).unwrap(), SettingValue::String("#abc".into()));
		assert_eq!(color(&json!(" #23282D ")).unwrap(), SettingValue::String("#23282d".into()));
		assert!(color(&json!("#abcd")).is_ok());
		assert!(color(&json!("#11223344")).is_ok());
		assert!(color(&json!("#12345")).is_err());
		assert!(color(&json!("red")).is_err());
		assert!(color(&json!("#ggg")).is_err());
		assert_eq!(color(&json!(5)).unwrap_err().0, ValidationReason::TypeMismatch);
	}

	#[test]
	fn test_number() {
		let t = OptionType::number(160.0, 400.0);
		assert_eq!(coerce(&t, &json!(240)).unwrap(), SettingValue::Number(240.0));
		assert_eq!(coerce(&t, &json!(" 200.5 ")).unwrap(), SettingValue::Number(200.5));
		assert_eq!(coerce(&t, &json!(100)).unwrap_err().0, ValidationReason::OutOfRange);
		assert_eq!(coerce(&t, &json!(401)).unwrap_err().0, ValidationReason::OutOfRange);
		assert_eq!(coerce(&t, &json!("wide")).unwrap_err().0, ValidationReason::TypeMismatch);
		assert_eq!(coerce(&t, &json!("NaN")).unwrap_err().0, ValidationReason::TypeMismatch);
		assert_eq!(coerce(&t, &json!(true)).unwrap_err().0, ValidationReason::TypeMismatch);
	}

	#[test]
	fn test_boolean_coercion() {
		for raw in [json!(true), json!(1), json!("1"), json!("true"), json!("On"), json!("yes")] {
			assert_eq!(boolean(&raw).unwrap(), SettingValue::Bool(true), "{}", raw);
		}
		for raw in [json!(false), json!(0), json!("0"), json!("off"), json!("no"), json!("")] {
			assert_eq!(boolean(&raw).unwrap(), SettingValue::Bool(false), "{}", raw);
		}
		assert!(boolean(&json!(2)).is_err());
		assert!(boolean(&json!("maybe")).is_err());
		assert!(boolean(&json!(null)).is_err());
	}

	#[test]
	fn test_text_and_choice() {
		let text = OptionType::Text { max_len: Some(5) };
		assert!(coerce(&text, &json!("hello")).is_ok());
		assert_eq!(coerce(&text, &json!("hello!")).unwrap_err().0, ValidationReason::OutOfRange);
		assert_eq!(coerce(&text, &json!(12)).unwrap_err().0, ValidationReason::TypeMismatch);

		let choice = OptionType::choice(&["light", "dark"]);
		assert!(coerce(&choice, &json!("dark")).is_ok());
		assert_eq!(coerce(&choice, &json!("blue")).unwrap_err().0, ValidationReason::OutOfRange);
	}

	#[test]
	fn test_css_syntax() {
		assert!(check_css_syntax("a { color: red; }").is_ok());
		assert!(check_css_syntax("a::after { content: \"}\"; } /* { */").is_ok());
		assert!(check_css_syntax("a[href='x'] { width: calc(100% - 2px); }").is_ok());
		assert!(check_css_syntax("a { color: red;").is_err());
		assert!(check_css_syntax("a { color: red; }}").is_err());
		assert!(check_css_syntax("a { width: calc(1px; }").is_err());
		assert!(check_css_syntax("/* open").is_err());
		assert!(check_css_syntax("a { content: 'x }").is_err());
		assert!(check_css_syntax("a {} </STYLE><b>").is_err());
	}

	#[test]
	fn test_freeform_css_rejection_reason() {
		let t = OptionType::freeform_css();
		assert_eq!(coerce(&t, &json!("a {")).unwrap_err().0, ValidationReason::TypeMismatch);
	}
}

// vim: ts=4
