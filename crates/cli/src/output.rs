//! Command result printing.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON
	#[default]
	Json,
	/// Single-line JSON
	Ndjson,
	/// Human-readable `key: value` lines
	Text,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}

/// Writes `value` to stdout in `format`.
pub fn print_result<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
	let rendered = render(format, value)?;
	let mut stdout = std::io::stdout().lock();
	writeln!(stdout, "{rendered}")?;
	Ok(())
}

pub fn render<T: Serialize>(format: OutputFormat, value: &T) -> Result<String> {
	Ok(match format {
		OutputFormat::Json => serde_json::to_string_pretty(value)?,
		OutputFormat::Ndjson => serde_json::to_string(value)?,
		OutputFormat::Text => render_text(&serde_json::to_value(value)?),
	})
}

/// Top-level object fields become `key: value` lines; nested values stay compact JSON.
fn render_text(value: &Value) -> String {
	match value {
		Value::Object(map) => map
			.iter()
			.map(|(key, value)| format!("{key}: {}", scalar(value)))
			.collect::<Vec<_>>()
			.join("\n"),
		other => scalar(other),
	}
}

fn scalar(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => "-".to_string(),
		other => other.to_string(),
	}
}
