//! Rendering of fetched payloads into textual output formats
//!
//! Three formats are supported:
//! - `json` - pretty-printed with two-space indentation, lossless
//! - `csv` - tabular rendering driven by [`TableShape`] classification
//! - `txt` - one line per mapping entry (`key: value`) or sequence element
//!
//! Only JSON objects and arrays can be formatted; scalars are rejected before
//! any format-specific work happens.

use crate::error::FormatError;
use crate::types::FormattedArtifact;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

mod csv;
mod table;

pub use csv::write_csv;
pub use table::{Table, TableShape, classify};

/// Output format identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values
    Csv,
    /// Plain text, one entry per line
    Txt,
}

impl OutputFormat {
    /// All supported formats
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Csv, OutputFormat::Txt];

    /// File extension (and config name) of this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "txt" => Ok(OutputFormat::Txt),
            _ => Err(FormatError::Unsupported(s.to_string())),
        }
    }
}

/// Format `value` using the format called `name`
///
/// The payload shape is checked before the format name, so a scalar payload
/// is reported as [`FormatError::NotStructured`] even for unknown formats.
pub fn format_named(value: &Value, name: &str) -> Result<FormattedArtifact, FormatError> {
    ensure_structured(value)?;
    let format: OutputFormat = name.parse()?;
    let content = format_value(value, format)?;
    Ok(FormattedArtifact { format, content })
}

/// Format `value` as `format`
pub fn format_value(value: &Value, format: OutputFormat) -> Result<String, FormatError> {
    ensure_structured(value)?;

    match format {
        // Alternate Display is the two-space pretty printer and cannot fail
        OutputFormat::Json => Ok(format!("{value:#}")),
        OutputFormat::Txt => Ok(to_text(value)),
        OutputFormat::Csv => {
            let table = classify(value)?.into_table();
            Ok(write_csv(&table))
        }
    }
}

pub(crate) fn ensure_structured(value: &Value) -> Result<(), FormatError> {
    match value {
        Value::Object(_) | Value::Array(_) => Ok(()),
        Value::Null => Err(FormatError::NotStructured { found: "null" }),
        Value::Bool(_) => Err(FormatError::NotStructured { found: "boolean" }),
        Value::Number(_) => Err(FormatError::NotStructured { found: "number" }),
        Value::String(_) => Err(FormatError::NotStructured { found: "string" }),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, display_value(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join("\n"),
        other => display_value(other),
    }
}

/// Human-facing rendering of a single value: strings unquoted, everything
/// else as compact JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
