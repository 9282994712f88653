//! Front matter splitting for content files.
//!
//! A front matter block is a leading metadata section fenced by a delimiter
//! line (`---` for YAML, `+++` for TOML). Everything after the closing
//! delimiter line is the body. Metadata is kept as a JSON mapping because it
//! crosses the compiler boundary as JSON text.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Delimiter types for front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// YAML front matter delimited by `---`.
    Yaml,
    /// TOML front matter delimited by `+++`.
    Toml,
}

impl FrontmatterFormat {
    /// Get the delimiter string for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }

    fn from_delimiter_line(line: &str) -> Option<Self> {
        match line.trim_end() {
            "---" => Some(Self::Yaml),
            "+++" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parsed front matter mapping. Keys are caller-defined and never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a top-level key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Serialize to compact JSON text, the form the compiler receives.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Serialize back to a YAML block (without delimiters).
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Reassemble a full document: delimiter, YAML metadata, delimiter, body.
    pub fn to_document(&self, body: &str) -> Result<String> {
        let delimiter = FrontmatterFormat::Yaml.delimiter();
        Ok(format!("{delimiter}\n{}{delimiter}\n{body}", self.to_yaml()?))
    }

    fn from_value(value: Value, path: &Path) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::frontmatter(
                path,
                format!("front matter must be a mapping, found {}", kind_of(&other)),
            )),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Split off the first line, without its terminator.
fn next_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(pos) => {
            let line = &text[..pos];
            (line.strip_suffix('\r').unwrap_or(line), &text[pos + 1..])
        }
        None => (text, ""),
    }
}

/// Split content into front matter and body.
///
/// Returns `None` unless the first line is a delimiter and a matching
/// closing delimiter line follows.
pub fn split_frontmatter(content: &str) -> Option<(FrontmatterFormat, &str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (first, rest) = next_line(content);
    let format = FrontmatterFormat::from_delimiter_line(first)?;
    let delimiter = format.delimiter();

    let mut cursor = rest;
    let mut consumed = 0;
    while !cursor.is_empty() {
        let (line, after) = next_line(cursor);
        if line.trim_end() == delimiter {
            let block = &rest[..consumed];
            let block = block
                .strip_suffix('\n')
                .map(|b| b.strip_suffix('\r').unwrap_or(b))
                .unwrap_or(block);
            return Some((format, block, after));
        }
        consumed += cursor.len() - after.len();
        cursor = after;
    }

    None
}

/// Parse front matter from a string.
///
/// Without a recognizable block the metadata is empty and the body is the
/// whole input, unchanged.
pub fn parse_frontmatter(content: &str, path: &Path) -> Result<(Metadata, String)> {
    let Some((format, block, body)) = split_frontmatter(content) else {
        return Ok((Metadata::default(), content.to_string()));
    };

    if block.trim().is_empty() {
        return Ok((Metadata::default(), body.to_string()));
    }

    let value: Value = match format {
        FrontmatterFormat::Yaml => {
            serde_yaml::from_str(block).map_err(|e| CoreError::frontmatter(path, e.to_string()))?
        }
        FrontmatterFormat::Toml => {
            let table: toml::Table =
                toml::from_str(block).map_err(|e| CoreError::frontmatter(path, e.to_string()))?;
            serde_json::to_value(table).map_err(|e| CoreError::frontmatter(path, e.to_string()))?
        }
    };

    Ok((Metadata::from_value(value, path)?, body.to_string()))
}
