//! nbformat v4 notebook documents.
//!
//! Cell sources are accepted as either a single string or a list of lines
//! and held as one string. [`Notebook::to_bytes`] writes them back as lines,
//! with sorted keys and a one-space indent, so stored notebooks diff cleanly.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};

/// Major format version this crate reads and writes.
pub const NBFORMAT: u64 = 4;

/// Minor format version given to freshly created notebooks.
pub const NBFORMAT_MINOR: u64 = 5;

/// A notebook: ordered cells plus document-level metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub nbformat: u64,
    pub nbformat_minor: u64,
}

/// One notebook cell, discriminated by `cell_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(TextCell),
    Raw(TextCell),
}

/// An executable cell and its recorded outputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(deserialize_with = "multiline")]
    pub source: String,
    #[serde(default)]
    pub execution_count: Option<u64>,
    #[serde(default)]
    pub outputs: Vec<Value>,
}

/// A markdown or raw cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(deserialize_with = "multiline")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

fn multiline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        One(String),
        Lines(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::One(text) => text,
        Multiline::Lines(lines) => lines.concat(),
    })
}

/// Split text into lines, keeping each line's terminator.
fn split_lines(text: &str) -> Vec<Value> {
    text.split_inclusive('\n')
        .map(|line| Value::String(line.to_string()))
        .collect()
}

fn valid_cell_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl Cell {
    /// A code cell with no outputs.
    pub fn code(source: impl Into<String>) -> Self {
        Self::Code(CodeCell {
            id: None,
            metadata: Map::new(),
            source: source.into(),
            execution_count: None,
            outputs: Vec::new(),
        })
    }

    /// A markdown cell.
    pub fn markdown(source: impl Into<String>) -> Self {
        Self::Markdown(TextCell {
            id: None,
            metadata: Map::new(),
            source: source.into(),
            attachments: None,
        })
    }

    /// Set the cell id, builder style.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = Some(id.into());
        match &mut self {
            Self::Code(cell) => cell.id = id,
            Self::Markdown(cell) | Self::Raw(cell) => cell.id = id,
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Code(cell) => cell.id.as_deref(),
            Self::Markdown(cell) | Self::Raw(cell) => cell.id.as_deref(),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Code(cell) => &cell.source,
            Self::Markdown(cell) | Self::Raw(cell) => &cell.source,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Self::Code(cell) => &cell.metadata,
            Self::Markdown(cell) | Self::Raw(cell) => &cell.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        match self {
            Self::Code(cell) => &mut cell.metadata,
            Self::Markdown(cell) | Self::Raw(cell) => &mut cell.metadata,
        }
    }

    pub fn cell_type(&self) -> &'static str {
        match self {
            Self::Code(_) => "code",
            Self::Markdown(_) => "markdown",
            Self::Raw(_) => "raw",
        }
    }
}

impl Notebook {
    /// An empty notebook at the current format version.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
        }
    }

    /// Parse a stored notebook.
    pub fn from_slice(bytes: &[u8]) -> TypeResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| TypeError::InvalidNotebook(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a notebook from its JSON representation, rejecting other
    /// major versions.
    pub fn from_value(value: Value) -> TypeResult<Self> {
        let version = value
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| TypeError::InvalidNotebook("missing nbformat version".into()))?;
        if version != NBFORMAT {
            return Err(TypeError::UnsupportedVersion(version));
        }
        serde_json::from_value(value).map_err(|e| TypeError::InvalidNotebook(e.to_string()))
    }

    /// JSON representation with sources as single strings.
    pub fn to_value(&self) -> TypeResult<Value> {
        serde_json::to_value(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Compact JSON with sorted keys. Equal notebooks give equal bytes.
    pub fn canonical_bytes(&self) -> TypeResult<Vec<u8>> {
        let value = self.to_value()?;
        serde_json::to_vec(&value).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Storage representation: sorted keys, one-space indent, sources as
    /// lists of lines, trailing newline.
    pub fn to_bytes(&self) -> TypeResult<Vec<u8>> {
        let mut value = self.to_value()?;
        if let Some(cells) = value.get_mut("cells").and_then(Value::as_array_mut) {
            for cell in cells {
                let lines = match cell.get("source") {
                    Some(Value::String(text)) => split_lines(text),
                    _ => continue,
                };
                cell["source"] = Value::Array(lines);
            }
        }

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        value
            .serialize(&mut serializer)
            .map_err(|e| TypeError::Serialization(e.to_string()))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Structural problems a host would flag. Empty when the notebook is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.nbformat != NBFORMAT {
            problems.push(format!("nbformat {} is not supported", self.nbformat));
        }

        let mut seen = HashSet::new();
        for (index, cell) in self.cells.iter().enumerate() {
            match cell.id() {
                Some(id) => {
                    if !valid_cell_id(id) {
                        problems.push(format!("cell {index}: invalid id {id:?}"));
                    }
                    if !seen.insert(id) {
                        problems.push(format!("cell {index}: duplicate id {id:?}"));
                    }
                }
                None if self.nbformat_minor >= 5 => {
                    problems.push(format!("cell {index}: missing id"));
                }
                None => {}
            }
        }
        problems
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Notebook {
        Notebook {
            cells: vec![
                Cell::markdown("# Title\nsome text").with_id("intro"),
                Cell::code("x = 1\nprint(x)\n").with_id("calc"),
            ],
            metadata: Map::new(),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }

    #[test]
    fn empty_notebook_is_valid() {
        let nb = Notebook::new();
        assert!(nb.validate().is_empty());
        assert_eq!(nb.nbformat, 4);
        assert_eq!(nb.nbformat_minor, 5);
    }

    #[test]
    fn source_lines_are_joined_on_read() {
        let value = json!({
            "cells": [{
                "cell_type": "code",
                "metadata": {},
                "source": ["a = 1\n", "b = 2"],
                "execution_count": 3,
                "outputs": []
            }],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 4
        });
        let nb = Notebook::from_value(value).unwrap();
        assert_eq!(nb.cells[0].source(), "a = 1\nb = 2");
        assert_eq!(nb.cells[0].cell_type(), "code");
    }

    #[test]
    fn stored_form_splits_source_lines() {
        let bytes = sample().to_bytes().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["cells"][0]["source"], json!(["# Title\n", "some text"]));
        assert_eq!(value["cells"][1]["source"], json!(["x = 1\n", "print(x)\n"]));
        assert_eq!(value["cells"][1]["execution_count"], Value::Null);
        assert!(bytes.ends_with(b"\n"));
        assert!(bytes.starts_with(b"{\n \"cells\""));
    }

    #[test]
    fn stored_form_reads_back_equal() {
        let nb = sample();
        let back = Notebook::from_slice(&nb.to_bytes().unwrap()).unwrap();
        assert_eq!(back, nb);
    }

    #[test]
    fn empty_source_survives_storage() {
        let nb = Notebook {
            cells: vec![Cell::code("").with_id("empty")],
            ..Notebook::new()
        };
        let back = Notebook::from_slice(&nb.to_bytes().unwrap()).unwrap();
        assert_eq!(back.cells[0].source(), "");
    }

    #[test]
    fn other_major_versions_are_rejected() {
        let value = json!({"cells": [], "metadata": {}, "nbformat": 3, "nbformat_minor": 0});
        assert_eq!(
            Notebook::from_value(value).unwrap_err(),
            TypeError::UnsupportedVersion(3)
        );
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            Notebook::from_slice(b"not json"),
            Err(TypeError::InvalidNotebook(_))
        ));
        assert!(matches!(
            Notebook::from_value(json!({"cells": []})),
            Err(TypeError::InvalidNotebook(_))
        ));
    }

    #[test]
    fn validation_reports_missing_and_duplicate_ids() {
        let nb = Notebook {
            cells: vec![
                Cell::code("1"),
                Cell::code("2").with_id("same"),
                Cell::markdown("3").with_id("same"),
                Cell::markdown("4").with_id("bad id!"),
            ],
            ..Notebook::new()
        };
        let problems = nb.validate();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("missing id"));
        assert!(problems[1].contains("duplicate"));
        assert!(problems[2].contains("invalid id"));
    }

    #[test]
    fn ids_are_optional_before_minor_five() {
        let nb = Notebook {
            cells: vec![Cell::code("1")],
            nbformat_minor: 4,
            ..Notebook::new()
        };
        assert!(nb.validate().is_empty());
    }

    #[test]
    fn canonical_bytes_are_stable() {
        assert_eq!(
            sample().canonical_bytes().unwrap(),
            sample().canonical_bytes().unwrap()
        );
    }

    proptest::proptest! {
        #[test]
        fn sources_survive_storage(source in "[a-z \n]{0,40}") {
            let nb = Notebook {
                cells: vec![Cell::code(source.clone()).with_id("c")],
                ..Notebook::new()
            };
            let stored = Notebook::from_slice(&nb.to_bytes().unwrap()).unwrap();
            proptest::prop_assert_eq!(stored.cells[0].source(), source.as_str());
        }
    }
}
