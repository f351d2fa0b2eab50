//! The document model.
//!
//! [`Contents`] is the typed form used inside the adapter: one variant per
//! [`ContentKind`], each with only the fields that kind can carry.
//! [`ContentsModel`] is the loosely-typed shape the host exchanges, with
//! every key present and `null` where a value is absent. Conversion happens
//! only at that boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TypeError, TypeResult};
use crate::kind::{ContentFormat, ContentKind, FileFormat};
use crate::notebook::Notebook;

/// Metadata common to every kind of item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Last path component.
    pub name: String,
    /// Virtual path relative to the content root, without surrounding
    /// delimiters.
    pub path: String,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub writable: bool,
}

impl Entry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            created: None,
            last_modified: None,
            writable: true,
        }
    }

    pub fn with_last_modified(mut self, last_modified: Option<DateTime<Utc>>) -> Self {
        self.last_modified = last_modified;
        self
    }
}

/// Loaded content of a plain file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Base64(String),
}

impl FileContent {
    pub fn format(&self) -> FileFormat {
        match self {
            Self::Text(_) => FileFormat::Text,
            Self::Base64(_) => FileFormat::Base64,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Base64(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) | Self::Base64(s) => s,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryModel {
    pub entry: Entry,
    /// Immediate children, when requested. Children never carry content.
    pub content: Option<Vec<Contents>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileModel {
    pub entry: Entry,
    pub content: Option<FileContent>,
    /// Format requested by the caller; superseded by the content's own
    /// format once content is loaded.
    pub format: Option<FileFormat>,
}

impl FileModel {
    pub fn format(&self) -> Option<FileFormat> {
        self.content.as_ref().map(FileContent::format).or(self.format)
    }

    pub fn mimetype(&self) -> Option<&'static str> {
        self.content.as_ref().map(|c| c.format().mimetype())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotebookModel {
    pub entry: Entry,
    pub content: Option<Notebook>,
    /// Validation problems found when the notebook was loaded or saved.
    pub message: Option<String>,
}

/// A typed document model.
#[derive(Clone, Debug, PartialEq)]
pub enum Contents {
    Directory(DirectoryModel),
    File(FileModel),
    Notebook(NotebookModel),
}

impl Contents {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Directory(_) => ContentKind::Directory,
            Self::File(_) => ContentKind::File,
            Self::Notebook(_) => ContentKind::Notebook,
        }
    }

    pub fn entry(&self) -> &Entry {
        match self {
            Self::Directory(m) => &m.entry,
            Self::File(m) => &m.entry,
            Self::Notebook(m) => &m.entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.entry().name
    }

    pub fn path(&self) -> &str {
        &self.entry().path
    }

    /// Validation message, if this is a notebook that carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Notebook(m) => m.message.as_deref(),
            _ => None,
        }
    }

    /// Convert to the host's wire shape.
    pub fn into_wire(self) -> TypeResult<ContentsModel> {
        let kind = self.kind();
        let (entry, content, format, mimetype, message) = match self {
            Self::Directory(dir) => {
                let content = match dir.content {
                    Some(children) => {
                        let children = children
                            .into_iter()
                            .map(|child| {
                                let wire = child.into_wire()?;
                                serde_json::to_value(wire)
                                    .map_err(|e| TypeError::Serialization(e.to_string()))
                            })
                            .collect::<TypeResult<Vec<_>>>()?;
                        Some(Value::Array(children))
                    }
                    None => None,
                };
                let format = content.as_ref().map(|_| ContentFormat::Json);
                (dir.entry, content, format, None, None)
            }
            Self::File(file) => {
                let format = file.format().map(ContentFormat::from);
                let mimetype = file.mimetype().map(str::to_string);
                let content = file.content.map(|c| Value::String(c.into_string()));
                (file.entry, content, format, mimetype, None)
            }
            Self::Notebook(nb) => {
                let content = nb.content.as_ref().map(Notebook::to_value).transpose()?;
                let format = content.as_ref().map(|_| ContentFormat::Json);
                (nb.entry, content, format, None, nb.message)
            }
        };

        Ok(ContentsModel {
            name: Some(entry.name),
            path: Some(entry.path),
            kind: Some(kind.as_str().to_string()),
            created: entry.created,
            last_modified: entry.last_modified,
            content,
            mimetype,
            format: format.map(|f| f.as_str().to_string()),
            writable: entry.writable,
            message,
        })
    }
}

/// The loosely-typed model exchanged with the host.
///
/// Incoming models may omit any key; `type` and `format` stay strings here
/// so an unknown value can be reported rather than rejected by the parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentsModel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "writable_default")]
    pub writable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn writable_default() -> bool {
    true
}

impl Default for ContentsModel {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            kind: None,
            created: None,
            last_modified: None,
            content: None,
            mimetype: None,
            format: None,
            writable: true,
            message: None,
        }
    }
}

impl ContentsModel {
    /// A bare model of the given kind, with no content.
    pub fn of_kind(kind: ContentKind) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            ..Self::default()
        }
    }

    /// A save request for a notebook.
    pub fn notebook(notebook: &Notebook) -> TypeResult<Self> {
        Ok(Self {
            content: Some(notebook.to_value()?),
            format: Some(ContentFormat::Json.as_str().to_string()),
            ..Self::of_kind(ContentKind::Notebook)
        })
    }

    /// A save request for a plain file.
    pub fn file(content: FileContent) -> Self {
        Self {
            format: Some(content.format().as_str().to_string()),
            content: Some(Value::String(content.into_string())),
            ..Self::of_kind(ContentKind::File)
        }
    }

    /// A save request for a directory.
    pub fn directory() -> Self {
        Self::of_kind(ContentKind::Directory)
    }

    /// Check the keys every save request must carry.
    pub fn check_required(&self) -> TypeResult<()> {
        let kind = self.kind.as_deref().ok_or(TypeError::MissingType)?;
        if self.content.is_none() && kind != ContentKind::Directory.as_str() {
            return Err(TypeError::MissingContent);
        }
        Ok(())
    }

    /// Decode into a validated save payload.
    pub fn into_payload(self) -> TypeResult<SavePayload> {
        self.check_required()?;
        let kind: ContentKind = self.kind.as_deref().unwrap_or_default().parse()?;
        match kind {
            ContentKind::Directory => Ok(SavePayload::Directory),
            ContentKind::Notebook => {
                let value = self.content.ok_or(TypeError::MissingContent)?;
                Ok(SavePayload::Notebook(Notebook::from_value(value)?))
            }
            ContentKind::File => {
                let format: FileFormat = self
                    .format
                    .as_deref()
                    .ok_or(TypeError::InvalidFormat(None))?
                    .parse()?;
                let text = match self.content {
                    Some(Value::String(text)) => text,
                    Some(_) => return Err(TypeError::ContentNotString),
                    None => return Err(TypeError::MissingContent),
                };
                Ok(SavePayload::File(match format {
                    FileFormat::Text => FileContent::Text(text),
                    FileFormat::Base64 => FileContent::Base64(text),
                }))
            }
        }
    }
}

/// A save request after validation.
#[derive(Clone, Debug, PartialEq)]
pub enum SavePayload {
    Directory,
    File(FileContent),
    Notebook(Notebook),
}

impl SavePayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Directory => ContentKind::Directory,
            Self::File(_) => ContentKind::File,
            Self::Notebook(_) => ContentKind::Notebook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;
    use serde_json::json;

    #[test]
    fn wire_shape_has_every_key() {
        let model = Contents::File(FileModel {
            entry: Entry::new("a.txt", "dir/a.txt"),
            content: None,
            format: None,
        });
        let value = serde_json::to_value(model.into_wire().unwrap()).unwrap();
        for key in [
            "name",
            "path",
            "type",
            "created",
            "last_modified",
            "content",
            "mimetype",
            "format",
            "writable",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value.get("message").is_none());
        assert_eq!(value["type"], "file");
        assert_eq!(value["content"], Value::Null);
        assert_eq!(value["writable"], true);
    }

    #[test]
    fn loaded_file_reports_format_and_mimetype() {
        let model = Contents::File(FileModel {
            entry: Entry::new("a.bin", "a.bin"),
            content: Some(FileContent::Base64("AAE=".into())),
            format: None,
        });
        let wire = model.into_wire().unwrap();
        assert_eq!(wire.format.as_deref(), Some("base64"));
        assert_eq!(wire.mimetype.as_deref(), Some("application/octet-stream"));
        assert_eq!(wire.content, Some(json!("AAE=")));
    }

    #[test]
    fn directory_children_nest_as_models() {
        let child = Contents::Notebook(NotebookModel {
            entry: Entry::new("n.ipynb", "d/n.ipynb"),
            content: None,
            message: None,
        });
        let dir = Contents::Directory(DirectoryModel {
            entry: Entry::new("d", "d"),
            content: Some(vec![child]),
        });
        let wire = dir.into_wire().unwrap();
        assert_eq!(wire.format.as_deref(), Some("json"));
        let children = wire.content.unwrap();
        assert_eq!(children[0]["type"], "notebook");
        assert_eq!(children[0]["content"], Value::Null);
        assert_eq!(children[0]["format"], Value::Null);
    }

    #[test]
    fn notebook_wire_content_round_trips() {
        let nb = Notebook {
            cells: vec![Cell::markdown("hi").with_id("m1")],
            ..Notebook::new()
        };
        let request = ContentsModel::notebook(&nb).unwrap();
        match request.into_payload().unwrap() {
            SavePayload::Notebook(back) => assert_eq!(back, nb),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn missing_type_is_rejected_first() {
        let model = ContentsModel::default();
        assert_eq!(model.into_payload().unwrap_err(), TypeError::MissingType);
    }

    #[test]
    fn missing_content_is_rejected_except_for_directories() {
        let model = ContentsModel::of_kind(ContentKind::File);
        assert_eq!(model.into_payload().unwrap_err(), TypeError::MissingContent);
        assert_eq!(
            ContentsModel::directory().into_payload().unwrap(),
            SavePayload::Directory
        );
    }

    #[test]
    fn unknown_type_is_unhandled() {
        let model = ContentsModel {
            kind: Some("symlink".into()),
            content: Some(json!("x")),
            ..ContentsModel::default()
        };
        assert_eq!(
            model.into_payload().unwrap_err().to_string(),
            "Unhandled contents type: symlink"
        );
    }

    #[test]
    fn file_save_requires_a_format() {
        let model = ContentsModel {
            format: None,
            ..ContentsModel::file(FileContent::Text("x".into()))
        };
        assert_eq!(model.into_payload().unwrap_err(), TypeError::InvalidFormat(None));

        let model = ContentsModel {
            format: Some("json".into()),
            ..ContentsModel::file(FileContent::Text("x".into()))
        };
        assert!(matches!(
            model.into_payload(),
            Err(TypeError::InvalidFormat(Some(_)))
        ));
    }

    #[test]
    fn file_content_must_be_a_string() {
        let model = ContentsModel {
            content: Some(json!({"a": 1})),
            ..ContentsModel::file(FileContent::Text(String::new()))
        };
        assert_eq!(model.into_payload().unwrap_err(), TypeError::ContentNotString);
    }

    #[test]
    fn incoming_model_defaults() {
        let model: ContentsModel = serde_json::from_value(json!({"type": "directory"})).unwrap();
        assert!(model.writable);
        assert_eq!(model.kind.as_deref(), Some("directory"));
        assert!(model.content.is_none());
    }
}
