use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The kind of an addressable item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A virtual directory, implied by keys sharing a prefix.
    Directory,
    /// A plain file stored as raw bytes.
    File,
    /// A structured notebook document.
    Notebook,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
            Self::Notebook => "notebook",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(Self::Directory),
            "file" => Ok(Self::File),
            "notebook" => Ok(Self::Notebook),
            other => Err(TypeError::UnhandledType(other.to_string())),
        }
    }
}

/// Encoding of a plain file's content on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// UTF-8 text.
    Text,
    /// Base64 of the raw bytes.
    Base64,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Base64 => "base64",
        }
    }

    /// Mimetype reported alongside loaded content of this format.
    pub fn mimetype(&self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Base64 => "application/octet-stream",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "base64" => Ok(Self::Base64),
            other => Err(TypeError::InvalidFormat(Some(other.to_string()))),
        }
    }
}

/// Format tag of any model's content, as reported to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Text,
    Base64,
    Json,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Base64 => "base64",
            Self::Json => "json",
        }
    }
}

impl From<FileFormat> for ContentFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Text => Self::Text,
            FileFormat::Base64 => Self::Base64,
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [ContentKind::Directory, ContentKind::File, ContentKind::Notebook] {
            assert_eq!(kind.as_str().parse::<ContentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_unhandled() {
        let err = "symlink".parse::<ContentKind>().unwrap_err();
        assert_eq!(err, TypeError::UnhandledType("symlink".into()));
        assert_eq!(err.to_string(), "Unhandled contents type: symlink");
    }

    #[test]
    fn kind_serde_is_lowercase() {
        let json = serde_json::to_string(&ContentKind::Notebook).unwrap();
        assert_eq!(json, "\"notebook\"");
    }

    #[test]
    fn file_format_mimetypes() {
        assert_eq!(FileFormat::Text.mimetype(), "text/plain");
        assert_eq!(FileFormat::Base64.mimetype(), "application/octet-stream");
    }

    #[test]
    fn json_is_not_a_file_format() {
        assert!("json".parse::<FileFormat>().is_err());
        assert_eq!(ContentFormat::from(FileFormat::Base64), ContentFormat::Base64);
    }
}
