use std::path::Path;

use s3nb_store::S3Options;
use s3nb_trust::NotebookNotary;
use serde::{Deserialize, Serialize};

use crate::error::{ContentsError, ContentsResult};

/// URI scheme accepted for the content root.
pub const S3_SCHEME: &str = "s3://";

/// Where the content root lives: a bucket, a key prefix and the delimiter
/// that emulates hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketConfig {
    pub bucket: String,
    /// Empty, or ends with `delimiter`.
    pub prefix: String,
    pub delimiter: String,
}

impl BucketConfig {
    /// Parse `s3://bucket[/prefix]`.
    pub fn from_base_uri(base_uri: &str, delimiter: &str) -> ContentsResult<Self> {
        if delimiter.is_empty() {
            return Err(ContentsError::Config("key delimiter must not be empty".into()));
        }
        let rest = base_uri.strip_prefix(S3_SCHEME).ok_or_else(|| {
            ContentsError::Config(format!("unexpected scheme in base URI '{base_uri}', expected {S3_SCHEME}"))
        })?;
        let (bucket, prefix) = rest.split_once(delimiter).unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ContentsError::Config(format!("no bucket in base URI '{base_uri}'")));
        }

        let mut prefix = prefix.to_string();
        if !prefix.is_empty() && !prefix.ends_with(delimiter) {
            prefix.push_str(delimiter);
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
            delimiter: delimiter.to_string(),
        })
    }
}

/// Names used by `new_untitled`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UntitledNames {
    pub notebook: String,
    pub file: String,
    pub directory: String,
}

impl Default for UntitledNames {
    fn default() -> Self {
        Self {
            notebook: "Untitled".into(),
            file: "untitled".into(),
            directory: "Untitled Folder".into(),
        }
    }
}

/// Adapter configuration, usually read from a TOML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentsConfig {
    /// `s3://bucket[/prefix]`.
    pub base_uri: String,
    pub key_delimiter: String,
    pub notebook_extension: String,
    pub untitled_notebook: String,
    pub untitled_file: String,
    pub untitled_directory: String,
    /// Write a zero-byte object at the directory key when a directory is
    /// saved, so empty directories persist.
    pub directory_markers: bool,
    /// 64 hex characters. A random key is generated when absent.
    pub signing_key: Option<String>,
    pub s3: S3Options,
}

impl Default for ContentsConfig {
    fn default() -> Self {
        let names = UntitledNames::default();
        Self {
            base_uri: String::new(),
            key_delimiter: "/".into(),
            notebook_extension: ".ipynb".into(),
            untitled_notebook: names.notebook,
            untitled_file: names.file,
            untitled_directory: names.directory,
            directory_markers: false,
            signing_key: None,
            s3: S3Options::default(),
        }
    }
}

impl ContentsConfig {
    pub fn from_toml_str(text: &str) -> ContentsResult<Self> {
        toml::from_str(text).map_err(|e| ContentsError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ContentsResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContentsError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn bucket(&self) -> ContentsResult<BucketConfig> {
        BucketConfig::from_base_uri(&self.base_uri, &self.key_delimiter)
    }

    pub fn untitled_names(&self) -> UntitledNames {
        UntitledNames {
            notebook: self.untitled_notebook.clone(),
            file: self.untitled_file.clone(),
            directory: self.untitled_directory.clone(),
        }
    }

    pub fn notary(&self) -> ContentsResult<NotebookNotary> {
        match &self.signing_key {
            Some(key) => Ok(NotebookNotary::from_hex_key(key)?),
            None => Ok(NotebookNotary::with_random_key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn base_uri_with_prefix() {
        let config = BucketConfig::from_base_uri("s3://mybucket/nb", "/").unwrap();
        assert_eq!(config.bucket, "mybucket");
        assert_eq!(config.prefix, "nb/");
        assert_eq!(config.delimiter, "/");
    }

    #[test]
    fn base_uri_keeps_trailing_delimiter() {
        let config = BucketConfig::from_base_uri("s3://b/a/b/", "/").unwrap();
        assert_eq!(config.prefix, "a/b/");
    }

    #[test]
    fn base_uri_without_prefix() {
        for uri in ["s3://b", "s3://b/"] {
            let config = BucketConfig::from_base_uri(uri, "/").unwrap();
            assert_eq!(config.bucket, "b");
            assert_eq!(config.prefix, "");
        }
    }

    #[test]
    fn custom_delimiter() {
        let config = BucketConfig::from_base_uri("s3://b|root", "|").unwrap();
        assert_eq!(config.bucket, "b");
        assert_eq!(config.prefix, "root|");
    }

    #[test]
    fn bad_base_uris() {
        for uri in ["http://b/nb", "b/nb", "s3://", "s3:///nb", ""] {
            let err = BucketConfig::from_base_uri(uri, "/").unwrap_err();
            assert!(matches!(err, ContentsError::Config(_)), "{uri}");
        }
        assert!(BucketConfig::from_base_uri("s3://b", "").is_err());
    }

    #[test]
    fn defaults() {
        let config = ContentsConfig::default();
        assert_eq!(config.key_delimiter, "/");
        assert_eq!(config.notebook_extension, ".ipynb");
        assert_eq!(config.untitled_directory, "Untitled Folder");
        assert!(!config.directory_markers);
        assert!(config.bucket().is_err());
    }

    #[test]
    fn toml_overrides() {
        let config = ContentsConfig::from_toml_str(
            r#"
            base_uri = "s3://data/notebooks"
            directory_markers = true

            [s3]
            region = "eu-west-1"
            force_path_style = true
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket().unwrap().prefix, "notebooks/");
        assert!(config.directory_markers);
        assert_eq!(config.s3.region.as_deref(), Some("eu-west-1"));
        assert!(config.s3.force_path_style);
        assert_eq!(config.s3.staging_threshold, S3Options::default().staging_threshold);
        assert_eq!(config.untitled_notebook, "Untitled");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_uri = \"s3://b\"\nuntitled_file = \"scratch\"").unwrap();
        let config = ContentsConfig::load(file.path()).unwrap();
        assert_eq!(config.base_uri, "s3://b");
        assert_eq!(config.untitled_names().file, "scratch");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            ContentsConfig::from_toml_str("base_uri = ["),
            Err(ContentsError::Config(_))
        ));
    }

    #[test]
    fn signing_key() {
        let mut config = ContentsConfig::default();
        assert!(config.notary().is_ok());
        config.signing_key = Some("00".repeat(32));
        assert!(config.notary().is_ok());
        config.signing_key = Some("nope".into());
        assert!(matches!(config.notary(), Err(ContentsError::Trust(_))));
    }
}
