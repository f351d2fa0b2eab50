use async_trait::async_trait;
use chrono::Utc;
use s3nb_types::{ContentKind, Contents, ContentsModel, FileFormat, Notebook};
use serde_json::Value;

use crate::error::ContentsResult;

/// Checkpoint implementation the host should pair with a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointsKind {
    /// The host's generic file checkpoints, built on `get` and `save`.
    GenericFile,
}

/// What `get` should load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetOptions {
    /// Load content, not only metadata.
    pub content: bool,
    /// Skip dispatch on the path's extension.
    pub kind: Option<ContentKind>,
    /// Requested file encoding. Ignored for other kinds.
    pub format: Option<FileFormat>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            content: true,
            kind: None,
            format: None,
        }
    }
}

impl GetOptions {
    pub fn metadata() -> Self {
        Self {
            content: false,
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// The contract between a notebook host and a contents store.
///
/// Paths are virtual: relative to the content root, with leading and
/// trailing delimiters ignored.
#[async_trait]
pub trait ContentsManager: Send + Sync {
    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Contents>;

    /// Persist `model` at `path` and return the stored item without content.
    async fn save(&self, model: ContentsModel, path: &str) -> ContentsResult<Contents>;

    async fn delete(&self, path: &str) -> ContentsResult<()>;

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()>;

    async fn file_exists(&self, path: &str) -> ContentsResult<bool>;

    async fn dir_exists(&self, path: &str) -> ContentsResult<bool>;

    fn is_hidden(&self, path: &str) -> bool;

    /// Create a uniquely named item in the directory at `path`.
    async fn new_untitled(
        &self,
        path: &str,
        kind: Option<ContentKind>,
        ext: &str,
    ) -> ContentsResult<Contents>;

    fn checkpoints(&self) -> CheckpointsKind;

    fn notebook_extension(&self) -> &str {
        ".ipynb"
    }

    /// Virtual path of `name` inside `dir`.
    fn join_path(&self, dir: &str, name: &str) -> String {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }

    async fn exists(&self, path: &str) -> ContentsResult<bool> {
        Ok(self.file_exists(path).await? || self.dir_exists(path).await?)
    }

    /// Save a new item, filling in an empty notebook or text file when the
    /// model carries no content.
    async fn new(&self, model: Option<ContentsModel>, path: &str) -> ContentsResult<Contents> {
        let mut model = model.unwrap_or_default();
        let kind = match model.kind.as_deref() {
            Some(kind) => kind.parse()?,
            None if path.ends_with(self.notebook_extension()) => ContentKind::Notebook,
            None => ContentKind::File,
        };
        model.kind = Some(kind.as_str().to_string());

        if model.content.is_none() {
            match kind {
                ContentKind::Notebook => {
                    model.content = Some(Notebook::new().to_value()?);
                    model.format = Some("json".into());
                }
                ContentKind::File => {
                    model.content = Some(Value::String(String::new()));
                    model.format = Some(FileFormat::Text.as_str().into());
                }
                ContentKind::Directory => {}
            }
        }
        let now = Utc::now();
        model.created.get_or_insert(now);
        model.last_modified.get_or_insert(now);
        self.save(model, path).await
    }

    /// First free name in `path` of the form `basename{insert}{n}.ext`,
    /// trying the bare name first.
    async fn increment_filename(
        &self,
        filename: &str,
        path: &str,
        insert: &str,
    ) -> ContentsResult<String> {
        let (basename, suffix) = split_suffix(filename, self.notebook_extension());
        let mut counter = 0u64;
        loop {
            let name = if counter == 0 {
                format!("{basename}{suffix}")
            } else {
                format!("{basename}{insert}{counter}{suffix}")
            };
            if !self.exists(&self.join_path(path, &name)).await? {
                return Ok(name);
            }
            counter += 1;
        }
    }
}

/// Split a file name before its extension. The notebook extension is split
/// at the last dot, anything else at the first so `a.tar.gz` numbers as
/// `a1.tar.gz`.
fn split_suffix<'a>(filename: &'a str, notebook_extension: &str) -> (&'a str, &'a str) {
    let split = if !notebook_extension.is_empty() && filename.ends_with(notebook_extension) {
        Some(filename.len() - notebook_extension.len())
    } else {
        filename.find('.')
    };
    match split {
        Some(index) => filename.split_at(index),
        None => (filename, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_splitting() {
        assert_eq!(split_suffix("Untitled.ipynb", ".ipynb"), ("Untitled", ".ipynb"));
        assert_eq!(split_suffix("a.b.ipynb", ".ipynb"), ("a.b", ".ipynb"));
        assert_eq!(split_suffix("a.tar.gz", ".ipynb"), ("a", ".tar.gz"));
        assert_eq!(split_suffix("Untitled Folder", ".ipynb"), ("Untitled Folder", ""));
    }

    #[test]
    fn get_options() {
        assert!(GetOptions::default().content);
        let options = GetOptions::metadata().kind(ContentKind::File).format(FileFormat::Base64);
        assert!(!options.content);
        assert_eq!(options.kind, Some(ContentKind::File));
        assert_eq!(options.format, Some(FileFormat::Base64));
    }
}
