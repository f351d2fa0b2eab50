//! Contents manager over an [`ObjectStore`].

use std::fmt::Display;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use s3nb_store::{ListRequest, ObjectStore, S3ObjectStore, StoreError};
use s3nb_trust::NotebookNotary;
use s3nb_types::{
    ContentKind, Contents, ContentsModel, DirectoryModel, Entry, FileContent, FileFormat,
    FileModel, Notebook, NotebookModel, SavePayload,
};
use tracing::{debug, info};

use crate::config::{BucketConfig, ContentsConfig, UntitledNames};
use crate::error::{ContentsError, ContentsResult};
use crate::hooks::{NoOpHook, PreSaveHook};
use crate::keys::KeyMapper;
use crate::manager::{CheckpointsKind, ContentsManager, GetOptions};

/// Serves notebooks, files and directories from a bucket.
///
/// Directories are implied by keys sharing a prefix. Every operation maps to
/// a handful of store calls; nothing is cached.
pub struct S3ContentsManager<S> {
    store: S,
    bucket: BucketConfig,
    keys: KeyMapper,
    notary: NotebookNotary,
    hook: Box<dyn PreSaveHook>,
    names: UntitledNames,
    notebook_extension: String,
    directory_markers: bool,
}

impl S3ContentsManager<S3ObjectStore> {
    /// Connect to S3 as described by `config`.
    pub async fn connect(config: &ContentsConfig) -> ContentsResult<Self> {
        let bucket = config.bucket()?;
        let store = S3ObjectStore::connect(bucket.bucket.clone(), &config.s3).await;
        Self::from_config(store, config)
    }
}

impl<S: ObjectStore> S3ContentsManager<S> {
    /// A manager with default naming and a random signing key.
    pub fn new(store: S, bucket: BucketConfig) -> Self {
        info!(bucket = %bucket.bucket, prefix = %bucket.prefix, "contents manager ready");
        Self {
            store,
            keys: KeyMapper::new(&bucket),
            bucket,
            notary: NotebookNotary::with_random_key(),
            hook: Box::new(NoOpHook),
            names: UntitledNames::default(),
            notebook_extension: ".ipynb".into(),
            directory_markers: false,
        }
    }

    pub fn from_config(store: S, config: &ContentsConfig) -> ContentsResult<Self> {
        let mut manager = Self::new(store, config.bucket()?).with_notary(config.notary()?);
        manager.names = config.untitled_names();
        manager.notebook_extension = config.notebook_extension.clone();
        manager.directory_markers = config.directory_markers;
        Ok(manager)
    }

    pub fn with_notary(mut self, notary: NotebookNotary) -> Self {
        self.notary = notary;
        self
    }

    pub fn with_hook(mut self, hook: impl PreSaveHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn with_directory_markers(mut self, enabled: bool) -> Self {
        self.directory_markers = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bucket(&self) -> &BucketConfig {
        &self.bucket
    }

    pub fn keys(&self) -> &KeyMapper {
        &self.keys
    }

    pub fn notary(&self) -> &NotebookNotary {
        &self.notary
    }

    fn is_notebook(&self, key: &str) -> bool {
        key.ends_with(self.notebook_extension.as_str())
    }

    fn entry(&self, key: &str, last_modified: Option<DateTime<Utc>>) -> Entry {
        Entry::new(self.keys.name_of(key), self.keys.key_to_path(key)).with_last_modified(last_modified)
    }

    async fn directory_model(&self, path: &str, content: bool) -> ContentsResult<Contents> {
        let dir_key = self.keys.path_to_dir_key(path);
        debug!(path, key = %dir_key, content, "building directory model");
        let last_modified = if path.is_empty() {
            None
        } else {
            self.store
                .head_object(&dir_key)
                .await
                .map_err(|e| unreadable("directory", path, e))?
                .and_then(|meta| meta.last_modified)
        };

        let content = if content {
            Some(self.list_children(path, &dir_key).await?)
        } else {
            None
        };
        Ok(Contents::Directory(DirectoryModel {
            entry: Entry::new(self.keys.name_of(path), path).with_last_modified(last_modified),
            content,
        }))
    }

    /// Immediate children of a directory key, in store order.
    async fn list_children(&self, path: &str, dir_key: &str) -> ContentsResult<Vec<Contents>> {
        let listing = self
            .store
            .list_objects(&ListRequest::new(dir_key).delimiter(self.keys.delimiter()))
            .await
            .map_err(|e| unreadable("directory", path, e))?;

        let mut children = Vec::with_capacity(listing.len());
        for summary in listing {
            if summary.key == dir_key {
                continue;
            }
            let entry = self.entry(&summary.key, summary.last_modified);
            let child = if self.keys.is_dir_key(&summary.key) {
                Contents::Directory(DirectoryModel {
                    entry,
                    content: None,
                })
            } else if self.is_notebook(&summary.key) {
                Contents::Notebook(NotebookModel {
                    entry,
                    content: None,
                    message: None,
                })
            } else {
                Contents::File(FileModel {
                    entry,
                    content: None,
                    format: None,
                })
            };
            debug!(key = %summary.key, kind = %child.kind(), "listed");
            children.push(child);
        }
        Ok(children)
    }

    async fn file_model(
        &self,
        path: &str,
        content: bool,
        format: Option<FileFormat>,
    ) -> ContentsResult<Contents> {
        let key = self.keys.path_to_key(path);
        debug!(path, key = %key, content, "building file model");
        if !content {
            let meta = self
                .store
                .head_object(&key)
                .await
                .map_err(|e| unreadable("file", path, e))?
                .ok_or_else(|| unreadable("file", path, "object not found"))?;
            return Ok(Contents::File(FileModel {
                entry: self.entry(&key, meta.last_modified),
                content: None,
                format,
            }));
        }

        let object = self
            .store
            .get_object(&key)
            .await
            .map_err(|e| unreadable("file", path, e))?
            .ok_or_else(|| unreadable("file", path, "object not found"))?;
        let content = decode_file(path, object.body, format)?;
        Ok(Contents::File(FileModel {
            entry: self.entry(&key, object.meta.last_modified),
            format: Some(content.format()),
            content: Some(content),
        }))
    }

    async fn notebook_model(&self, path: &str, content: bool) -> ContentsResult<Contents> {
        let key = self.keys.path_to_key(path);
        debug!(path, key = %key, content, "building notebook model");
        if !content {
            let meta = self
                .store
                .head_object(&key)
                .await
                .map_err(|e| unreadable("Notebook", path, e))?
                .ok_or_else(|| unreadable("Notebook", path, "object not found"))?;
            return Ok(Contents::Notebook(NotebookModel {
                entry: self.entry(&key, meta.last_modified),
                content: None,
                message: None,
            }));
        }

        let object = self
            .store
            .get_object(&key)
            .await
            .map_err(|e| unreadable("Notebook", path, e))?
            .ok_or_else(|| unreadable("Notebook", path, "object not found"))?;
        let mut notebook =
            Notebook::from_slice(&object.body).map_err(|e| unreadable("Notebook", path, e))?;
        self.notary.mark_trusted_cells(&mut notebook, path)?;
        let message = validation_message(&notebook);
        Ok(Contents::Notebook(NotebookModel {
            entry: self.entry(&key, object.meta.last_modified),
            content: Some(notebook),
            message,
        }))
    }

    async fn save_file(&self, path: &str, content: FileContent) -> ContentsResult<()> {
        let body = match content {
            FileContent::Text(text) => text.into_bytes(),
            FileContent::Base64(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| ContentsError::bad_request(format!("Encoding error saving {path}: {e}")))?,
        };
        let key = self.keys.path_to_key(path);
        debug!(path, key = %key, size = body.len(), "saving file");
        self.store
            .put_object(&key, body)
            .await
            .map_err(|e| write_error("File", path, e))
    }

    async fn save_notebook(&self, path: &str, notebook: &Notebook) -> ContentsResult<()> {
        let body = notebook.to_bytes().map_err(|e| write_error("Notebook", path, e))?;
        let key = self.keys.path_to_key(path);
        debug!(path, key = %key, size = body.len(), "saving notebook");
        self.store
            .put_object(&key, body)
            .await
            .map_err(|e| write_error("Notebook", path, e))
    }

    async fn save_directory(&self, path: &str) -> ContentsResult<()> {
        if !self.directory_markers || path.is_empty() {
            debug!(path, "directories are implicit, nothing to write");
            return Ok(());
        }
        self.write_marker(path).await
    }

    /// Zero-byte object at the directory key.
    async fn write_marker(&self, path: &str) -> ContentsResult<()> {
        let key = self.keys.path_to_dir_key(path);
        debug!(path, key = %key, "writing directory marker");
        self.store
            .put_object(&key, Vec::new())
            .await
            .map_err(|e| write_error("Directory", path, e))
    }

    /// Kind of an untyped, non-notebook path: a file if the object exists,
    /// a directory if anything is stored below it, a file otherwise.
    async fn infer_kind(&self, path: &str) -> ContentsResult<ContentKind> {
        let unreadable_file = |e: ContentsError| unreadable("file", path, e);
        if self.file_exists(path).await.map_err(unreadable_file)? {
            return Ok(ContentKind::File);
        }
        if self.dir_exists(path).await.map_err(unreadable_file)? {
            return Ok(ContentKind::Directory);
        }
        Ok(ContentKind::File)
    }

    /// Every key below a directory, marker included.
    async fn descendants(&self, path: &str) -> ContentsResult<Vec<String>> {
        let dir_key = self.keys.path_to_dir_key(path);
        let listing = self.store.list_objects(&ListRequest::new(dir_key)).await?;
        Ok(listing.into_iter().map(|summary| summary.key).collect())
    }
}

fn unreadable(what: &str, path: &str, cause: impl Display) -> ContentsError {
    ContentsError::bad_request(format!("Unreadable {what}: {path} {cause}"))
}

fn write_error(what: &str, path: &str, cause: impl Display) -> ContentsError {
    ContentsError::bad_request(format!("Unexpected Error Writing {what}: {path} {cause}"))
}

fn decode_file(path: &str, body: Vec<u8>, format: Option<FileFormat>) -> ContentsResult<FileContent> {
    match format {
        Some(FileFormat::Text) => String::from_utf8(body)
            .map(FileContent::Text)
            .map_err(|_| ContentsError::bad_request(format!("{path} is not UTF-8 encoded"))),
        Some(FileFormat::Base64) => Ok(FileContent::Base64(STANDARD.encode(body))),
        None => Ok(match String::from_utf8(body) {
            Ok(text) => FileContent::Text(text),
            Err(err) => FileContent::Base64(STANDARD.encode(err.into_bytes())),
        }),
    }
}

fn validation_message(notebook: &Notebook) -> Option<String> {
    let problems = notebook.validate();
    if problems.is_empty() {
        None
    } else {
        Some(format!("Notebook validation failed: {}", problems.join("; ")))
    }
}

#[async_trait]
impl<S: ObjectStore> ContentsManager for S3ContentsManager<S> {
    async fn get(&self, path: &str, options: GetOptions) -> ContentsResult<Contents> {
        let path = self.keys.normalize(path);
        let kind = match options.kind {
            Some(kind) => kind,
            None if path.is_empty() => ContentKind::Directory,
            None if self.is_notebook(path) => ContentKind::Notebook,
            None => self.infer_kind(path).await?,
        };
        match kind {
            ContentKind::Directory => self.directory_model(path, options.content).await,
            ContentKind::Notebook => self.notebook_model(path, options.content).await,
            ContentKind::File => self.file_model(path, options.content, options.format).await,
        }
    }

    async fn save(&self, mut model: ContentsModel, path: &str) -> ContentsResult<Contents> {
        let path = self.keys.normalize(path);
        model.check_required()?;
        self.hook.pre_save(&mut model, path).await?;

        let payload = model.into_payload()?;
        let kind = payload.kind();
        debug!(path, kind = %kind, "saving");
        let mut message = None;
        match payload {
            SavePayload::Notebook(mut notebook) => {
                self.notary.check_and_sign(&mut notebook, path)?;
                self.save_notebook(path, &notebook).await?;
                message = validation_message(&notebook);
            }
            SavePayload::File(content) => self.save_file(path, content).await?,
            SavePayload::Directory => self.save_directory(path).await?,
        }

        let mut saved = self.get(path, GetOptions::metadata().kind(kind)).await?;
        if let Contents::Notebook(notebook) = &mut saved {
            notebook.message = message;
        }
        Ok(saved)
    }

    async fn delete(&self, path: &str) -> ContentsResult<()> {
        let path = self.keys.normalize(path);
        if path.is_empty() {
            return Err(ContentsError::bad_request("Cannot delete the root directory"));
        }
        let key = self.keys.path_to_key(path);
        if self.store.exists(&key).await? {
            debug!(path, key = %key, "deleting object");
            self.store.delete_object(&key).await?;
            return Ok(());
        }

        let descendants = self.descendants(path).await?;
        if descendants.is_empty() {
            debug!(path, key = %key, "nothing stored, deleting key anyway");
            self.store.delete_object(&key).await?;
            return Ok(());
        }
        debug!(path, count = descendants.len(), "deleting directory");
        for descendant in &descendants {
            self.store.delete_object(descendant).await?;
        }
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> ContentsResult<()> {
        let old_path = self.keys.normalize(old_path);
        let new_path = self.keys.normalize(new_path);
        if old_path == new_path {
            return Ok(());
        }
        if old_path.is_empty() || new_path.is_empty() {
            return Err(ContentsError::bad_request("Cannot rename the root directory"));
        }

        let old_key = self.keys.path_to_key(old_path);
        if self.store.exists(&old_key).await? {
            let new_key = self.keys.path_to_key(new_path);
            debug!(from = %old_key, to = %new_key, "renaming object");
            self.store
                .copy_object(&old_key, &new_key)
                .await
                .map_err(|e| not_found_or(e, old_path))?;
            self.store.delete_object(&old_key).await?;
            return Ok(());
        }

        let descendants = self.descendants(old_path).await?;
        if descendants.is_empty() {
            return Err(ContentsError::NotFound(format!(
                "File or directory does not exist: {old_path}"
            )));
        }
        let old_dir = self.keys.path_to_dir_key(old_path);
        let new_dir = self.keys.path_to_dir_key(new_path);
        debug!(from = %old_dir, to = %new_dir, count = descendants.len(), "renaming directory");
        for source in &descendants {
            let relative = source.strip_prefix(old_dir.as_str()).unwrap_or(source);
            let destination = format!("{new_dir}{relative}");
            self.store
                .copy_object(source, &destination)
                .await
                .map_err(|e| not_found_or(e, old_path))?;
        }
        for source in &descendants {
            self.store.delete_object(source).await?;
        }
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> ContentsResult<bool> {
        let path = self.keys.normalize(path);
        if path.is_empty() {
            return Ok(false);
        }
        let key = self.keys.path_to_key(path);
        Ok(self
            .store
            .head_object(&key)
            .await?
            .is_some_and(|meta| !self.keys.is_dir_key(&meta.key)))
    }

    async fn dir_exists(&self, path: &str) -> ContentsResult<bool> {
        let path = self.keys.normalize(path);
        if path.is_empty() {
            return Ok(true);
        }
        let request = ListRequest::new(self.keys.path_to_dir_key(path))
            .delimiter(self.keys.delimiter())
            .max_keys(1);
        Ok(!self.store.list_objects(&request).await?.is_empty())
    }

    fn is_hidden(&self, _path: &str) -> bool {
        false
    }

    async fn new_untitled(
        &self,
        path: &str,
        kind: Option<ContentKind>,
        ext: &str,
    ) -> ContentsResult<Contents> {
        let path = self.keys.normalize(path);
        let kind = kind.unwrap_or(if ext == self.notebook_extension {
            ContentKind::Notebook
        } else {
            ContentKind::File
        });
        let (untitled, insert, ext) = match kind {
            ContentKind::Directory => (&self.names.directory, " ", ""),
            ContentKind::Notebook => (&self.names.notebook, "", self.notebook_extension.as_str()),
            ContentKind::File => (&self.names.file, "", ext),
        };

        let name = self
            .increment_filename(&format!("{untitled}{ext}"), path, insert)
            .await?;
        let target = self.join_path(path, &name);
        debug!(path = %target, kind = %kind, "creating untitled item");
        if kind == ContentKind::Directory {
            // Marked even with markers off, or the next name check cannot see it.
            self.write_marker(&target).await?;
            return self.get(&target, GetOptions::metadata().kind(kind)).await;
        }
        ContentsManager::new(self, Some(ContentsModel::of_kind(kind)), &target).await
    }

    fn checkpoints(&self) -> CheckpointsKind {
        CheckpointsKind::GenericFile
    }

    fn notebook_extension(&self) -> &str {
        &self.notebook_extension
    }

    fn join_path(&self, dir: &str, name: &str) -> String {
        self.keys.join(dir, name)
    }
}

fn not_found_or(err: StoreError, path: &str) -> ContentsError {
    if err.is_not_found() {
        ContentsError::NotFound(format!("File or directory does not exist: {path}"))
    } else {
        err.into()
    }
}

impl<S> std::fmt::Debug for S3ContentsManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ContentsManager")
            .field("bucket", &self.bucket)
            .field("directory_markers", &self.directory_markers)
            .finish_non_exhaustive()
    }
}
