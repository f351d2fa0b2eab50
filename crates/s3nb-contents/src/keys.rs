//! Mapping between virtual paths and object keys.

use crate::config::BucketConfig;

/// Translates virtual paths to keys under a prefix and back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMapper {
    prefix: String,
    delimiter: String,
}

impl KeyMapper {
    /// `delimiter` must be non-empty; [`BucketConfig`] guarantees it.
    pub fn new(bucket: &BucketConfig) -> Self {
        Self {
            prefix: bucket.prefix.clone(),
            delimiter: bucket.delimiter.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Strip leading and trailing delimiters.
    pub fn normalize<'a>(&self, path: &'a str) -> &'a str {
        let mut path = path;
        while let Some(rest) = path.strip_prefix(self.delimiter.as_str()) {
            path = rest;
        }
        while let Some(rest) = path.strip_suffix(self.delimiter.as_str()) {
            path = rest;
        }
        path
    }

    /// Key of a file or notebook.
    pub fn path_to_key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, self.normalize(path))
    }

    /// Key of a directory: the file key plus a delimiter, or the bare
    /// prefix for the root.
    pub fn path_to_dir_key(&self, path: &str) -> String {
        let path = self.normalize(path);
        if path.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}{}{}", self.prefix, path, self.delimiter)
        }
    }

    /// Virtual path of a key.
    pub fn key_to_path<'a>(&self, key: &'a str) -> &'a str {
        let relative = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
        self.normalize(relative)
    }

    /// Last component of a key or path.
    pub fn name_of<'a>(&self, key: &'a str) -> &'a str {
        let trimmed = self.normalize(key);
        trimmed
            .rsplit(self.delimiter.as_str())
            .next()
            .unwrap_or(trimmed)
    }

    pub fn is_dir_key(&self, key: &str) -> bool {
        key.ends_with(self.delimiter.as_str())
    }

    /// Virtual path of `name` inside `dir`.
    pub fn join(&self, dir: &str, name: &str) -> String {
        let dir = self.normalize(dir);
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}{}{name}", self.delimiter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mapper(uri: &str) -> KeyMapper {
        KeyMapper::new(&BucketConfig::from_base_uri(uri, "/").unwrap())
    }

    #[test]
    fn file_and_directory_keys() {
        let keys = mapper("s3://mybucket/nb");
        assert_eq!(keys.path_to_key("foo.ipynb"), "nb/foo.ipynb");
        assert_eq!(keys.path_to_key("/a/b.txt/"), "nb/a/b.txt");
        assert_eq!(keys.path_to_dir_key("a/b"), "nb/a/b/");
        assert_eq!(keys.path_to_dir_key(""), "nb/");
        assert_eq!(keys.path_to_dir_key("/"), "nb/");
    }

    #[test]
    fn keys_back_to_paths() {
        let keys = mapper("s3://mybucket/nb");
        assert_eq!(keys.key_to_path("nb/foo.ipynb"), "foo.ipynb");
        assert_eq!(keys.key_to_path("nb/sub/"), "sub");
        assert_eq!(keys.key_to_path("nb/"), "");
    }

    #[test]
    fn names() {
        let keys = mapper("s3://b/nb");
        assert_eq!(keys.name_of("nb/a/b/c.txt"), "c.txt");
        assert_eq!(keys.name_of("nb/a/dir/"), "dir");
        assert_eq!(keys.name_of("top"), "top");
        assert_eq!(keys.name_of(""), "");
    }

    #[test]
    fn root_prefix() {
        let keys = mapper("s3://b");
        assert_eq!(keys.path_to_key("x"), "x");
        assert_eq!(keys.path_to_dir_key(""), "");
        assert_eq!(keys.key_to_path("d/"), "d");
    }

    #[test]
    fn multi_character_delimiter() {
        let keys = KeyMapper::new(&BucketConfig::from_base_uri("s3://b::nb", "::").unwrap());
        assert_eq!(keys.path_to_dir_key("::a::b::"), "nb::a::b::");
        assert_eq!(keys.name_of("nb::a::b::"), "b");
        assert_eq!(keys.join("a", "c"), "a::c");
    }

    #[test]
    fn join_paths() {
        let keys = mapper("s3://b/nb");
        assert_eq!(keys.join("", "Untitled.ipynb"), "Untitled.ipynb");
        assert_eq!(keys.join("/sub/", "x"), "sub/x");
    }

    proptest! {
        #[test]
        fn path_round_trip(path in "[a-z/. ]{0,24}") {
            let keys = mapper("s3://b/nb");
            let key = keys.path_to_key(&path);
            prop_assert_eq!(keys.key_to_path(&key), keys.normalize(&path));
        }

        #[test]
        fn dir_keys_end_with_delimiter(path in "[a-z/]{0,16}") {
            let keys = mapper("s3://b/nb");
            prop_assert!(keys.is_dir_key(&keys.path_to_dir_key(&path)));
        }
    }
}
