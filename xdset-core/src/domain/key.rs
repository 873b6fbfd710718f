//! Stable, path-derived identity for source files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Identity of a raw puzzle file: its path relative to the input root,
/// with `/` separators on every platform.
///
/// Two runs over the same input tree produce the same keys regardless of
/// where the tree is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from `path` relative to `root`.
    ///
    /// Falls back to the full path when `path` is not under `root`.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Self(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn key_is_relative_and_slash_separated() {
        let root = PathBuf::from("/data/raw");
        let path = root.join("nyt").join("1960").join("nyt1960-01-04.xd");
        let key = FileKey::from_path(&root, &path);
        assert_eq!(key.as_str(), "nyt/1960/nyt1960-01-04.xd");
    }

    #[test]
    fn key_is_independent_of_mount_point() {
        let a = FileKey::from_path(Path::new("/a/raw"), Path::new("/a/raw/x/p.xd"));
        let b = FileKey::from_path(Path::new("/mnt/b/raw"), Path::new("/mnt/b/raw/x/p.xd"));
        assert_eq!(a, b);
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let key = FileKey::new("x/p.xd");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"x/p.xd\"");
    }
}
