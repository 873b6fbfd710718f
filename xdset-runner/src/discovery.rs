//! Input discovery: recursive walk, extension filter, sorted by key.
//!
//! Walk order is never used; the candidate list is sorted by the
//! path-derived key so that `limit` always selects the same files.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use xdset_core::FileKey;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("input directory not found: {0}")]
    MissingRoot(PathBuf),
}

/// A raw puzzle file and its stable identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub key: FileKey,
    pub path: PathBuf,
}

/// Every file under `root` with the given extension, sorted by key,
/// truncated to the first `limit`. Unreadable entries are logged and skipped.
pub fn discover(
    root: &Path,
    extension: &str,
    limit: Option<usize>,
) -> Result<Vec<SourceFile>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::MissingRoot(root.to_path_buf()));
    }
    let extension = extension.trim_start_matches('.');

    let mut files = Vec::new();
    for entry in jwalk::WalkDir::new(root).skip_hidden(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable input entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            files.push(SourceFile {
                key: FileKey::from_path(root, &path),
                path,
            });
        }
    }

    files.sort();
    let found = files.len();
    if let Some(n) = limit {
        files.truncate(n);
    }
    debug!(root = %root.display(), found, selected = files.len(), "discovered input files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn sorted_filtered_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "nyt/2020/b.xd");
        touch(dir.path(), "nyt/2020/a.xd");
        touch(dir.path(), "lat/z.xd");
        touch(dir.path(), "lat/readme.txt");
        touch(dir.path(), "upper.XD");

        let all = discover(dir.path(), "xd", None).unwrap();
        let keys: Vec<&str> = all.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["lat/z.xd", "nyt/2020/a.xd", "nyt/2020/b.xd", "upper.XD"]);

        let first = discover(dir.path(), ".xd", Some(2)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].key.as_str(), "nyt/2020/a.xd");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ok/a.xd");
        touch(dir.path(), "locked/b.xd");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits do not apply to root.
        let enforced = fs::read_dir(&locked).is_err();

        let result = discover(dir.path(), "xd", None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let keys: Vec<String> = result
            .unwrap()
            .into_iter()
            .map(|f| f.key.as_str().to_string())
            .collect();
        if enforced {
            assert_eq!(keys, ["ok/a.xd"]);
        } else {
            assert_eq!(keys, ["locked/b.xd", "ok/a.xd"]);
        }
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope"), "xd", None).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingRoot(_)));
    }
}
