//! Local tree walker.
//!
//! Enumerates the build output directory depth-first and maps every file to
//! the object key it will be stored under. The relative key is the bridge
//! between the local tree and the bucket: it is the path below the root with
//! `/` separators on every platform.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// One entry below the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    /// Absolute (or root-joined) path on disk.
    pub absolute_path: PathBuf,
    /// Path relative to the root with `/` separators; used as the object key.
    pub relative_key: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

/// Error produced while walking the local tree.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// An entry could not be read, or a symlink loop was found.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: walkdir::Error,
    },

    /// A path below the root is not valid UTF-8 and has no object key.
    #[error("path is not valid UTF-8: {}", .path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}

impl WalkError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::NonUtf8Path { path } => path,
        }
    }
}

/// A local build output directory.
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
}

impl LocalTree {
    /// Create a walker rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk every entry below the root, depth-first.
    ///
    /// Each call starts a fresh walk. Directories are yielded with
    /// `is_directory` set. Symbolic links are followed, so a linked directory
    /// is walked like a real one; a link cycle surfaces as a
    /// [`WalkError::Read`]. Order between siblings is whatever the filesystem
    /// returns.
    pub fn walk(&self) -> impl Iterator<Item = Result<LocalAsset, WalkError>> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .map(move |entry| {
                let entry = entry.map_err(|source| WalkError::Read {
                    path: source
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf),
                    source,
                })?;
                let relative_key = relative_key(&self.root, entry.path()).ok_or_else(|| {
                    WalkError::NonUtf8Path {
                        path: entry.path().to_path_buf(),
                    }
                })?;
                Ok(LocalAsset {
                    is_directory: entry.file_type().is_dir(),
                    absolute_path: entry.into_path(),
                    relative_key,
                })
            })
    }

    /// Lazily walk only the files below the root.
    pub fn files(&self) -> impl Iterator<Item = Result<LocalAsset, WalkError>> {
        self.walk()
            .filter(|entry| !matches!(entry, Ok(asset) if asset.is_directory))
    }
}

/// Object key for `path` below `root`.
///
/// Uses path components rather than string slicing, so the host separator
/// never leaks into the key. Returns `None` when a component is not valid
/// UTF-8: such names have no faithful key and are never mapped lossily.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(normalize_key(&parts.join("/")))
}

/// Normalize a relative path string into an object key: backslashes become
/// forward slashes and leading separators are dropped.
///
/// ```
/// use sitestack_deploy::walker::normalize_key;
///
/// assert_eq!(normalize_key(r"sub\dir\a.js"), "sub/dir/a.js");
/// assert_eq!(normalize_key("sub/dir/a.js"), "sub/dir/a.js");
/// ```
#[must_use]
pub fn normalize_key(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_owned()
}
