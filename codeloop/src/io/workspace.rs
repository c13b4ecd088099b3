//! Workspace filesystem access for built-in tools.
//!
//! Tools never touch `std::fs` directly: they resolve LLM-supplied paths
//! through [`Workspace::resolve`] and perform I/O through the injected
//! [`FileSystem`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::errors::StandardizedToolError;
use crate::core::path::{confine, display_relative};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub is_dir: bool,
    pub len: u64,
}

pub trait FileSystem: Send + Sync {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Write `contents`, creating missing parent directories.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Entries of a directory, sorted by name.
    fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    /// Resolve symlinks. Filesystems without links return the path unchanged.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
    /// Whether `path` itself is a symlink, without following it.
    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        Ok(FileMeta {
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
    }
}

/// A workspace root plus the filesystem used to access it.
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    pub fn new(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { root, fs }
    }

    /// Workspace on the local disk. `root` must exist.
    pub fn local(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("resolve workspace root {}", root.display()))?;
        Ok(Self::new(root, Arc::new(OsFileSystem)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Confine `raw` to the root, including through symlinks.
    ///
    /// The nearest existing ancestor must resolve inside the root. Components
    /// below it that do not resolve must not be dangling symlinks, since a
    /// later write would follow them.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, StandardizedToolError> {
        let path = confine(&self.root, raw)?;
        for candidate in path.ancestors() {
            if let Ok(real) = self.fs.canonicalize(candidate) {
                if !real.starts_with(&self.root) {
                    return Err(StandardizedToolError::path_outside_workspace(raw));
                }
                break;
            }
            if self.fs.is_symlink(candidate) {
                return Err(StandardizedToolError::path_outside_workspace(raw));
            }
        }
        Ok(path)
    }

    /// Whether an existing `path` resolves inside the root. Dangling links
    /// and unreadable paths count as outside.
    pub fn contains(&self, path: &Path) -> bool {
        self.fs
            .canonicalize(path)
            .is_ok_and(|real| real.starts_with(&self.root))
    }

    pub fn display(&self, path: &Path) -> String {
        display_relative(&self.root, path)
    }
}

/// Map an I/O failure to a self-correctable error, if it is one.
///
/// Anything else (disk full, I/O device errors) is an internal fault for the
/// caller to propagate.
pub fn classify_io_error(
    err: &io::Error,
    display: &str,
    expect_dir: bool,
) -> Option<StandardizedToolError> {
    match err.kind() {
        io::ErrorKind::NotFound if expect_dir => {
            Some(StandardizedToolError::directory_not_found(display))
        }
        io::ErrorKind::NotFound => Some(StandardizedToolError::file_not_found(display)),
        io::ErrorKind::PermissionDenied => Some(StandardizedToolError::permission_denied(display)),
        io::ErrorKind::IsADirectory => Some(StandardizedToolError::not_a_file(display)),
        io::ErrorKind::NotADirectory => Some(StandardizedToolError::not_a_directory(display)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;

    #[test]
    fn resolve_confines_to_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::local(temp.path()).expect("workspace");

        let path = workspace.resolve("src/new.go").expect("resolve");
        assert!(path.starts_with(workspace.root()));
        assert_eq!(workspace.display(&path), "src/new.go");

        let err = workspace.resolve("../outside").unwrap_err();
        assert_eq!(err.code, ErrorCode::PathOutsideWorkspace);
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_escape() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("root");
        std::os::unix::fs::symlink(outside.path(), root.join("link")).expect("symlink");

        let workspace = Workspace::local(&root).expect("workspace");
        let err = workspace.resolve("link/secret.txt").unwrap_err();
        assert_eq!(err.code, ErrorCode::PathOutsideWorkspace);
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_dangling_symlink() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("root");
        let target = outside.path().join("created.txt");
        std::os::unix::fs::symlink(&target, root.join("evil")).expect("symlink");

        let workspace = Workspace::local(&root).expect("workspace");
        let err = workspace.resolve("evil").unwrap_err();
        assert_eq!(err.code, ErrorCode::PathOutsideWorkspace);
        let err = workspace.resolve("evil/nested.txt").unwrap_err();
        assert_eq!(err.code, ErrorCode::PathOutsideWorkspace);
        assert!(workspace.resolve("fresh/new.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn contains_follows_links() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside");
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).expect("root");
        fs::write(root.join("inside.txt"), "x").expect("write");
        fs::write(outside.path().join("secret.txt"), "s").expect("write");
        std::os::unix::fs::symlink(root.join("inside.txt"), root.join("alias")).expect("symlink");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.join("leak"))
            .expect("symlink");

        let workspace = Workspace::local(&root).expect("workspace");
        assert!(workspace.contains(&workspace.root().join("inside.txt")));
        assert!(workspace.contains(&workspace.root().join("alias")));
        assert!(!workspace.contains(&workspace.root().join("leak")));
        assert!(!workspace.contains(&workspace.root().join("missing")));
    }

    #[test]
    fn os_filesystem_writes_parents_and_lists_sorted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fs = OsFileSystem;
        fs.write(&temp.path().join("b/inner.txt"), b"x").expect("write");
        fs.write(&temp.path().join("a.txt"), b"hello").expect("write");

        let entries = fs.list(temp.path()).expect("list");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b"]);
        assert_eq!(entries[0].size, 5);
        assert!(entries[1].is_dir);
    }

    #[test]
    fn classify_io_error_maps_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let mapped = classify_io_error(&err, "a.go", false).expect("mapped");
        assert_eq!(mapped.code, ErrorCode::FileNotFound);
        let mapped = classify_io_error(&err, "src", true).expect("mapped");
        assert_eq!(mapped.code, ErrorCode::DirectoryNotFound);
        let other = io::Error::other("disk on fire");
        assert!(classify_io_error(&other, "a.go", false).is_none());
    }
}
