//! Lexical confinement of LLM-supplied paths to a workspace root.

use std::path::{Component, Path, PathBuf};

use crate::core::errors::StandardizedToolError;

/// Resolve `raw` against `root`, refusing anything that escapes it.
///
/// Resolution is purely lexical: `.` is dropped and `..` pops a component,
/// but never above `root`. Absolute paths are accepted only when they already
/// lie inside `root`. The empty string resolves to `root` itself.
pub fn confine(root: &Path, raw: &str) -> Result<PathBuf, StandardizedToolError> {
    if raw.contains('\0') {
        return Err(StandardizedToolError::invalid_parameter(
            "path",
            "path",
            "path contains a NUL byte",
        ));
    }
    let requested = Path::new(raw.trim());
    let relative = if requested.is_absolute() {
        requested
            .strip_prefix(root)
            .map_err(|_| StandardizedToolError::path_outside_workspace(raw))?
    } else {
        requested
    };

    let mut resolved = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved.pop().is_none() {
                    return Err(StandardizedToolError::path_outside_workspace(raw));
                }
            }
            Component::Normal(part) => resolved.push(part),
            Component::RootDir | Component::Prefix(_) => {
                return Err(StandardizedToolError::path_outside_workspace(raw));
            }
        }
    }

    let mut path = root.to_path_buf();
    path.extend(resolved);
    Ok(path)
}

/// `path` relative to `root` with `/` separators, or `.` for the root itself.
pub fn display_relative(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorCode;

    fn root() -> PathBuf {
        PathBuf::from("/work/repo")
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let path = confine(&root(), "src/./main.go").expect("confine");
        assert_eq!(path, PathBuf::from("/work/repo/src/main.go"));
    }

    #[test]
    fn empty_and_dot_resolve_to_root() {
        assert_eq!(confine(&root(), "").expect("empty"), root());
        assert_eq!(confine(&root(), ".").expect("dot"), root());
    }

    #[test]
    fn parent_segments_inside_root_are_allowed() {
        let path = confine(&root(), "src/../docs/readme.md").expect("confine");
        assert_eq!(path, PathBuf::from("/work/repo/docs/readme.md"));
    }

    #[test]
    fn escaping_parent_segments_are_rejected() {
        for raw in ["..", "../etc/passwd", "src/../../other"] {
            let err = confine(&root(), raw).unwrap_err();
            assert_eq!(err.code, ErrorCode::PathOutsideWorkspace, "{raw}");
        }
    }

    #[test]
    fn absolute_paths_must_be_inside_root() {
        assert_eq!(
            confine(&root(), "/work/repo/a.txt").expect("inside"),
            PathBuf::from("/work/repo/a.txt")
        );
        let err = confine(&root(), "/etc/passwd").unwrap_err();
        assert_eq!(err.code, ErrorCode::PathOutsideWorkspace);
    }

    #[test]
    fn nul_bytes_are_invalid() {
        let err = confine(&root(), "a\0b").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn display_relative_uses_forward_slashes() {
        let path = root().join("src").join("main.go");
        assert_eq!(display_relative(&root(), &path), "src/main.go");
        assert_eq!(display_relative(&root(), &root()), ".");
    }
}
