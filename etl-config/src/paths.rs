//! Path utilities for configuration files
//!
//! Configuration files refer to other files and directories relative to a base
//! directory. These helpers qualify such paths and normalize them lexically so
//! that log messages and endpoint identities show a stable, fully qualified path.

use std::path::{Component, Path, PathBuf};

/// Qualify `path` against `base` if it is not already absolute.
pub fn qualify_path(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.as_ref().join(path)
    }
}

/// Lexically normalize `.` and `..` components.
///
/// The filesystem is not consulted, so the path does not need to exist and
/// symbolic links are left alone. A `..` at the root of an absolute path is
/// dropped; a leading `..` in a relative path is kept.
pub fn resolve_path(path: impl AsRef<Path>) -> PathBuf {
    let mut resolved = PathBuf::new();

    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match resolved.components().next_back() {
                Some(Component::Normal(_)) => {
                    resolved.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => resolved.push(".."),
            },
            other => resolved.push(other.as_os_str()),
        }
    }

    if resolved.as_os_str().is_empty() {
        resolved.push(".");
    }
    resolved
}

/// Qualify and normalize in one step.
pub fn qualify_and_resolve(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    resolve_path(qualify_path(path, base))
}
