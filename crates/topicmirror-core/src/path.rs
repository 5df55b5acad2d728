//! Lexical path helpers.

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and clean it lexically.
///
/// `.` components are dropped and `..` folds into its parent. Symlinks are
/// not resolved, so the result keeps the spelling the user gave.
pub fn normalize_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(clean(&absolute))
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Title of `folder` relative to `prefix`, using `/` separators.
///
/// Returns `None` when `folder` is not under `prefix`. A folder equal to the
/// prefix is titled `.`.
pub fn relative_title(folder: &Path, prefix: &Path) -> Option<String> {
    let rel = folder.strip_prefix(prefix).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        Some(".".to_string())
    } else {
        Some(parts.join("/"))
    }
}
