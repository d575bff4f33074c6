//! Path Normalization for the virtual tree
//!
//! Pure functions over `/`-separated paths. Every path stored in the tree is
//! the output of [`normalize`]: a single leading `/`, no trailing `/`, no `.`
//! or `..` segments and no empty segments. The root is `/`.

use crate::error::TreeError;

pub const ROOT: &str = "/";

/// Canonicalize a path relative to the tree root.
///
/// Relative inputs (`a/b`) are treated as rooted (`/a/b`). A `..` that would
/// climb above the root is rejected rather than clamped.
pub fn normalize(path: &str) -> Result<String, TreeError> {
    if path.is_empty() {
        return Err(TreeError::invalid_path(path, "path is empty"));
    }
    if path.contains('\0') {
        return Err(TreeError::invalid_path(path, "path contains a NUL byte"));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(TreeError::invalid_path(path, "path escapes the root"));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Ok(ROOT.to_string());
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    Ok(normalized)
}

/// Resolve a `./` or `../` specifier against the directory containing `from_file`.
pub fn resolve_relative(from_file: &str, specifier: &str) -> Result<String, TreeError> {
    let from = normalize(from_file)?;
    let dir = parent(&from).unwrap_or(ROOT);
    normalize(&join(dir, specifier))
}

/// Strip an alias prefix (which stands for the tree root) and re-normalize.
pub fn resolve_alias(alias_prefix: &str, specifier: &str) -> Result<String, TreeError> {
    match specifier.strip_prefix(alias_prefix) {
        Some(rest) => normalize(&format!("/{}", rest)),
        None => Err(TreeError::invalid_path(
            specifier,
            format!("specifier does not start with alias '{}'", alias_prefix),
        )),
    }
}

/// Parent directory of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => Some(ROOT),
    }
}

/// Final segment of a normalized path (empty for the root).
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Extension of the final segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Join a directory and a child (not normalized).
pub fn join(dir: &str, child: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, child)
    } else {
        format!("{}/{}", dir, child)
    }
}

/// True when `path` lies strictly below `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Every proper ancestor of a normalized path, root first.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut chain = Vec::new();
    let mut current = parent(path);
    while let Some(dir) = current {
        chain.push(dir);
        current = parent(dir);
    }
    chain.reverse();
    chain
}
