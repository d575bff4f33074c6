//! Import classification
//!
//! Decides, from the specifier text alone (plus the importer's location for
//! relative specifiers), whether an import names a file in the tree, an
//! external package or nothing usable.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::config::PreviewConfig;
use crate::path;

lazy_static! {
    static ref SCHEME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").unwrap();
    static ref PACKAGE_NAME_RE: Regex =
        Regex::new(r"^(?:@[a-zA-Z0-9~][a-zA-Z0-9._~\-]*/)?[a-zA-Z0-9~][a-zA-Z0-9._~\-]*$")
            .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImportTarget {
    /// Alias-prefixed specifier, already resolved to a normalized tree path.
    Alias { path: String },
    /// `./` or `../` specifier resolved against the importer's directory.
    Local { path: String },
    /// Bare specifier satisfied by the package CDN.
    Package {
        name: String,
        subpath: Option<String>,
    },
    Malformed { reason: String },
}

impl ImportTarget {
    /// Tree path for Alias and Local targets.
    pub fn tree_path(&self) -> Option<&str> {
        match self {
            ImportTarget::Alias { path } | ImportTarget::Local { path } => Some(path),
            _ => None,
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        ImportTarget::Malformed {
            reason: reason.into(),
        }
    }
}

/// Classify `specifier` as written in the file at `importer`.
pub fn classify(importer: &str, specifier: &str, alias_prefix: &str) -> ImportTarget {
    if specifier.trim().is_empty() {
        return ImportTarget::malformed("empty import specifier");
    }

    if !alias_prefix.is_empty() && specifier.starts_with(alias_prefix) {
        return match path::resolve_alias(alias_prefix, specifier) {
            Ok(path) => ImportTarget::Alias { path },
            Err(e) => ImportTarget::malformed(e.to_string()),
        };
    }

    if is_relative(specifier) {
        return match path::resolve_relative(importer, specifier) {
            Ok(path) => ImportTarget::Local { path },
            Err(e) => ImportTarget::malformed(e.to_string()),
        };
    }

    if specifier.starts_with('/') {
        return ImportTarget::malformed(format!(
            "absolute path '{}' is not supported; use a relative path or '{}'",
            specifier, alias_prefix
        ));
    }

    if SCHEME_RE.is_match(specifier) {
        return ImportTarget::malformed(format!(
            "URL or scheme specifier '{}' is not supported",
            specifier
        ));
    }

    let (name, subpath) = split_package(specifier);
    if !PACKAGE_NAME_RE.is_match(name) {
        return ImportTarget::malformed(format!("'{}' is not a valid package name", name));
    }

    ImportTarget::Package {
        name: name.to_string(),
        subpath: subpath.map(str::to_string),
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// Split a bare specifier into package name and optional subpath.
/// Scoped names keep their `@scope/name` pair.
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        match specifier.find('/') {
            Some(first) => specifier[first + 1..]
                .find('/')
                .map(|second| first + 1 + second),
            None => None,
        }
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(idx) => {
            let subpath = &specifier[idx + 1..];
            let subpath = if subpath.is_empty() { None } else { Some(subpath) };
            (&specifier[..idx], subpath)
        }
        None => (specifier, None),
    }
}

/// External locator for a package import: `{cdn}/{name}[@version][/subpath]`.
pub fn package_url(name: &str, subpath: Option<&str>, config: &PreviewConfig) -> String {
    let mut url = config.package_cdn.trim_end_matches('/').to_string();
    url.push('/');
    url.push_str(name);
    if let Some(version) = config.package_versions.get(name) {
        url.push('@');
        url.push_str(version);
    }
    if let Some(sub) = subpath {
        url.push('/');
        url.push_str(sub);
    }
    url
}
