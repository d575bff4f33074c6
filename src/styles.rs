use serde::Serialize;
use std::collections::HashSet;

use crate::transform::FileKind;
use crate::tree::VirtualFileTree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedStyle {
    pub path: String,
    pub content: String,
}

/// Style files among `reachable`, in first-reachable order, once each.
/// Paths that no longer resolve to a file are skipped.
pub fn aggregate(tree: &VirtualFileTree, reachable: &[String]) -> Vec<CollectedStyle> {
    let mut seen = HashSet::new();
    reachable
        .iter()
        .filter(|path| FileKind::from_path(path) == FileKind::Style)
        .filter(|path| seen.insert(path.as_str()))
        .filter_map(|path| {
            tree.read_file(path).ok().map(|content| CollectedStyle {
                path: path.clone(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Concatenate styles in order, each preceded by a comment naming its file.
pub fn concatenate(styles: &[CollectedStyle]) -> String {
    styles
        .iter()
        .map(|s| format!("/* {} */\n{}", s.path, s.content.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
