//! Virtual File Tree
//!
//! The authoritative in-memory hierarchy. Nodes are keyed by normalized path
//! in a `BTreeMap`; directories hold the *names* of their children, never
//! references to them, so there is no parent/child ownership cycle.
//!
//! Every mutating operation validates completely before it touches the map.
//! A call that returns `Err` leaves the tree exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::TreeError;
use crate::path::{self, ROOT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsNode {
    File { content: String },
    Directory { children: BTreeSet<String> },
}

impl FsNode {
    fn empty_dir() -> Self {
        FsNode::Directory {
            children: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FsNode::File { .. } => NodeKind::File,
            FsNode::Directory { .. } => NodeKind::Directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Immediate child returned by [`VirtualFileTree::list_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
}

/// One entry of the flat persistence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SerializedNode {
    File { content: String },
    Directory {},
}

/// Flat `path -> node` mapping exchanged with the persistence collaborator.
pub type Snapshot = BTreeMap<String, SerializedNode>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFileTree {
    nodes: BTreeMap<String, FsNode>,
}

impl Default for VirtualFileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT.to_string(), FsNode::empty_dir());
        Self { nodes }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn exists(&self, path: &str) -> bool {
        path::normalize(path)
            .map(|p| self.nodes.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.kind_of(path) == Some(NodeKind::File)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.kind_of(path) == Some(NodeKind::Directory)
    }

    pub fn kind_of(&self, path: &str) -> Option<NodeKind> {
        let normalized = path::normalize(path).ok()?;
        self.nodes.get(&normalized).map(FsNode::kind)
    }

    pub fn read_file(&self, path: &str) -> Result<&str, TreeError> {
        let normalized = path::normalize(path)?;
        match self.nodes.get(&normalized) {
            Some(FsNode::File { content }) => Ok(content),
            _ => Err(TreeError::not_found(&normalized)),
        }
    }

    pub fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, TreeError> {
        let normalized = path::normalize(path)?;
        match self.nodes.get(&normalized) {
            Some(FsNode::Directory { children }) => Ok(children
                .iter()
                .filter_map(|name| {
                    let child_path = path::join(&normalized, name);
                    self.nodes.get(&child_path).map(|node| DirEntry {
                        name: name.clone(),
                        path: child_path.clone(),
                        kind: node.kind(),
                    })
                })
                .collect()),
            Some(FsNode::File { .. }) => Err(TreeError::invalid_operation(
                &normalized,
                "not a directory",
            )),
            None => Err(TreeError::not_found(&normalized)),
        }
    }

    /// All files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().filter_map(|(path, node)| match node {
            FsNode::File { content } => Some((path.as_str(), content.as_str())),
            FsNode::Directory { .. } => None,
        })
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    /// Render a file with 1-based line numbers, optionally limited to an
    /// inclusive line range. Used by the orchestration layer to show the model
    /// what it is about to edit.
    pub fn view_file(&self, path: &str, range: Option<(usize, usize)>) -> Result<String, TreeError> {
        let content = self.read_file(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let (start, end) = match range {
            Some((start, end)) => {
                if start == 0 || start > end || end > lines.len().max(1) {
                    return Err(TreeError::invalid_operation(
                        path,
                        format!("line range {}..={} is out of bounds", start, end),
                    ));
                }
                (start, end.min(lines.len()))
            }
            None => (1, lines.len()),
        };
        let width = end.max(1).to_string().len();
        Ok(lines
            .iter()
            .enumerate()
            .skip(start - 1)
            .take(end + 1 - start)
            .map(|(idx, line)| format!("{:>width$}\t{}", idx + 1, line, width = width))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MUTATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Create or overwrite a file, creating any missing ancestor directories.
    pub fn create_file(&mut self, path: &str, content: &str) -> Result<(), TreeError> {
        let normalized = path::normalize(path)?;
        if normalized == ROOT {
            return Err(TreeError::conflict(&normalized, "the root is a directory"));
        }
        if let Some(FsNode::Directory { .. }) = self.nodes.get(&normalized) {
            return Err(TreeError::conflict(
                &normalized,
                "a directory already exists at this path",
            ));
        }
        self.check_ancestors(&normalized)?;

        self.ensure_ancestors(&normalized);
        self.nodes.insert(
            normalized,
            FsNode::File {
                content: content.to_string(),
            },
        );
        Ok(())
    }

    /// Create a directory (and its ancestors). Existing directories are left alone.
    pub fn create_directory(&mut self, path: &str) -> Result<(), TreeError> {
        let normalized = path::normalize(path)?;
        match self.nodes.get(&normalized) {
            Some(FsNode::Directory { .. }) => return Ok(()),
            Some(FsNode::File { .. }) => {
                return Err(TreeError::conflict(
                    &normalized,
                    "a file already exists at this path",
                ))
            }
            None => {}
        }
        self.check_ancestors(&normalized)?;

        self.ensure_ancestors(&normalized);
        self.nodes.insert(normalized, FsNode::empty_dir());
        Ok(())
    }

    pub fn update_file(&mut self, path: &str, content: &str) -> Result<(), TreeError> {
        let normalized = path::normalize(path)?;
        match self.nodes.get_mut(&normalized) {
            Some(FsNode::File { content: existing }) => {
                *existing = content.to_string();
                Ok(())
            }
            _ => Err(TreeError::not_found(&normalized)),
        }
    }

    /// Replace every occurrence of `old` in a file. Returns the number of replacements.
    pub fn replace_in_file(&mut self, path: &str, old: &str, new: &str) -> Result<usize, TreeError> {
        let normalized = path::normalize(path)?;
        if old.is_empty() {
            return Err(TreeError::invalid_operation(
                &normalized,
                "search text is empty",
            ));
        }
        let content = self.read_file(&normalized)?;
        let count = content.matches(old).count();
        if count == 0 {
            return Err(TreeError::invalid_operation(
                &normalized,
                "search text not found in file",
            ));
        }
        let replaced = content.replace(old, new);
        self.update_file(&normalized, &replaced)?;
        Ok(count)
    }

    /// Insert `text` before the 0-based `line` (a line equal to the line count appends).
    pub fn insert_in_file(&mut self, path: &str, line: usize, text: &str) -> Result<(), TreeError> {
        let normalized = path::normalize(path)?;
        let content = self.read_file(&normalized)?;
        let mut lines: Vec<&str> = content.split('\n').collect();
        if content.is_empty() {
            lines.clear();
        }
        if line > lines.len() {
            return Err(TreeError::invalid_operation(
                &normalized,
                format!("line {} is past the end of the file ({} lines)", line, lines.len()),
            ));
        }
        lines.insert(line, text);
        let updated = lines.join("\n");
        self.update_file(&normalized, &updated)
    }

    /// Remove a file, or a directory together with its whole subtree.
    pub fn delete_entry(&mut self, path: &str) -> Result<(), TreeError> {
        let normalized = path::normalize(path)?;
        if normalized == ROOT {
            return Err(TreeError::invalid_operation(
                &normalized,
                "the root cannot be deleted",
            ));
        }
        if !self.nodes.contains_key(&normalized) {
            return Err(TreeError::not_found(&normalized));
        }

        for doomed in self.subtree_paths(&normalized) {
            self.nodes.remove(&doomed);
        }
        self.unlink_from_parent(&normalized);
        Ok(())
    }

    /// Move a file or directory. Directory moves carry every descendant along.
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<(), TreeError> {
        let from = path::normalize(old_path)?;
        let to = path::normalize(new_path)?;

        if from == ROOT {
            return Err(TreeError::invalid_operation(&from, "the root cannot be renamed"));
        }
        if !self.nodes.contains_key(&from) {
            return Err(TreeError::not_found(&from));
        }
        if from == to {
            return Ok(());
        }
        if self.nodes.contains_key(&to) {
            return Err(TreeError::conflict(&to, "destination is already occupied"));
        }
        if path::is_descendant(&to, &from) {
            return Err(TreeError::invalid_operation(
                &from,
                format!("cannot move a directory into itself ('{}')", to),
            ));
        }
        self.check_ancestors(&to)?;

        let moved: Vec<(String, FsNode)> = self
            .subtree_paths(&from)
            .into_iter()
            .filter_map(|p| self.nodes.remove(&p).map(|node| (p, node)))
            .collect();
        self.unlink_from_parent(&from);

        self.ensure_ancestors(&to);
        for (old, node) in moved {
            let relocated = format!("{}{}", to, &old[from.len()..]);
            self.nodes.insert(relocated, node);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn serialize(&self) -> Snapshot {
        self.nodes
            .iter()
            .map(|(path, node)| {
                let entry = match node {
                    FsNode::File { content } => SerializedNode::File {
                        content: content.clone(),
                    },
                    FsNode::Directory { .. } => SerializedNode::Directory {},
                };
                (path.clone(), entry)
            })
            .collect()
    }

    /// Replace the entire tree with the contents of `snapshot`.
    ///
    /// The replacement is built on the side and swapped in only when the whole
    /// snapshot is consistent.
    pub fn deserialize(&mut self, snapshot: &Snapshot) -> Result<(), TreeError> {
        let mut normalized: BTreeMap<String, &SerializedNode> = BTreeMap::new();
        for (raw, node) in snapshot {
            let path = path::normalize(raw)
                .map_err(|e| TreeError::invalid_snapshot(format!("bad key '{}': {}", raw, e)))?;
            if normalized.insert(path.clone(), node).is_some() {
                return Err(TreeError::invalid_snapshot(format!(
                    "'{}' appears more than once after normalization",
                    path
                )));
            }
        }

        let mut rebuilt = VirtualFileTree::new();
        for (path, node) in &normalized {
            for ancestor in path::ancestors(path) {
                if let Some(SerializedNode::File { .. }) = normalized.get(ancestor) {
                    return Err(TreeError::invalid_snapshot(format!(
                        "file '{}' is also used as a directory by '{}'",
                        ancestor, path
                    )));
                }
            }
            match node {
                SerializedNode::File { content } => {
                    if path == ROOT {
                        return Err(TreeError::invalid_snapshot("the root cannot be a file"));
                    }
                    rebuilt.ensure_ancestors(path);
                    rebuilt.nodes.insert(
                        path.clone(),
                        FsNode::File {
                            content: content.clone(),
                        },
                    );
                }
                SerializedNode::Directory {} => {
                    rebuilt.ensure_ancestors(path);
                    rebuilt
                        .nodes
                        .entry(path.clone())
                        .or_insert_with(FsNode::empty_dir);
                }
            }
        }

        *self = rebuilt;
        Ok(())
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        tree.deserialize(snapshot)?;
        Ok(tree)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.serialize()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| TreeError::invalid_snapshot(format!("malformed JSON: {}", e)))?;
        Self::from_snapshot(&snapshot)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Fails when any existing ancestor of `path` is a file.
    fn check_ancestors(&self, path: &str) -> Result<(), TreeError> {
        for ancestor in path::ancestors(path) {
            if let Some(FsNode::File { .. }) = self.nodes.get(ancestor) {
                return Err(TreeError::conflict(
                    path,
                    format!("ancestor '{}' is a file", ancestor),
                ));
            }
        }
        Ok(())
    }

    /// Create missing ancestor directories and link `path` into its parent.
    /// Callers have already run `check_ancestors`.
    fn ensure_ancestors(&mut self, path: &str) {
        let mut child = path.to_string();
        while let Some(parent) = path::parent(&child).map(str::to_string) {
            let name = path::file_name(&child).to_string();
            let entry = self
                .nodes
                .entry(parent.clone())
                .or_insert_with(FsNode::empty_dir);
            if let FsNode::Directory { children } = entry {
                if !children.insert(name) {
                    break;
                }
            }
            child = parent;
        }
    }

    fn unlink_from_parent(&mut self, path: &str) {
        if let Some(parent) = path::parent(path) {
            if let Some(FsNode::Directory { children }) = self.nodes.get_mut(parent) {
                children.remove(path::file_name(path));
            }
        }
    }

    /// `path` itself followed by every descendant, in path order.
    fn subtree_paths(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path);
        let mut paths = vec![path.to_string()];
        paths.extend(
            self.nodes
                .range(prefix.clone()..)
                .take_while(|(p, _)| p.starts_with(&prefix))
                .map(|(p, _)| p.clone()),
        );
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> VirtualFileTree {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/App.jsx", "export default function App() {}")
            .unwrap();
        tree.create_file("/components/Button.jsx", "export const Button = 1;")
            .unwrap();
        tree.create_file("/components/ui/Card.jsx", "export const Card = 2;")
            .unwrap();
        tree.create_file("/styles.css", "body { margin: 0; }").unwrap();
        tree
    }

    #[test]
    fn test_new_tree_has_only_root() {
        let tree = VirtualFileTree::new();
        assert!(tree.is_directory("/"));
        assert_eq!(tree.file_count(), 0);
        assert!(tree.list_directory("/").unwrap().is_empty());
    }

    #[test]
    fn test_create_file_creates_ancestors() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/a/b/c.js", "x").unwrap();
        assert!(tree.is_directory("/a"));
        assert!(tree.is_directory("/a/b"));
        assert_eq!(tree.read_file("/a/b/c.js").unwrap(), "x");

        let root: Vec<String> = tree
            .list_directory("/")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(root, vec!["a"]);
    }

    #[test]
    fn test_create_file_normalizes_and_overwrites() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("a//b/./c.js", "one").unwrap();
        tree.create_file("/a/b/c.js", "two").unwrap();
        assert_eq!(tree.read_file("/a/b/c.js").unwrap(), "two");
        assert_eq!(tree.file_count(), 1);
    }

    #[test]
    fn test_create_file_conflicts() {
        let mut tree = sample_tree();
        let before = tree.clone();

        assert!(matches!(
            tree.create_file("/components", "x"),
            Err(TreeError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.create_file("/App.jsx/child.js", "x"),
            Err(TreeError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.create_file("/", "x"),
            Err(TreeError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.create_file("/../x.js", "x"),
            Err(TreeError::InvalidPath { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_update_file() {
        let mut tree = sample_tree();
        tree.update_file("/App.jsx", "new").unwrap();
        assert_eq!(tree.read_file("/App.jsx").unwrap(), "new");
        assert!(matches!(
            tree.update_file("/Missing.jsx", "x"),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            tree.update_file("/components", "x"),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_read_file_on_directory_is_not_found() {
        let tree = sample_tree();
        assert!(matches!(
            tree.read_file("/components"),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_directory_removes_descendants() {
        let mut tree = sample_tree();
        tree.delete_entry("/components").unwrap();
        for gone in [
            "/components",
            "/components/Button.jsx",
            "/components/ui",
            "/components/ui/Card.jsx",
        ] {
            assert!(!tree.exists(gone), "{} should be gone", gone);
        }
        assert!(matches!(
            tree.read_file("/components/ui/Card.jsx"),
            Err(TreeError::NotFound { .. })
        ));
        let names: Vec<String> = tree
            .list_directory("/")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["App.jsx", "styles.css"]);
    }

    #[test]
    fn test_delete_errors() {
        let mut tree = sample_tree();
        assert!(matches!(
            tree.delete_entry("/"),
            Err(TreeError::InvalidOperation { .. })
        ));
        assert!(matches!(
            tree.delete_entry("/nope"),
            Err(TreeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_directory_moves_subtree() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/a/b/c.js", "c").unwrap();
        tree.create_file("/a/d.js", "d").unwrap();

        tree.rename("/a", "/z").unwrap();

        assert_eq!(tree.read_file("/z/b/c.js").unwrap(), "c");
        assert_eq!(tree.read_file("/z/d.js").unwrap(), "d");
        assert!(!tree.exists("/a"));
        assert!(matches!(
            tree.read_file("/a/b/c.js"),
            Err(TreeError::NotFound { .. })
        ));
        let names: Vec<String> = tree
            .list_directory("/z")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b", "d.js"]);
    }

    #[test]
    fn test_rename_file_into_new_directory() {
        let mut tree = sample_tree();
        tree.rename("/App.jsx", "/src/App.jsx").unwrap();
        assert!(tree.is_directory("/src"));
        assert!(tree.is_file("/src/App.jsx"));
        assert!(!tree.exists("/App.jsx"));
    }

    #[test]
    fn test_rename_conflicts_leave_tree_untouched() {
        let mut tree = sample_tree();
        let before = tree.clone();

        // file onto directory and directory onto file
        assert!(matches!(
            tree.rename("/App.jsx", "/components"),
            Err(TreeError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.rename("/components", "/styles.css"),
            Err(TreeError::PathConflict { .. })
        ));
        assert!(matches!(
            tree.rename("/components", "/components/ui/inner"),
            Err(TreeError::InvalidOperation { .. })
        ));
        assert!(matches!(
            tree.rename("/missing", "/x"),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            tree.rename("/components", "/App.jsx/x"),
            Err(TreeError::PathConflict { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut tree = sample_tree();
        tree.create_directory("/empty/dir").unwrap();

        let snapshot = tree.serialize();
        let restored = VirtualFileTree::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, tree);

        let json = tree.to_json();
        assert_eq!(VirtualFileTree::from_json(&json).unwrap(), tree);
    }

    #[test]
    fn test_serialized_shape() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/a/b.js", "x").unwrap();
        let value = serde_json::to_value(tree.serialize()).unwrap();
        assert_eq!(value["/a"]["type"], "directory");
        assert_eq!(value["/a/b.js"]["type"], "file");
        assert_eq!(value["/a/b.js"]["content"], "x");
        assert!(value["/a"].get("content").is_none());
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_snapshot() {
        let mut tree = sample_tree();
        let before = tree.clone();

        let json = r#"{
            "/a.js": {"type": "file", "content": "x"},
            "/a.js/b.js": {"type": "file", "content": "y"}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(matches!(
            tree.deserialize(&snapshot),
            Err(TreeError::InvalidSnapshot { .. })
        ));

        let json = r#"{
            "/a.js": {"type": "file", "content": "x"},
            "//a.js": {"type": "file", "content": "y"}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(tree.deserialize(&snapshot).is_err());

        assert_eq!(tree, before);
    }

    #[test]
    fn test_deserialize_creates_missing_parents() {
        let json = r#"{"/deep/nested/file.js": {"type": "file", "content": "1"}}"#;
        let tree = VirtualFileTree::from_json(json).unwrap();
        assert!(tree.is_directory("/deep/nested"));
        assert_eq!(tree.read_file("/deep/nested/file.js").unwrap(), "1");
    }

    #[test]
    fn test_replace_and_insert() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/a.js", "const a = 1;\nconst b = 1;").unwrap();
        assert_eq!(tree.replace_in_file("/a.js", "= 1", "= 2").unwrap(), 2);
        assert_eq!(tree.read_file("/a.js").unwrap(), "const a = 2;\nconst b = 2;");
        assert!(tree.replace_in_file("/a.js", "zzz", "y").is_err());

        tree.insert_in_file("/a.js", 1, "// middle").unwrap();
        assert_eq!(
            tree.read_file("/a.js").unwrap(),
            "const a = 2;\n// middle\nconst b = 2;"
        );
        assert!(tree.insert_in_file("/a.js", 10, "x").is_err());
    }

    #[test]
    fn test_view_file_numbers_lines() {
        let mut tree = VirtualFileTree::new();
        tree.create_file("/a.js", "one\ntwo\nthree").unwrap();
        assert_eq!(tree.view_file("/a.js", None).unwrap(), "1\tone\n2\ttwo\n3\tthree");
        assert_eq!(tree.view_file("/a.js", Some((2, 3))).unwrap(), "2\ttwo\n3\tthree");
        assert!(tree.view_file("/a.js", Some((0, 1))).is_err());
    }
}
