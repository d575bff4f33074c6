//! Module linking
//!
//! Walks the import graph from the entry file and produces a resolution map:
//! every tree module becomes an inline module registered under `vfs:{path}`,
//! every package specifier maps to a CDN URL, and every import that cannot be
//! satisfied is pointed at a stub module that throws when evaluated.
//!
//! Nothing here fails. Problems become [`Diagnostic`]s and the pass carries on
//! with the rest of the graph.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::cache::TransformCache;
use crate::classify::{classify, package_url, ImportTarget};
use crate::config::PreviewConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use crate::path;
use crate::styles::{self, CollectedStyle};
use crate::transform::{FileKind, ImportKind, ImportRecord, TransformOutput};
use crate::tree::VirtualFileTree;

pub const MODULE_PREFIX: &str = "vfs:";
pub const MISSING_STUB_PREFIX: &str = "stub:missing";
pub const MALFORMED_STUB_PREFIX: &str = "stub:malformed/";

/// Probed in order after the exact path, then again as `/index.{ext}`.
pub const PROBE_EXTENSIONS: &[&str] = &["jsx", "js", "tsx", "ts", "mjs", "json", "css"];

pub fn module_key(path: &str) -> String {
    format!("{}{}", MODULE_PREFIX, path)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResolutionEntry {
    Inline { code: String },
    External { url: String },
}

/// One tree file that was linked as a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedModule {
    pub path: String,
    pub key: String,
    pub kind: FileKind,
    /// Tree paths this module imports, in import order.
    pub dependencies: Vec<String>,
    /// True when the module was replaced by an error stub.
    pub stubbed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    pub resolution_map: BTreeMap<String, ResolutionEntry>,
    pub entry_module_key: String,
    pub collected_styles: Vec<CollectedStyle>,
    pub diagnostics: Vec<Diagnostic>,
    pub modules: Vec<LinkedModule>,
    /// Every reached tree path (style files included) in discovery order.
    pub reachable: Vec<String>,
}

impl LinkResult {
    pub fn externals(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resolution_map.iter().filter_map(|(k, v)| match v {
            ResolutionEntry::External { url } => Some((k.as_str(), url.as_str())),
            ResolutionEntry::Inline { .. } => None,
        })
    }

    pub fn inline_count(&self) -> usize {
        self.resolution_map
            .values()
            .filter(|v| matches!(v, ResolutionEntry::Inline { .. }))
            .count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// First configured entry candidate that exists as a file.
pub fn find_entry(tree: &VirtualFileTree, config: &PreviewConfig) -> Option<String> {
    config
        .entry_candidates
        .iter()
        .filter_map(|candidate| path::normalize(candidate).ok())
        .find(|candidate| tree.is_file(candidate))
}

/// Resolve a tree path the way an import would: exact, then with each probe
/// extension, then as a directory index.
pub fn resolve_in_tree(tree: &VirtualFileTree, target: &str) -> Option<String> {
    if tree.is_file(target) {
        return Some(target.to_string());
    }
    if target != path::ROOT {
        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}.{}", target, ext);
            if tree.is_file(&candidate) {
                return Some(candidate);
            }
        }
    }
    if tree.is_directory(target) {
        for ext in PROBE_EXTENSIONS {
            let candidate = path::join(target, &format!("index.{}", ext));
            if tree.is_file(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

pub fn link(tree: &VirtualFileTree, entry: &str, config: &PreviewConfig) -> LinkResult {
    let mut cache = TransformCache::new();
    link_with_cache(tree, entry, config, &mut cache)
}

pub fn link_with_cache(
    tree: &VirtualFileTree,
    entry: &str,
    config: &PreviewConfig,
    cache: &mut TransformCache,
) -> LinkResult {
    cache.begin_pass();
    let mut pass = LinkPass {
        tree,
        config,
        cache,
        resolution_map: BTreeMap::new(),
        diagnostics: Vec::new(),
        modules: Vec::new(),
        reachable: Vec::new(),
        visited: HashSet::new(),
    };

    let entry_module_key = match path::normalize(entry) {
        Ok(entry_path) => {
            let key = match resolve_in_tree(tree, &entry_path) {
                Some(resolved) => {
                    // a probed entry (`/App` → `/App.jsx`) is keyed by the file it resolved to
                    let key = module_key(&resolved);
                    pass.walk(resolved);
                    key
                }
                None => {
                    let message = format!("Entry file '{}' does not exist", entry_path);
                    pass.report(Diagnostic::new(
                        DiagnosticKind::MissingModule,
                        &entry_path,
                        message.clone(),
                    ));
                    let key = module_key(&entry_path);
                    pass.resolution_map.insert(key.clone(), stub_entry(&message));
                    key
                }
            };
            // a style entry has nothing to execute
            pass.resolution_map
                .entry(key.clone())
                .or_insert_with(|| ResolutionEntry::Inline {
                    code: "export {};\n".to_string(),
                });
            key
        }
        Err(e) => {
            let message = format!("Entry path is invalid: {}", e);
            pass.report(Diagnostic::new(
                DiagnosticKind::MissingModule,
                entry,
                message.clone(),
            ));
            let key = format!("{}{}", MISSING_STUB_PREFIX, "/");
            pass.resolution_map.insert(key.clone(), stub_entry(&message));
            key
        }
    };

    let collected_styles = styles::aggregate(tree, &pass.reachable);
    pass.cache.end_pass();

    LinkResult {
        resolution_map: pass.resolution_map,
        entry_module_key,
        collected_styles,
        diagnostics: pass.diagnostics,
        modules: pass.modules,
        reachable: pass.reachable,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINK PASS
// ═══════════════════════════════════════════════════════════════════════════════

struct LinkPass<'t, 'c> {
    tree: &'t VirtualFileTree,
    config: &'t PreviewConfig,
    cache: &'c mut TransformCache,
    resolution_map: BTreeMap<String, ResolutionEntry>,
    diagnostics: Vec<Diagnostic>,
    modules: Vec<LinkedModule>,
    reachable: Vec<String>,
    visited: HashSet<String>,
}

impl<'t, 'c> LinkPass<'t, 'c> {
    /// Depth-first, first-discovery order. An explicit stack keeps deep import
    /// chains off the call stack; targets are pushed in reverse so they pop in
    /// import order.
    fn walk(&mut self, start: String) {
        let mut stack = vec![start];
        while let Some(file_path) = stack.pop() {
            if !self.visited.insert(file_path.clone()) {
                continue;
            }
            self.reachable.push(file_path.clone());
            let targets = self.link_file(&file_path);
            stack.extend(targets.into_iter().rev());
        }
    }

    /// Link one file and return the tree paths it imports.
    fn link_file(&mut self, file_path: &str) -> Vec<String> {
        let kind = FileKind::from_path(file_path);
        debug!(path = %file_path, kind = ?kind, "linking module");

        let source = match self.tree.read_file(file_path) {
            Ok(source) => source,
            Err(e) => {
                let message = e.to_string();
                self.report(Diagnostic::new(
                    DiagnosticKind::MissingModule,
                    file_path,
                    message.clone(),
                ));
                self.install_stub(file_path, kind, &message);
                return Vec::new();
            }
        };

        match kind {
            // reachable for style collection only
            FileKind::Style => Vec::new(),
            FileKind::Json => {
                match serde_json::from_str::<serde_json::Value>(source) {
                    Ok(_) => {
                        let code = format!("export default {};\n", source.trim());
                        self.install(file_path, kind, code, Vec::new());
                    }
                    Err(e) => {
                        let message = format!("Invalid JSON: {}", e);
                        self.report(
                            Diagnostic::new(DiagnosticKind::Transform, file_path, message.clone())
                                .at(SourceLocation {
                                    line: e.line() as u32,
                                    column: e.column() as u32,
                                }),
                        );
                        self.install_stub(file_path, kind, &message);
                    }
                }
                Vec::new()
            }
            FileKind::Asset => {
                let code = format!("export default {};\n", json_string(file_path));
                self.install(file_path, kind, code, Vec::new());
                Vec::new()
            }
            _ => match self.cache.transform(file_path, source, &self.config.jsx) {
                Ok(output) => self.link_code(output),
                Err(err) => {
                    let mut diagnostic =
                        Diagnostic::new(DiagnosticKind::Transform, file_path, err.message.clone());
                    if let Some(loc) = err.location() {
                        diagnostic = diagnostic.at(loc);
                    }
                    self.report(diagnostic);
                    self.install_stub(file_path, kind, &err.to_string());
                    Vec::new()
                }
            },
        }
    }

    /// Rewrite the imports of transformed code and register it.
    fn link_code(&mut self, output: TransformOutput) -> Vec<String> {
        let TransformOutput {
            file_path,
            kind,
            code,
            imports,
        } = output;

        let mut replacements: Vec<(u32, u32, String)> = Vec::new();
        let mut targets = Vec::new();

        for record in &imports {
            let target = classify(&file_path, &record.specifier, &self.config.alias_prefix);
            debug!(importer = %file_path, specifier = %record.specifier, target = ?target, "classified import");
            let location = record.source_location;

            match target {
                ImportTarget::Alias { path: wanted } | ImportTarget::Local { path: wanted } => {
                    match resolve_in_tree(self.tree, &wanted) {
                        Some(resolved) => {
                            if FileKind::from_path(&resolved) == FileKind::Style {
                                replacements.push(style_replacement(record));
                            } else {
                                replacements.push(literal_replacement(
                                    record,
                                    &module_key(&resolved),
                                ));
                            }
                            if !targets.contains(&resolved) {
                                targets.push(resolved);
                            }
                        }
                        None => {
                            let message = format!(
                                "Cannot resolve import '{}' (looked for {})",
                                record.specifier, wanted
                            );
                            let mut diagnostic = Diagnostic::new(
                                DiagnosticKind::MissingModule,
                                &file_path,
                                message.clone(),
                            );
                            if let Some(loc) = location {
                                diagnostic = diagnostic.at(loc);
                            }
                            self.report(diagnostic);
                            let stub_key = format!("{}{}", MISSING_STUB_PREFIX, wanted);
                            self.resolution_map
                                .entry(stub_key.clone())
                                .or_insert_with(|| stub_entry(&message));
                            replacements.push(literal_replacement(record, &stub_key));
                        }
                    }
                }
                ImportTarget::Package { name, subpath } => {
                    let url = package_url(&name, subpath.as_deref(), self.config);
                    self.resolution_map
                        .entry(record.specifier.clone())
                        .or_insert(ResolutionEntry::External { url });
                }
                ImportTarget::Malformed { reason } => {
                    let message = format!("Malformed import '{}': {}", record.specifier, reason);
                    let mut diagnostic = Diagnostic::new(
                        DiagnosticKind::MalformedImport,
                        &file_path,
                        message.clone(),
                    );
                    if let Some(loc) = location {
                        diagnostic = diagnostic.at(loc);
                    }
                    self.report(diagnostic);
                    let stub_key = format!("{}{}", MALFORMED_STUB_PREFIX, record.specifier);
                    self.resolution_map
                        .entry(stub_key.clone())
                        .or_insert_with(|| stub_entry(&message));
                    replacements.push(literal_replacement(record, &stub_key));
                }
            }
        }

        let linked = apply_replacements(&code, replacements);
        self.install(&file_path, kind, linked, targets.clone());
        targets
    }

    fn install(&mut self, file_path: &str, kind: FileKind, code: String, dependencies: Vec<String>) {
        let key = module_key(file_path);
        let code = format!("{}\n//# sourceURL={}\n", code.trim_end(), file_path);
        self.resolution_map
            .insert(key.clone(), ResolutionEntry::Inline { code });
        self.modules.push(LinkedModule {
            path: file_path.to_string(),
            key,
            kind,
            dependencies,
            stubbed: false,
        });
    }

    /// The file's own key points at a module that throws `message`.
    fn install_stub(&mut self, file_path: &str, kind: FileKind, message: &str) {
        let key = module_key(file_path);
        self.resolution_map.insert(key.clone(), stub_entry(message));
        self.modules.push(LinkedModule {
            path: file_path.to_string(),
            key,
            kind,
            dependencies: Vec::new(),
            stubbed: true,
        });
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!(path = %diagnostic.file_path, kind = ?diagnostic.kind, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Module that throws as soon as it is evaluated.
pub fn stub_module(message: &str) -> String {
    format!("throw new Error({});\nexport {{}};\n", json_string(message))
}

fn stub_entry(message: &str) -> ResolutionEntry {
    ResolutionEntry::Inline {
        code: stub_module(message),
    }
}

fn literal_replacement(record: &ImportRecord, key: &str) -> (u32, u32, String) {
    (
        record.literal_span.start,
        record.literal_span.end,
        json_string(key),
    )
}

/// Style imports are not modules: static ones disappear, dynamic ones resolve
/// to an empty namespace.
fn style_replacement(record: &ImportRecord) -> (u32, u32, String) {
    let replacement = match record.kind {
        ImportKind::Dynamic => "Promise.resolve({})".to_string(),
        ImportKind::Static | ImportKind::ReExport => String::new(),
    };
    (
        record.statement_span.start,
        record.statement_span.end,
        replacement,
    )
}

/// Apply non-overlapping `(start, end, text)` edits, last first so earlier
/// offsets stay valid.
fn apply_replacements(code: &str, mut replacements: Vec<(u32, u32, String)>) -> String {
    replacements.sort_by(|a, b| b.0.cmp(&a.0));
    let mut result = code.to_string();
    for (start, end, text) in replacements {
        let (start, end) = (start as usize, end as usize);
        if start <= end && end <= result.len() {
            result.replace_range(start..end, &text);
        }
    }
    result
}
