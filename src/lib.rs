//! # Preview Native
//!
//! In-memory file tree plus a transform-and-link pipeline that turns the tree
//! into a runnable browser preview with no bundling step.
//!
//! ## Pipeline
//!
//! 1. **Tree**: `VirtualFileTree` holds normalized paths. All mutation goes
//!    through its API or the closed `TreeCommand` set.
//! 2. **Transform**: each reachable file is parsed with oxc; JSX is lowered
//!    to runtime calls and TypeScript is stripped.
//! 3. **Link**: imports are classified (alias, local, package, malformed) and
//!    rewritten to module keys (`vfs:/path`), producing a resolution map.
//! 4. **Assemble**: the map becomes an import map of module URLs inside one
//!    HTML document, together with collected styles and an error surface.
//!
//! ## Failure model
//!
//! Tree operations return `TreeError` and never partially apply. Link-time
//! problems never abort a pass: each becomes a `Diagnostic` and degrades a
//! single module to a stub that throws when evaluated.

mod bindings;
mod cache;
mod classify;
mod command;
mod config;
mod diagnostics;
mod error;
mod jsx_lowerer;
mod linker;
mod path;
mod preview;
mod styles;
mod transform;
mod tree;

#[cfg(test)]
mod linker_tests;

pub use bindings::{
    apply_command_json, classify_import_json, link_snapshot_json, normalize_path_json,
    render_preview_json,
};
#[cfg(feature = "napi")]
pub use bindings::{
    apply_command_native, classify_import_native, link_snapshot_native, normalize_path_native,
    render_preview_native,
};
pub use cache::TransformCache;
pub use classify::{classify, package_url, ImportTarget};
pub use command::{dispatch, dispatch_json, CommandOutcome, TreeCommand};
pub use config::{JsxConfig, JsxRuntime, MountMode, PreviewConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
pub use error::{ErrorReport, TreeError};
pub use linker::{
    find_entry, link, link_with_cache, module_key, resolve_in_tree, LinkResult, LinkedModule,
    ResolutionEntry,
};
pub use path::{normalize, resolve_alias, resolve_relative};
pub use preview::{escape_html, AssembledPreview, DataUrlHost, PreviewAssembler, ResourceHost};
#[cfg(target_arch = "wasm32")]
pub use preview::BlobUrlHost;
pub use styles::CollectedStyle;
pub use transform::{
    transform_file, FileKind, ImportKind, ImportRecord, TextSpan, TransformError, TransformOutput,
};
pub use tree::{DirEntry, FsNode, NodeKind, SerializedNode, Snapshot, VirtualFileTree};

#[cfg(feature = "napi")]
use napi_derive::napi;

#[cfg(feature = "napi")]
#[napi]
pub fn preview_bridge() -> String {
    "Preview Native Bridge Connected".to_string()
}
