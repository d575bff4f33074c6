//! JSON bridge for the host application.
//!
//! Every entry point takes and returns JSON text. The `_json` functions are
//! plain Rust; the `_native` wrappers expose them over Node-API.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::Serialize;
use serde_json::json;

use crate::classify::classify;
use crate::command::{dispatch_json, CommandOutcome};
use crate::config::PreviewConfig;
use crate::linker;
use crate::path;
use crate::preview::PreviewAssembler;
use crate::tree::VirtualFileTree;

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

fn load(snapshot_json: &str, config_json: &str) -> Result<(VirtualFileTree, PreviewConfig), String> {
    let tree = VirtualFileTree::from_json(snapshot_json).map_err(|e| e.to_string())?;
    let config =
        PreviewConfig::from_json(config_json).map_err(|e| format!("Config parse error: {}", e))?;
    Ok((tree, config))
}

fn non_empty(entry: Option<String>) -> Option<String> {
    entry.filter(|e| !e.trim().is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot + config → assembled preview (data: URL modules).
pub fn render_preview_json(
    snapshot_json: &str,
    config_json: &str,
    entry: Option<String>,
) -> Result<String, String> {
    let (tree, config) = load(snapshot_json, config_json)?;
    let mut assembler = PreviewAssembler::with_data_urls(config);
    let preview = assembler.assemble(&tree, non_empty(entry).as_deref());
    to_json(&preview)
}

/// Snapshot + config → raw link result.
pub fn link_snapshot_json(
    snapshot_json: &str,
    config_json: &str,
    entry: Option<String>,
) -> Result<String, String> {
    let (tree, config) = load(snapshot_json, config_json)?;
    let entry = non_empty(entry)
        .or_else(|| linker::find_entry(&tree, &config))
        .unwrap_or_else(|| "/App.jsx".to_string());
    to_json(&linker::link(&tree, &entry, &config))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    outcome: CommandOutcome,
    snapshot: serde_json::Value,
}

/// Apply one command to a snapshot; returns the outcome and the new snapshot.
pub fn apply_command_json(snapshot_json: &str, command_json: &str) -> Result<String, String> {
    let mut tree = VirtualFileTree::from_json(snapshot_json).map_err(|e| e.to_string())?;
    let outcome = dispatch_json(&mut tree, command_json);
    let snapshot = serde_json::to_value(tree.serialize())
        .map_err(|e| format!("Serialization error: {}", e))?;
    to_json(&CommandResponse { outcome, snapshot })
}

pub fn normalize_path_json(path_str: &str) -> String {
    match path::normalize(path_str) {
        Ok(normalized) => json!({ "ok": true, "path": normalized }).to_string(),
        Err(e) => json!({ "ok": false, "error": e.report() }).to_string(),
    }
}

pub fn classify_import_json(importer: &str, specifier: &str, alias_prefix: Option<String>) -> String {
    let alias = alias_prefix.unwrap_or_else(|| PreviewConfig::default().alias_prefix);
    let target = classify(importer, specifier, &alias);
    serde_json::to_string(&target).unwrap_or_else(|_| "null".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn render_preview_native(
    snapshot_json: String,
    config_json: String,
    entry: Option<String>,
) -> napi::Result<String> {
    render_preview_json(&snapshot_json, &config_json, entry).map_err(napi::Error::from_reason)
}

#[cfg(feature = "napi")]
#[napi]
pub fn link_snapshot_native(
    snapshot_json: String,
    config_json: String,
    entry: Option<String>,
) -> napi::Result<String> {
    link_snapshot_json(&snapshot_json, &config_json, entry).map_err(napi::Error::from_reason)
}

#[cfg(feature = "napi")]
#[napi]
pub fn apply_command_native(snapshot_json: String, command_json: String) -> napi::Result<String> {
    apply_command_json(&snapshot_json, &command_json).map_err(napi::Error::from_reason)
}

#[cfg(feature = "napi")]
#[napi]
pub fn normalize_path_native(path_str: String) -> String {
    normalize_path_json(&path_str)
}

#[cfg(feature = "napi")]
#[napi]
pub fn classify_import_native(
    importer: String,
    specifier: String,
    alias_prefix: Option<String>,
) -> String {
    classify_import_json(&importer, &specifier, alias_prefix)
}
