use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSX lowering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    /// `_jsx`/`_jsxs` imported from `{import_source}/jsx-runtime`.
    #[default]
    Automatic,
    /// `pragma(type, props, ...children)`.
    Classic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsxConfig {
    pub runtime: JsxRuntime,
    pub import_source: String,
    pub pragma: String,
    pub pragma_frag: String,
}

impl Default for JsxConfig {
    fn default() -> Self {
        Self {
            runtime: JsxRuntime::Automatic,
            import_source: "react".to_string(),
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
        }
    }
}

impl JsxConfig {
    /// Stable text form, folded into transform cache keys.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:?}|{}|{}|{}",
            self.runtime, self.import_source, self.pragma, self.pragma_frag
        )
    }
}

/// How the bootstrap script starts the entry module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Render the entry's default export with `react-dom/client`.
    #[default]
    React,
    /// Import the entry for its side effects only.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    /// Specifier prefix that stands for the tree root.
    pub alias_prefix: String,
    /// Probed in order when no entry path is given.
    pub entry_candidates: Vec<String>,
    /// Base URL for package specifiers.
    pub package_cdn: String,
    /// Version pins, by package name.
    pub package_versions: BTreeMap<String, String>,
    pub jsx: JsxConfig,
    pub mount: MountMode,
    pub root_id: String,
    /// Skip running the entry when the link pass produced diagnostics.
    pub halt_on_diagnostics: bool,
    pub title: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            alias_prefix: "@/".to_string(),
            entry_candidates: [
                "/App.jsx",
                "/App.tsx",
                "/App.js",
                "/App.ts",
                "/index.jsx",
                "/index.tsx",
                "/index.js",
                "/src/App.jsx",
                "/src/App.tsx",
                "/src/App.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            package_cdn: "https://esm.sh".to_string(),
            package_versions: BTreeMap::new(),
            jsx: JsxConfig::default(),
            mount: MountMode::React,
            root_id: "root".to_string(),
            halt_on_diagnostics: false,
            title: "Preview".to_string(),
        }
    }
}

impl PreviewConfig {
    /// Parse a (possibly partial) JSON config. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}
