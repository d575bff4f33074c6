//! Preview assembly
//!
//! Turns a link pass into one self-contained HTML document: collected styles,
//! an import map that points every module key at a loadable URL, a mount node,
//! an error surface and a bootstrap module that starts the entry.
//!
//! Inline modules are turned into URLs by a [`ResourceHost`]. The assembler owns
//! every URL it created and revokes the whole previous generation before the
//! next pass installs its own.

use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::cache::TransformCache;
use crate::classify::package_url;
use crate::config::{MountMode, PreviewConfig};
use crate::diagnostics::Diagnostic;
use crate::linker::{self, LinkResult, ResolutionEntry};
use crate::styles;
use crate::tree::VirtualFileTree;

pub const ERROR_SURFACE_ID: &str = "preview-errors";
pub const RUNTIME_ERROR_ID: &str = "preview-runtime-error";

/// Packages the React bootstrap imports on its own.
const REACT_BOOTSTRAP_PACKAGES: &[(&str, &str, Option<&str>)] = &[
    ("react", "react", None),
    ("react-dom/client", "react-dom", Some("client")),
];

// ═══════════════════════════════════════════════════════════════════════════════
// RESOURCE HOSTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of loadable URLs for generated module text.
pub trait ResourceHost {
    fn create_module_url(&mut self, key: &str, code: &str) -> String;
    fn revoke(&mut self, url: &str);
}

/// Self-contained `data:` URLs. Nothing to release, so `revoke` is a no-op.
#[derive(Debug, Default, Clone)]
pub struct DataUrlHost;

impl DataUrlHost {
    pub fn encode(code: &str) -> String {
        format!(
            "data:text/javascript;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(code.as_bytes())
        )
    }
}

impl ResourceHost for DataUrlHost {
    fn create_module_url(&mut self, _key: &str, code: &str) -> String {
        Self::encode(code)
    }

    fn revoke(&mut self, _url: &str) {}
}

/// `blob:` URLs backed by `URL.createObjectURL`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone)]
pub struct BlobUrlHost;

#[cfg(target_arch = "wasm32")]
impl ResourceHost for BlobUrlHost {
    fn create_module_url(&mut self, key: &str, code: &str) -> String {
        let parts = js_sys::Array::new();
        parts.push(&wasm_bindgen::JsValue::from_str(code));
        let options = web_sys::BlobPropertyBag::new();
        options.set_type("text/javascript");
        let url = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)
            .and_then(|blob| web_sys::Url::create_object_url_with_blob(&blob));
        match url {
            Ok(url) => url,
            Err(_) => {
                tracing::warn!(key = %key, "object URL creation failed, using data URL");
                DataUrlHost::encode(code)
            }
        }
    }

    fn revoke(&mut self, url: &str) {
        if url.starts_with("blob:") {
            let _ = web_sys::Url::revoke_object_url(url);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledPreview {
    pub html: String,
    pub import_map: BTreeMap<String, String>,
    pub entry_module_key: String,
    pub diagnostics: Vec<Diagnostic>,
    pub resource_urls: Vec<String>,
}

pub struct PreviewAssembler<H: ResourceHost> {
    host: H,
    config: PreviewConfig,
    cache: TransformCache,
    live_urls: Vec<String>,
}

impl PreviewAssembler<DataUrlHost> {
    pub fn with_data_urls(config: PreviewConfig) -> Self {
        Self::new(DataUrlHost, config)
    }
}

impl<H: ResourceHost> PreviewAssembler<H> {
    pub fn new(host: H, config: PreviewConfig) -> Self {
        Self {
            host,
            config,
            cache: TransformCache::new(),
            live_urls: Vec::new(),
        }
    }

    /// URLs created by the most recent pass and not yet revoked.
    pub fn live_urls(&self) -> &[String] {
        &self.live_urls
    }

    /// Entry used when the caller does not name one.
    pub fn default_entry(&self, tree: &VirtualFileTree) -> String {
        linker::find_entry(tree, &self.config).unwrap_or_else(|| {
            self.config
                .entry_candidates
                .first()
                .cloned()
                .unwrap_or_else(|| "/App.jsx".to_string())
        })
    }

    /// Full relink of `tree` from `entry` into a fresh document.
    pub fn assemble(&mut self, tree: &VirtualFileTree, entry: Option<&str>) -> AssembledPreview {
        let entry = match entry {
            Some(entry) => entry.to_string(),
            None => self.default_entry(tree),
        };
        let link = linker::link_with_cache(tree, &entry, &self.config, &mut self.cache);

        let revoked = self.revoke_all();

        let mut import_map = BTreeMap::new();
        for (key, resolution) in &link.resolution_map {
            let url = match resolution {
                ResolutionEntry::Inline { code } => {
                    let url = self.host.create_module_url(key, code);
                    self.live_urls.push(url.clone());
                    url
                }
                ResolutionEntry::External { url } => url.clone(),
            };
            import_map.insert(key.clone(), url);
        }
        if self.config.mount == MountMode::React {
            for (specifier, name, subpath) in REACT_BOOTSTRAP_PACKAGES {
                import_map
                    .entry(specifier.to_string())
                    .or_insert_with(|| package_url(name, *subpath, &self.config));
            }
        }

        let html = render_document(&link, &import_map, &self.config);

        info!(
            entry = %entry,
            modules = link.inline_count(),
            externals = link.externals().count(),
            diagnostics = link.diagnostics.len(),
            revoked,
            "assembled preview"
        );

        AssembledPreview {
            html,
            import_map,
            entry_module_key: link.entry_module_key,
            diagnostics: link.diagnostics,
            resource_urls: self.live_urls.clone(),
        }
    }

    /// Release every URL of the current generation. Returns how many were revoked.
    pub fn revoke_all(&mut self) -> usize {
        let urls = std::mem::take(&mut self.live_urls);
        for url in &urls {
            self.host.revoke(url);
        }
        if !urls.is_empty() {
            debug!(count = urls.len(), "revoked module URLs");
        }
        urls.len()
    }
}

impl<H: ResourceHost> Drop for PreviewAssembler<H> {
    fn drop(&mut self) {
        self.revoke_all();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn render_document(
    link: &LinkResult,
    import_map: &BTreeMap<String, String>,
    config: &PreviewConfig,
) -> String {
    let css = styles::concatenate(&link.collected_styles).replace("</style", "<\\/style");
    let import_map_json = serde_json::json!({ "imports": import_map });
    let import_map_text = serde_json::to_string_pretty(&import_map_json)
        .unwrap_or_else(|_| "{\"imports\":{}}".to_string())
        .replace("</", "<\\/");

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\" />\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\" />\n",
    );
    html.push_str(&format!("<title>{}</title>\n", escape_html(&config.title)));
    html.push_str(&format!("<style>\n{}\n</style>\n", css));
    html.push_str(&format!(
        "<script type=\"importmap\">\n{}\n</script>\n",
        import_map_text
    ));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<div id=\"{}\"></div>\n",
        escape_html(&config.root_id)
    ));
    html.push_str(&render_error_surface(&link.diagnostics));
    html.push_str(&format!(
        "<pre id=\"{}\" hidden style=\"{}\"></pre>\n",
        RUNTIME_ERROR_ID, ERROR_STYLE
    ));

    let halted = config.halt_on_diagnostics && !link.diagnostics.is_empty();
    if !halted {
        html.push_str(&format!(
            "<script type=\"module\">\n{}\n</script>\n",
            bootstrap_script(&link.entry_module_key, config)
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

const ERROR_STYLE: &str = "margin:16px;padding:12px 16px;border:1px solid #f5a3a3;border-radius:6px;background:#fff5f5;color:#8a1f1f;font:13px/1.5 ui-monospace,monospace;white-space:pre-wrap";

/// Listing of every diagnostic, or nothing when the pass was clean.
pub fn render_error_surface(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "<div id=\"{}\" role=\"alert\" style=\"{}\">\n<strong>{} problem{} found</strong>\n<ul>\n",
        ERROR_SURFACE_ID,
        ERROR_STYLE,
        diagnostics.len(),
        if diagnostics.len() == 1 { "" } else { "s" }
    );
    for diagnostic in diagnostics {
        out.push_str(&format!(
            "<li><code>{}</code> {}: {}</li>\n",
            escape_html(&diagnostic.position()),
            diagnostic.kind.label(),
            escape_html(&diagnostic.message)
        ));
    }
    out.push_str("</ul>\n</div>\n");
    out
}

fn bootstrap_script(entry_module_key: &str, config: &PreviewConfig) -> String {
    let entry = js_string(entry_module_key);
    let runtime_error_id = js_string(RUNTIME_ERROR_ID);
    let show_error = format!(
        r#"const showError = (err) => {{
  const el = document.getElementById({});
  if (!el) return;
  el.hidden = false;
  el.textContent = (err && err.stack) ? String(err.stack) : String(err);
}};
window.addEventListener("error", (e) => showError(e.error || e.message));
window.addEventListener("unhandledrejection", (e) => showError(e.reason));"#,
        runtime_error_id
    );

    let start = match config.mount {
        MountMode::React => format!(
            r#"try {{
  const mod = await import({entry});
  const [React, ReactDOM] = await Promise.all([import("react"), import("react-dom/client")]);
  const Component = mod.default;
  if (typeof Component !== "function" && typeof Component !== "object") {{
    throw new Error("The entry module has no default export to render");
  }}
  const root = document.getElementById({root});
  ReactDOM.createRoot(root).render(React.createElement(Component));
}} catch (err) {{
  showError(err);
}}"#,
            entry = entry,
            root = js_string(&config.root_id)
        ),
        MountMode::None => format!(
            r#"try {{
  await import({entry});
}} catch (err) {{
  showError(err);
}}"#,
            entry = entry
        ),
    };

    format!("{}\n{}", show_error, start)
}

/// JSON string literal that is also safe inside a `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\"', "&quot;")
        .replace('\'', "&#39;")
}
