use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::JsxConfig;
use crate::transform::{transform_file, TransformError, TransformOutput};

type CachedTransform = Result<TransformOutput, TransformError>;

/// In-memory per-file transform cache.
///
/// Entries are keyed by a hash of the path, the content and the JSX settings,
/// so an edit, a rename or a runtime switch all miss. Linking is still done in
/// full on every pass; only the per-file transform is reused.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: HashMap<String, CachedTransform>,
    touched: HashSet<String>,
    hits: u64,
    misses: u64,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(file_path: &str, source: &str, jsx: &JsxConfig) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(jsx.fingerprint().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&mut self, file_path: &str, source: &str, jsx: &JsxConfig) -> Option<CachedTransform> {
        let key = Self::compute_hash(file_path, source, jsx);
        let found = self.entries.get(&key).cloned();
        self.touched.insert(key);
        if found.is_some() {
            self.hits += 1;
            debug!(path = %file_path, "transform cache hit");
        } else {
            self.misses += 1;
        }
        found
    }

    pub fn set(&mut self, file_path: &str, source: &str, jsx: &JsxConfig, result: CachedTransform) {
        let key = Self::compute_hash(file_path, source, jsx);
        self.touched.insert(key.clone());
        self.entries.insert(key, result);
    }

    /// Transform through the cache.
    pub fn transform(&mut self, file_path: &str, source: &str, jsx: &JsxConfig) -> CachedTransform {
        if let Some(cached) = self.get(file_path, source, jsx) {
            return cached;
        }
        let result = transform_file(file_path, source, jsx);
        self.set(file_path, source, jsx, result.clone());
        result
    }

    pub fn begin_pass(&mut self) {
        self.touched.clear();
    }

    /// Drop every entry the pass did not use, so edited files do not pile up.
    pub fn end_pass(&mut self) {
        let touched = &self.touched;
        self.entries.retain(|key, _| touched.contains(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.touched.clear();
    }
}
