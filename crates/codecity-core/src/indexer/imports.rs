//! Import resolution from normalised import strings to repository file ids.
//!
//! Every file is addressable by several keys (bare name, file name, dotted
//! module path, last segment). Resolution walks the configured
//! [`ResolutionStrategy`] list in order and stops at the first hit.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::{ResolutionStrategy, ResolverConfig, SuffixMode};

/// Source extensions tried by the extension-augmented strategy.
const RESOLVABLE_EXTENSIONS: &[&str] = &[".py", ".js", ".ts", ".jsx", ".tsx"];

fn strip_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(0) | None => segment,
        Some(idx) => &segment[..idx],
    }
}

/// `src/utils/helper.py` -> `src.utils.helper`.
pub fn module_path(file_id: &str) -> String {
    file_id
        .split('/')
        .map(strip_extension)
        .collect::<Vec<_>>()
        .join(".")
}

/// Collapse `.` and `..` segments of a `/`-separated path.
pub fn normalize_posix_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }
    stack.join("/")
}

/// Lookup keys for one file id, in insertion order.
fn index_keys(file_id: &str) -> Vec<String> {
    let name = file_id.rsplit('/').next().unwrap_or(file_id);
    vec![
        strip_extension(name).to_string(),
        name.to_string(),
        module_path(file_id),
    ]
}

/// Name -> file id index plus the ordered resolution strategies.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    index: IndexMap<String, String>,
    file_ids: HashSet<String>,
    strategies: Vec<ResolutionStrategy>,
}

impl ImportResolver {
    /// Build the index over `file_ids`. On key collision the later file wins.
    pub fn new<'a, I>(file_ids: I, config: &ResolverConfig) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = IndexMap::new();
        let mut ids = HashSet::new();
        for file_id in file_ids {
            for key in index_keys(file_id) {
                index.insert(key, file_id.to_string());
            }
            ids.insert(file_id.to_string());
        }
        Self {
            index,
            file_ids: ids,
            strategies: config.strategies.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Resolve `import` as written in `source_id`. Self-references are
    /// reported as unresolved.
    pub fn resolve(&self, import: &str, source_id: &str) -> Option<&str> {
        if import.is_empty() {
            return None;
        }
        self.strategies
            .iter()
            .find_map(|strategy| match strategy {
                ResolutionStrategy::Exact => self.exact(import),
                ResolutionStrategy::ExtensionAugmented => self.extension_augmented(import),
                ResolutionStrategy::Relative => self.relative(import, source_id),
                ResolutionStrategy::SuffixScan(mode) => self.suffix_scan(import, *mode),
            })
            .filter(|target| *target != source_id)
    }

    fn exact(&self, import: &str) -> Option<&str> {
        self.index.get(import).map(String::as_str)
    }

    fn extension_augmented(&self, import: &str) -> Option<&str> {
        RESOLVABLE_EXTENSIONS
            .iter()
            .find_map(|ext| self.exact(&format!("{import}{ext}")))
    }

    fn relative(&self, import: &str, source_id: &str) -> Option<&str> {
        if !import.starts_with('.') {
            return None;
        }
        let source_dir = Path::new(source_id)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let joined = normalize_posix_path(&format!("{source_dir}/{import}"));
        if let Some(hit) = self.exact(&joined) {
            return Some(hit);
        }
        std::iter::once(String::new())
            .chain(RESOLVABLE_EXTENSIONS.iter().map(|e| (*e).to_string()))
            .map(|ext| format!("{joined}{ext}"))
            .find_map(|candidate| self.file_ids.get(&candidate).map(String::as_str))
    }

    fn suffix_scan(&self, import: &str, mode: SuffixMode) -> Option<&str> {
        let mut matches = self
            .index
            .iter()
            .filter(|(key, file_id)| key.ends_with(import) || file_id.ends_with(import))
            .map(|(_, file_id)| file_id.as_str());
        match mode {
            SuffixMode::FirstMatch => matches.next(),
            SuffixMode::ShortestMatch => {
                matches.min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            }
        }
    }
}
