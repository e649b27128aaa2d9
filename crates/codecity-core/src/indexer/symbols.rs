//! Structure and import extraction from source code.
//!
//! Extraction is a pluggable capability: the parse stage only talks to the
//! [`StructureExtractor`] trait. [`RegexExtractor`] is the default, a
//! best-effort line/regex scanner with one pattern set per language family;
//! the tree-sitter backend in `parser.rs` implements the same trait.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ClassSymbol, FileStructure, FunctionSymbol, Language};

/// Import prefixes that point outside the repository.
const EXTERNAL_IMPORT_PREFIXES: &[&str] = &["node_modules", "http", "https"];

/// Per-language structure extraction.
pub trait StructureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Import targets exactly as written in the source.
    fn raw_imports(&self, source: &str, language: Language) -> Vec<String>;

    /// Classes, functions and exports. `comment_density` is left at zero for
    /// the caller to fill.
    fn structure(&self, source: &str, language: Language) -> FileStructure;

    /// Normalised, deduplicated import targets.
    fn imports(&self, source: &str, language: Language) -> Vec<String> {
        normalize_imports(self.raw_imports(source, language))
    }
}

/// Strip relative-path prefixes, drop external references and empties, and
/// deduplicate. The result is sorted.
pub fn normalize_imports<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for import in raw {
        let stripped = import.trim().trim_start_matches(['.', '/']);
        if stripped.is_empty() {
            continue;
        }
        if EXTERNAL_IMPORT_PREFIXES
            .iter()
            .any(|prefix| stripped.starts_with(prefix))
        {
            continue;
        }
        seen.insert(stripped.to_string());
    }
    seen.into_iter().collect()
}

/// 1-based line number of a byte offset.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

// ---------------------------------------------------------------------------
// Compiled regex patterns (LazyLock for one-time init)
// ---------------------------------------------------------------------------

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static extraction pattern")
}

// -- Imports --

static PYTHON_IMPORT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"(?m)^import\s+([\w.]+)"),
        re(r"(?m)^from\s+([\w.]+)\s+import"),
    ]
});

static JS_IMPORT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r#"import\s+.*?\s+from\s+['"]([^"']+)['"]"#),
        re(r#"require\s*\(\s*['"]([^"']+)['"]\s*\)"#),
        re(r#"import\s*\(\s*['"]([^"']+)['"]\s*\)"#),
    ]
});

static TS_IMPORT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r#"import\s+.*?\s+from\s+['"]([^"']+)['"]"#),
        re(r#"require\s*\(\s*['"]([^"']+)['"]\s*\)"#),
    ]
});

static JAVA_IMPORT_RES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![re(r"(?m)^import\s+([\w.]+);")]);

static GO_IMPORT_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r#"^\s*import\s+(?:[A-Za-z_.]+\s+)?"([^"]+)""#));

static GO_IMPORT_BLOCK_START_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*import\s*\("));

static GO_IMPORT_BLOCK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r#"^\s*(?:[A-Za-z_.]+\s+)?"([^"]+)""#));

// -- Classes --

static PYTHON_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"class\s+(\w+)\s*(?:\(([^)]*)\))?:"));

static SCRIPT_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"class\s+(\w+)\s*(?:extends\s+(\w+))?\s*\{"));

static JAVA_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"class\s+(\w+)\s*(?:extends\s+(\w+))?\s*(?:implements\s+[^{]+)?\s*\{")
});

static GO_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?m)^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)\s+struct\b"));

// -- Functions --

static PYTHON_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?:async\s+)?def\s+(\w+)\s*\("));

static SCRIPT_FUNCTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"function\s+(\w+)\s*\("),
        re(r"(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\("),
        re(r"(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?function"),
    ]
});

static JAVA_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?:public|private|protected|static)\s+(?:[\w<>\[\]]+\s+)*?(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w,\s]+)?\s*\{")
});

static GO_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"func\s+(?:\([^)]*\)\s*)?(\w+)\s*\("));

// -- Exports --

static SCRIPT_DEFAULT_EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"export\s+default\s+(?:class|function)?\s*(\w+)?"));

static SCRIPT_NAMED_EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"export\s+(?:const|let|var|function|class)\s+(\w+)"));

static PYTHON_ALL_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)__all__\s*=\s*\[(.*?)\]"));

static QUOTED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| re(r#"['"](\w+)['"]"#));

// ---------------------------------------------------------------------------
// Regex extractor
// ---------------------------------------------------------------------------

/// Language families sharing one pattern set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Python,
    Javascript,
    Typescript,
    Java,
    Go,
    Other,
}

impl Family {
    fn of(language: Language) -> Self {
        match language {
            Language::Python => Family::Python,
            Language::Javascript => Family::Javascript,
            Language::Typescript => Family::Typescript,
            Language::Java => Family::Java,
            Language::Go => Family::Go,
            _ => Family::Other,
        }
    }
}

/// Regex-based extractor; languages without a pattern set yield nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

fn capture_all(patterns: &[Regex], source: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|re| {
            re.captures_iter(source)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        })
        .collect()
}

/// Go imports: single-line forms plus every entry of `import ( ... )` blocks.
fn go_imports(source: &str) -> Vec<String> {
    let mut imports = Vec::new();
    let mut in_block = false;
    for line in source.lines() {
        if in_block {
            if line.trim_start().starts_with(')') {
                in_block = false;
                continue;
            }
            if let Some(caps) = GO_IMPORT_BLOCK_LINE_RE.captures(line) {
                imports.push(caps[1].to_string());
            }
            continue;
        }
        if GO_IMPORT_BLOCK_START_RE.is_match(line) {
            in_block = true;
            // `import ("fmt")` on one line
            if let Some(rest) = line.split_once('(').map(|(_, r)| r) {
                if let Some(caps) = GO_IMPORT_BLOCK_LINE_RE.captures(rest) {
                    imports.push(caps[1].to_string());
                }
                if rest.contains(')') {
                    in_block = false;
                }
            }
            continue;
        }
        if let Some(caps) = GO_IMPORT_SINGLE_RE.captures(line) {
            imports.push(caps[1].to_string());
        }
    }
    imports
}

fn classes_with(re: &Regex, source: &str) -> Vec<ClassSymbol> {
    re.captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_string();
            let base = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|b| !b.is_empty());
            Some(ClassSymbol {
                name,
                base,
                line: line_of(source, whole.start()),
            })
        })
        .collect()
}

fn functions_with(patterns: &[&Regex], source: &str) -> Vec<FunctionSymbol> {
    let mut functions: Vec<FunctionSymbol> = patterns
        .iter()
        .flat_map(|re| {
            re.captures_iter(source).filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(FunctionSymbol {
                    name: caps.get(1)?.as_str().to_string(),
                    line: line_of(source, whole.start()),
                })
            })
        })
        .collect();
    functions.sort_by_key(|f| f.line);
    functions
}

fn exports(source: &str, family: Family) -> Vec<String> {
    let mut exports = Vec::new();
    match family {
        Family::Javascript | Family::Typescript => {
            if let Some(name) = SCRIPT_DEFAULT_EXPORT_RE
                .captures(source)
                .and_then(|caps| caps.get(1))
            {
                exports.push(name.as_str().to_string());
            }
            exports.extend(
                SCRIPT_NAMED_EXPORT_RE
                    .captures_iter(source)
                    .map(|caps| caps[1].to_string()),
            );
        }
        Family::Python => {
            if let Some(body) = PYTHON_ALL_RE.captures(source).and_then(|caps| caps.get(1)) {
                exports.extend(
                    QUOTED_NAME_RE
                        .captures_iter(body.as_str())
                        .map(|caps| caps[1].to_string()),
                );
            }
        }
        _ => {}
    }
    exports
}

impl RegexExtractor {
    pub(crate) fn exports(&self, source: &str, language: Language) -> Vec<String> {
        exports(source, Family::of(language))
    }
}

impl StructureExtractor for RegexExtractor {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn raw_imports(&self, source: &str, language: Language) -> Vec<String> {
        match Family::of(language) {
            Family::Python => capture_all(&PYTHON_IMPORT_RES, source),
            Family::Javascript => capture_all(&JS_IMPORT_RES, source),
            Family::Typescript => capture_all(&TS_IMPORT_RES, source),
            Family::Java => capture_all(&JAVA_IMPORT_RES, source),
            Family::Go => go_imports(source),
            Family::Other => Vec::new(),
        }
    }

    fn structure(&self, source: &str, language: Language) -> FileStructure {
        let family = Family::of(language);
        let classes = match family {
            Family::Python => classes_with(&PYTHON_CLASS_RE, source),
            Family::Javascript | Family::Typescript => classes_with(&SCRIPT_CLASS_RE, source),
            Family::Java => classes_with(&JAVA_CLASS_RE, source),
            Family::Go => classes_with(&GO_TYPE_RE, source),
            Family::Other => Vec::new(),
        };
        let functions = match family {
            Family::Python => functions_with(&[&*PYTHON_FUNCTION_RE], source),
            Family::Javascript | Family::Typescript => {
                let patterns: Vec<&Regex> = SCRIPT_FUNCTION_RES.iter().collect();
                functions_with(&patterns, source)
            }
            Family::Java => functions_with(&[&*JAVA_METHOD_RE], source),
            Family::Go => functions_with(&[&*GO_FUNCTION_RE], source),
            Family::Other => Vec::new(),
        };
        FileStructure {
            classes,
            functions,
            exports: exports(source, family),
            comment_density: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
