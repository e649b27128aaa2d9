//! Filesystem discovery for analysis passes.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::Language;

const LANGUAGE_BY_EXTENSION: &[(&str, Language)] = &[
    (".py", Language::Python),
    (".js", Language::Javascript),
    (".jsx", Language::Javascript),
    (".ts", Language::Typescript),
    (".tsx", Language::Typescript),
    (".java", Language::Java),
    (".go", Language::Go),
    (".rs", Language::Rust),
    (".cpp", Language::Cpp),
    (".c", Language::C),
    (".cc", Language::Cpp),
    (".h", Language::C),
    (".hpp", Language::Cpp),
    (".rb", Language::Ruby),
    (".php", Language::Php),
    (".swift", Language::Swift),
    (".kt", Language::Kotlin),
    (".scala", Language::Scala),
    (".cs", Language::Csharp),
];

/// Directory names (lowercased) never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    "env",
    ".venv",
    "dist",
    "build",
    ".next",
    "target",
    "vendor",
    ".idea",
    ".vscode",
    "coverage",
    ".pytest_cache",
    "bower_components",
    ".cache",
    ".npm",
    ".yarn",
    "packages",
    ".tox",
    "htmlcov",
    "eggs",
    ".eggs",
    "lib",
    "libs",
    "third_party",
    "3rdparty",
    "external",
    "doc",
    "docs",
    "documentation",
    "examples",
    "samples",
    "test",
    "tests",
    "testing",
    "__tests__",
    "spec",
    "specs",
    "benchmark",
    "benchmarks",
    "fixtures",
];

const SKIPPED_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
];

const HIDDEN_MARKER: char = '.';

pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))?;
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext.as_str())
        .map(|(_, lang)| *lang)
}

/// All extensions the discovery pass accepts, with their leading dot.
pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
    LANGUAGE_BY_EXTENSION.iter().map(|(ext, _)| *ext)
}

fn is_skipped_dir(name: &str) -> bool {
    let lowered = name.to_lowercase();
    SKIPPED_DIRS.contains(&lowered.as_str())
}

/// Root-relative, `/`-separated identifier for a discovered path.
pub fn relative_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Walk `root` with an explicit stack and return at most `max_files`
/// candidate source files.
///
/// Hidden entries, excluded directories, lockfiles, unsupported extensions
/// and files of `max_file_bytes` or more are skipped. Unreadable directories
/// are skipped along with their subtree. When the cap binds, which files are
/// kept depends on traversal order.
pub fn discover_files(root: &Path, max_files: usize, max_file_bytes: u64) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if files.len() >= max_files {
            break;
        }
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable directory {}: {e}", dir.display());
                continue;
            }
        };

        for entry in entries.flatten() {
            if files.len() >= max_files {
                break;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(HIDDEN_MARKER) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                if !is_skipped_dir(&name) {
                    stack.push(entry.path());
                }
            } else if file_type.is_file() {
                if SKIPPED_FILES.contains(&name.as_str()) {
                    continue;
                }
                let path = entry.path();
                if detect_language(&path).is_none() {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) if meta.len() < max_file_bytes => files.push(path),
                    Ok(_) => debug!("Skipping oversized file {}", path.display()),
                    Err(_) => {}
                }
            }
        }
    }

    files
}
