//! Per-file structural and activity metrics.

use std::path::Path;
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use regex::Regex;

use crate::indexer::history::VersionControl;
use crate::models::Language;

const SECONDS_PER_DAY: i64 = 86_400;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static decision pattern"))
        .collect()
}

static PYTHON_DECISIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bif\b",
        r"\belif\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\band\b",
        r"\bor\b",
        r"\bexcept\b",
        r"\bwith\b",
    ])
});

static SCRIPT_DECISIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bif\b",
        r"\belse\s+if\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bcase\b",
        r"\bcatch\b",
        r"\b\?\b",
        r"&&",
        r"\|\|",
    ])
});

static JAVA_DECISIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bif\b",
        r"\belse\s+if\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bcase\b",
        r"\bcatch\b",
        r"&&",
        r"\|\|",
    ])
});

static GO_DECISIONS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"\bif\b", r"\bfor\b", r"\bcase\b", r"&&", r"\|\|"]));

fn decision_patterns(language: Language) -> &'static [Regex] {
    match language {
        Language::Javascript | Language::Typescript => &SCRIPT_DECISIONS,
        Language::Java => &JAVA_DECISIONS,
        Language::Go => &GO_DECISIONS,
        // Python's set is the reference for everything else.
        _ => &PYTHON_DECISIONS,
    }
}

/// One plus the number of decision points found in `content`.
pub fn cyclomatic_complexity(content: &str, language: Language) -> u32 {
    let decisions: usize = decision_patterns(language)
        .iter()
        .map(|re| re.find_iter(content).count())
        .sum();
    1 + u32::try_from(decisions).unwrap_or(u32::MAX - 1)
}

/// Newline-delimited line count; an empty file counts as one line.
pub fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

fn uses_c_style_comments(language: Language) -> bool {
    matches!(
        language,
        Language::Javascript
            | Language::Typescript
            | Language::Java
            | Language::Go
            | Language::Cpp
            | Language::C
            | Language::Rust
            | Language::Csharp
            | Language::Kotlin
            | Language::Swift
            | Language::Scala
    )
}

/// Ratio of comment lines to total lines.
pub fn comment_density(content: &str, language: Language) -> f64 {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();
    if total == 0 {
        return 0.0;
    }

    let mut comment_lines = 0usize;
    let mut in_block = false;

    for line in lines {
        let stripped = line.trim();
        if language == Language::Python {
            if stripped.starts_with('#') {
                comment_lines += 1;
            } else if stripped.starts_with("\"\"\"") || stripped.starts_with("'''") {
                // A docstring opened and closed on one line does not toggle.
                let one_line = stripped.len() >= 6
                    && (stripped.ends_with("\"\"\"") || stripped.ends_with("'''"));
                if !one_line {
                    in_block = !in_block;
                }
                comment_lines += 1;
            } else if in_block {
                comment_lines += 1;
            }
        } else if uses_c_style_comments(language) {
            if stripped.starts_with("//") {
                comment_lines += 1;
            } else if stripped.starts_with("/*") {
                in_block = !stripped.ends_with("*/");
                comment_lines += 1;
            } else if stripped.ends_with("*/") {
                in_block = false;
                comment_lines += 1;
            } else if in_block {
                comment_lines += 1;
            }
        }
    }

    comment_lines as f64 / total as f64
}

fn mtime_seconds(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

fn days_between(then: i64, now: i64) -> u32 {
    let days = (now - then).max(0) / SECONDS_PER_DAY;
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Days since the file was last touched: version-control history first,
/// filesystem modification time second, zero when neither is available.
pub fn age_days(history: &dyn VersionControl, file_id: &str, absolute: &Path, now: i64) -> u32 {
    history
        .last_touched(file_id)
        .or_else(|| mtime_seconds(absolute))
        .map(|ts| days_between(ts, now))
        .unwrap_or(0)
}

/// Commits touching the file within the trailing window; zero without history.
pub fn churn(history: &dyn VersionControl, file_id: &str, window_days: u32, now: i64) -> u32 {
    history.commits_within(file_id, window_days, now).unwrap_or(0)
}
