//! Parallel parse stage with Rayon-based parallelism.
//!
//! Files are processed in fixed-size batches on a bounded pool. Each unit
//! owns its output; the coordinator merges a batch only after every unit in it
//! has finished. A unit that fails yields no record.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::errors::CityResult;
use crate::indexer::filesystem::{detect_language, relative_id};
use crate::indexer::history::VersionControl;
use crate::indexer::metrics;
use crate::indexer::symbols::StructureExtractor;
use crate::models::{decay_level, is_hotspot, FileRecord, Language};

/// Shared, read-only inputs for every parse unit in a run.
pub struct ParseContext<'a> {
    pub root: &'a Path,
    pub extractor: &'a dyn StructureExtractor,
    pub history: &'a dyn VersionControl,
    pub content_snapshot_chars: usize,
    pub churn_window_days: u32,
    /// Unix timestamp the run is anchored to.
    pub now: i64,
}

fn snapshot(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}

/// Read and measure one file.
pub fn parse_file(ctx: &ParseContext<'_>, path: &Path) -> CityResult<FileRecord> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let id = relative_id(ctx.root, path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| id.clone());
    let language = detect_language(path).unwrap_or(Language::Unknown);

    let loc = metrics::line_count(&content);
    let complexity = metrics::cyclomatic_complexity(&content, language);
    let age_days = metrics::age_days(ctx.history, &id, path, ctx.now);
    let churn = metrics::churn(ctx.history, &id, ctx.churn_window_days, ctx.now);

    let imports = ctx.extractor.imports(&content, language);
    let mut structure = ctx.extractor.structure(&content, language);
    structure.comment_density = metrics::comment_density(&content, language);

    Ok(FileRecord {
        id,
        name,
        language,
        content: snapshot(&content, ctx.content_snapshot_chars),
        loc,
        complexity,
        age_days,
        churn,
        imports,
        structure,
        is_hotspot: is_hotspot(complexity, churn, loc),
        decay_level: decay_level(age_days),
    })
}

fn parse_unit(ctx: &ParseContext<'_>, path: &Path) -> Option<FileRecord> {
    match parse_file(ctx, path) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("Dropping {} from analysis: {e}", path.display());
            None
        }
    }
}

/// Parse `paths` on a pool of `config.workers` threads, `config.batch_size`
/// files at a time. Falls back to sequential parsing if the pool cannot be
/// built.
pub fn parse_files(
    ctx: &ParseContext<'_>,
    paths: &[PathBuf],
    config: &AnalyzerConfig,
) -> Vec<FileRecord> {
    if paths.is_empty() {
        return vec![];
    }

    let batch_size = config.batch_size.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build();

    let mut records = Vec::with_capacity(paths.len());
    match pool {
        Ok(pool) => {
            for batch in paths.chunks(batch_size) {
                let parsed: Vec<FileRecord> = pool.install(|| {
                    batch
                        .par_iter()
                        .filter_map(|path| parse_unit(ctx, path))
                        .collect()
                });
                records.extend(parsed);
            }
        }
        Err(e) => {
            debug!("Parse pool unavailable, parsing sequentially: {e}");
            records.extend(paths.iter().filter_map(|path| parse_unit(ctx, path)));
        }
    }
    records
}
