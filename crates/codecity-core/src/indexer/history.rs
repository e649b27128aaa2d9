//! Version-control history queries used by the activity metrics.
//!
//! History is optional: [`NoHistory`] answers every query with `None`, and
//! [`GitHistory`] walks the repository once up front so that the parallel
//! parse stage only ever reads an immutable index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{Commit, Repository, Sort};
use tracing::debug;

use crate::errors::{CityError, CityResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Read-only history lookups keyed by root-relative file id.
pub trait VersionControl: Send + Sync {
    /// Unix timestamp of the most recent commit touching the file.
    fn last_touched(&self, file_id: &str) -> Option<i64>;

    /// Number of commits touching the file in the `days` before `now`.
    fn commits_within(&self, file_id: &str, days: u32, now: i64) -> Option<u32>;
}

/// History provider for trees without version control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl VersionControl for NoHistory {
    fn last_touched(&self, _file_id: &str) -> Option<i64> {
        None
    }

    fn commits_within(&self, _file_id: &str, _days: u32, _now: i64) -> Option<u32> {
        None
    }
}

/// Commit timestamps per path, collected from one bounded history walk.
#[derive(Debug)]
pub struct GitHistory {
    workdir: PathBuf,
    /// Analysis root relative to the repository workdir, `/`-terminated or empty.
    prefix: String,
    /// repo-relative path -> commit times, newest first
    touches: HashMap<String, Vec<i64>>,
    commits_walked: usize,
}

impl GitHistory {
    /// Discover the repository containing `root` and index up to
    /// `commit_limit` commits reachable from HEAD.
    pub fn open(root: &Path, commit_limit: usize) -> CityResult<Self> {
        let repo = Repository::discover(root)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| git2::Error::from_str("bare repositories are not supported"))?
            .canonicalize()?;
        let canonical_root = root.canonicalize()?;
        let prefix = match canonical_root.strip_prefix(&workdir) {
            Ok(rel) if rel.as_os_str().is_empty() => String::new(),
            Ok(rel) => format!("{}/", rel.to_string_lossy().replace('\\', "/")),
            Err(_) => {
                return Err(CityError::History(git2::Error::from_str(
                    "root lies outside the repository workdir",
                )))
            }
        };

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut touches: HashMap<String, Vec<i64>> = HashMap::new();
        let mut commits_walked = 0usize;
        for oid in revwalk.filter_map(|oid| oid.ok()).take(commit_limit) {
            let commit = match repo.find_commit(oid) {
                Ok(c) => c,
                Err(_) => continue,
            };
            commits_walked += 1;
            let seconds = commit.time().seconds();
            match touched_paths(&repo, &commit) {
                Ok(paths) => {
                    for path in paths {
                        touches.entry(path).or_default().push(seconds);
                    }
                }
                Err(e) => debug!("Skipping commit {oid} while indexing history: {e}"),
            }
        }
        for times in touches.values_mut() {
            times.sort_unstable_by(|a, b| b.cmp(a));
        }

        debug!(
            "Indexed {} commits touching {} paths under {}",
            commits_walked,
            touches.len(),
            workdir.display()
        );

        Ok(Self {
            workdir,
            prefix,
            touches,
            commits_walked,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn commits_walked(&self) -> usize {
        self.commits_walked
    }

    fn times_for(&self, file_id: &str) -> Option<&[i64]> {
        let key = format!("{}{}", self.prefix, file_id);
        self.touches.get(&key).map(Vec::as_slice)
    }
}

/// Paths changed by `commit` relative to its first parent (or the empty tree).
fn touched_paths(repo: &Repository, commit: &Commit<'_>) -> Result<Vec<String>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parents().next() {
        Some(parent) => Some(parent.tree()?),
        None => None,
    };
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    Ok(diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect())
}

impl VersionControl for GitHistory {
    fn last_touched(&self, file_id: &str) -> Option<i64> {
        self.times_for(file_id)?.first().copied()
    }

    fn commits_within(&self, file_id: &str, days: u32, now: i64) -> Option<u32> {
        let Some(times) = self.times_for(file_id) else {
            // Tracked history with no entry for this file: no recent commits.
            return Some(0);
        };
        let since = now - i64::from(days) * SECONDS_PER_DAY;
        let recent = times.iter().take_while(|&&t| t >= since).count();
        Some(u32::try_from(recent).unwrap_or(u32::MAX))
    }
}

/// Open git history for `root`, or fall back to [`NoHistory`].
pub fn open_history(root: &Path, enabled: bool, commit_limit: usize) -> Box<dyn VersionControl> {
    if !enabled {
        return Box::new(NoHistory);
    }
    match GitHistory::open(root, commit_limit) {
        Ok(history) => Box::new(history),
        Err(e) => {
            debug!("No version-control history for {}: {e}", root.display());
            Box::new(NoHistory)
        }
    }
}
