//! SQLite-backed city cache.
//!
//! Each call opens its own connection, so the cache can be shared across
//! threads and processes without holding a handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::cache::{CachePolicy, CityCache};
use super::schema;
use crate::errors::{CityError, CityResult};
use crate::models::CityModel;

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if raw.len() > 2 {
                expanded.push(&raw[2..]);
            }
            return expanded;
        }
    }
    path.to_path_buf()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct SqliteCache {
    db_path: PathBuf,
    policy: CachePolicy,
}

impl SqliteCache {
    /// Open (or create) the cache database at `db_path`. Parent directories
    /// are created as needed.
    pub fn open(db_path: impl AsRef<Path>, policy: CachePolicy) -> CityResult<Self> {
        let expanded = expand_tilde(db_path.as_ref());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let cache = Self {
            db_path: resolved,
            policy: CachePolicy::new(policy.max_entries, policy.ttl),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn connect(&self) -> CityResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_schema(&self) -> CityResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)
    }

    fn ttl_millis(&self) -> Option<i64> {
        self.policy
            .ttl
            .map(|ttl| i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    fn purge_expired(&self, conn: &Connection, now: i64) -> CityResult<usize> {
        let Some(ttl) = self.ttl_millis() else {
            return Ok(0);
        };
        let cutoff = now.saturating_sub(ttl);
        Ok(conn.execute(
            "DELETE FROM city_cache WHERE created_at <= ?1;",
            params![cutoff],
        )?)
    }

    fn evict_over_capacity(&self, conn: &Connection) -> CityResult<usize> {
        let keep = i64::try_from(self.policy.max_entries).unwrap_or(i64::MAX);
        Ok(conn.execute(
            "DELETE FROM city_cache WHERE key NOT IN (
                SELECT key FROM city_cache ORDER BY accessed_at DESC, rowid DESC LIMIT ?1
            );",
            params![keep],
        )?)
    }
}

impl CityCache for SqliteCache {
    fn get(&self, key: &str) -> CityResult<Option<Arc<CityModel>>> {
        let conn = self.connect()?;
        let now = now_millis();
        self.purge_expired(&conn, now)?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM city_cache WHERE key = ?1;",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        conn.execute(
            "UPDATE city_cache SET accessed_at = ?1 WHERE key = ?2;",
            params![now, key],
        )?;
        let model: CityModel = serde_json::from_str(&payload)
            .map_err(|e| CityError::Cache(format!("corrupt entry for {key}: {e}")))?;
        Ok(Some(Arc::new(model)))
    }

    fn put(&self, key: &str, model: Arc<CityModel>) -> CityResult<()> {
        let payload = serde_json::to_string(model.as_ref())?;
        let mut conn = self.connect()?;
        let now = now_millis();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO city_cache(key, payload, created_at, accessed_at)
             VALUES(?1, ?2, ?3, ?3)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                accessed_at = excluded.accessed_at;",
            params![key, payload, now],
        )?;
        let evicted = self.evict_over_capacity(&tx)?;
        tx.commit()?;
        if evicted > 0 {
            debug!("Evicted {evicted} cached cities from {}", self.db_path.display());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> CityResult<bool> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM city_cache WHERE key = ?1;", params![key])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> CityResult<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM city_cache;", [])?;
        Ok(())
    }

    fn len(&self) -> CityResult<usize> {
        let conn = self.connect()?;
        self.purge_expired(&conn, now_millis())?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM city_cache;", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::CityStats;

    fn model(name: &str, files: usize) -> Arc<CityModel> {
        let mut model = CityModel::empty(name);
        model.stats = CityStats {
            total_files: files,
            ..CityStats::default()
        };
        Arc::new(model)
    }

    fn cache_in(dir: &tempfile::TempDir, policy: CachePolicy) -> SqliteCache {
        SqliteCache::open(dir.path().join("nested").join("city.db"), policy).unwrap()
    }

    #[test]
    fn test_open_creates_parent_and_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_in(&tmp, CachePolicy::default());
        assert!(cache.db_path().exists());
        let conn = cache.connect().unwrap();
        assert_eq!(schema::get_schema_version(&conn), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(&tmp, CachePolicy::default());
            cache.put("repo::100", model("repo", 7)).unwrap();
        }
        let cache = cache_in(&tmp, CachePolicy::default());
        let hit = cache.get("repo::100").unwrap().unwrap();
        assert_eq!(hit.name, "repo");
        assert_eq!(hit.stats.total_files, 7);
        assert!(cache.get("repo::200").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_in(&tmp, CachePolicy::default());
        cache.put("k", model("old", 1)).unwrap();
        cache.put("k", model("new", 2)).unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get("k").unwrap().unwrap().name, "new");
        assert!(cache.remove("k").unwrap());
        assert!(!cache.remove("k").unwrap());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_in(&tmp, CachePolicy::new(2, None));
        cache.put("a", model("a", 0)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.put("b", model("b", 0)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.get("a").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cache.put("c", model("c", 0)).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.get("b").unwrap().is_none());
        assert!(cache.get("a").unwrap().is_some());
        assert!(cache.get("c").unwrap().is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_in(&tmp, CachePolicy::new(8, Some(Duration::from_millis(30))));
        cache.put("k", model("k", 0)).unwrap();
        assert!(cache.get("k").unwrap().is_some());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("k").unwrap().is_none());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn test_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache_in(&tmp, CachePolicy::default());
        cache.put("a", model("a", 0)).unwrap();
        cache.put("b", model("b", 0)).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.len().unwrap(), 0);
    }
}
