//! SQLite schema DDL and migrations for the city cache.

use rusqlite::Connection;

use crate::errors::CityResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 2;

/// Executed with `IF NOT EXISTS` so they are safe to replay.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS cache_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS city_cache (
        key TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );",
];

/// Run pending migrations up to [`SCHEMA_VERSION`]. Each step runs in its
/// own SAVEPOINT and is rolled back alone on failure.
pub fn migrate_schema(conn: &Connection) -> CityResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT codecity_migrate_step;")?;

        let step_result = (|| -> CityResult<()> {
            match next_version {
                1 => {}
                2 => migrate_to_v2(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            conn.execute_batch("RELEASE SAVEPOINT codecity_migrate_step;")?;
            Ok(())
        })();

        if let Err(e) = step_result {
            let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT codecity_migrate_step;");
            let _ = conn.execute_batch("RELEASE SAVEPOINT codecity_migrate_step;");
            return Err(e);
        }
        current_version = next_version;
    }
    Ok(())
}

/// v2: last-access time for least-recently-used eviction.
fn migrate_to_v2(conn: &Connection) -> CityResult<()> {
    if !column_exists(conn, "city_cache", "accessed_at")? {
        conn.execute_batch(
            "ALTER TABLE city_cache ADD COLUMN accessed_at INTEGER NOT NULL DEFAULT 0;
             UPDATE city_cache SET accessed_at = created_at;",
        )?;
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_city_cache_accessed ON city_cache(accessed_at);",
    )?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> CityResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names.iter().any(|n| n == column))
}

/// Stored schema version; 0 when absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM cache_meta WHERE key = 'schema_version';",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse::<i32>().ok())
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> CityResult<()> {
    conn.execute(
        "INSERT INTO cache_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}
