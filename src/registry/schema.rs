//! SQL DDL for the registry tables.
//!
//! Two tables: `directives` (one row per directive, carrying the latest
//! content) and `directive_versions` (full version history). All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- One row per published directive; content mirrors the latest version
CREATE TABLE IF NOT EXISTS directives (
    name TEXT PRIMARY KEY,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT 'actions',
    subcategory TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    tech_stack TEXT NOT NULL DEFAULT '[]',
    latest_version TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT,
    quality_score REAL NOT NULL DEFAULT 0.0,
    download_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_directives_category ON directives(category);
CREATE INDEX IF NOT EXISTS idx_directives_downloads ON directives(download_count);

-- Full version history
CREATE TABLE IF NOT EXISTS directive_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directive_name TEXT NOT NULL REFERENCES directives(name) ON DELETE CASCADE,
    version TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT,
    changelog TEXT,
    is_latest INTEGER NOT NULL DEFAULT 0,
    published_at TEXT NOT NULL,
    UNIQUE(directive_name, version)
);

CREATE INDEX IF NOT EXISTS idx_versions_name ON directive_versions(directive_name);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"directives".to_string()));
        assert!(tables.contains(&"directive_versions".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
