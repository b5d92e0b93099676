//! Versioned schema migrations.
//!
//! Applied versions are tracked in `_migrations`. Column additions are
//! skipped when the column already exists so re-running is harmless.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    Standard,
    /// Skip if `column` already exists on `table`.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_transcription_jobs_table",
        sql: include_str!("sql/001_create_transcription_jobs.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_credentials_table",
        sql: include_str!("sql/002_create_credentials.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add_corrections_to_jobs",
        sql: include_str!("sql/003_add_corrections.sql"),
        kind: MigrationKind::AddColumn {
            table: "transcription_jobs",
            column: "corrected_text",
        },
    },
];

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!("Skipping migration v{} (already applied)", migration.version);
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = migrated();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_correction_columns_exist() {
        let conn = migrated();
        for column in ["corrected_text", "corrected_segments", "corrected_at"] {
            assert!(column_exists(&conn, "transcription_jobs", column).unwrap());
        }
    }

    #[test]
    fn test_source_must_be_exactly_one_of_url_or_path() {
        let conn = migrated();
        let both = conn.execute(
            "INSERT INTO transcription_jobs (id, source_url, source_path, created_at)
             VALUES ('j1', 'https://x', '/tmp/a.mp3', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(both.is_err());

        let neither = conn.execute(
            "INSERT INTO transcription_jobs (id, created_at) VALUES ('j2', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(neither.is_err());
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let conn = migrated();
        assert!(column_exists(&conn, "jobs; DROP TABLE x", "id").is_err());
    }
}
