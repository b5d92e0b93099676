//! Credential repository: the single active-credential slot in `credentials`.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw credential row. `sealed_value` is ciphertext; this layer never
/// sees plaintext.
#[derive(Debug, Clone)]
pub struct CredentialRow {
    pub id: i64,
    pub sealed_value: String,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl CredentialRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sealed_value: row.get("sealed_value")?,
            notes: row.get("notes")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
            last_used_at: row.get("last_used_at")?,
        })
    }
}

/// Deactivates every credential and inserts `sealed_value` as the only
/// active one, in a single transaction. Returns the new row id.
pub fn replace_active(
    db: &Database,
    sealed_value: &str,
    notes: Option<&str>,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute("UPDATE credentials SET is_active = 0 WHERE is_active = 1", [])?;
        tx.execute(
            "INSERT INTO credentials (sealed_value, notes, is_active, created_at)
             VALUES (?1, ?2, 1, ?3)",
            params![sealed_value, notes, created_at],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    })
}

/// Most recently created active credential. Duplicates are tolerated; the
/// newest wins.
pub fn find_active(db: &Database) -> Result<Option<CredentialRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM credentials WHERE is_active = 1
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], CredentialRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn touch_last_used(db: &Database, id: i64, used_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE credentials SET last_used_at = ?2 WHERE id = ?1",
            params![id, used_at],
        )?;
        Ok(())
    })
}

/// Deactivates all credentials, returning how many were active.
pub fn deactivate_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed =
            conn.execute("UPDATE credentials SET is_active = 0 WHERE is_active = 1", [])?;
        Ok(changed)
    })
}

pub fn count_active(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM credentials WHERE is_active = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_replace_active_leaves_exactly_one() {
        let db = test_db();
        replace_active(&db, "sealed-a", Some("first"), "2026-01-01T00:00:00Z").unwrap();
        let b = replace_active(&db, "sealed-b", None, "2026-01-02T00:00:00Z").unwrap();

        assert_eq!(count_active(&db).unwrap(), 1);
        let active = find_active(&db).unwrap().unwrap();
        assert_eq!(active.id, b);
        assert_eq!(active.sealed_value, "sealed-b");
        assert!(active.last_used_at.is_none());
    }

    #[test]
    fn test_find_active_prefers_newest_duplicate() {
        let db = test_db();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO credentials (sealed_value, is_active, created_at)
                     VALUES ('old', 1, '2026-01-01T00:00:00Z');
                 INSERT INTO credentials (sealed_value, is_active, created_at)
                     VALUES ('new', 1, '2026-02-01T00:00:00Z');",
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(find_active(&db).unwrap().unwrap().sealed_value, "new");
    }

    #[test]
    fn test_touch_and_deactivate() {
        let db = test_db();
        let id = replace_active(&db, "sealed", None, "2026-01-01T00:00:00Z").unwrap();
        touch_last_used(&db, id, "2026-01-05T00:00:00Z").unwrap();
        assert_eq!(
            find_active(&db).unwrap().unwrap().last_used_at.as_deref(),
            Some("2026-01-05T00:00:00Z")
        );

        assert_eq!(deactivate_all(&db).unwrap(), 1);
        assert!(find_active(&db).unwrap().is_none());
        assert_eq!(deactivate_all(&db).unwrap(), 0);
    }
}
