//! Connection setup and migration handling for the SQLite backend.
//!
//! The tables themselves belong to the application, so migrations are passed
//! in by the caller and applied with `rusqlite_migration`, which tracks
//! progress in SQLite's `user_version` pragma.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

fn migrations<'m>(steps: &[&'m str]) -> Migrations<'m> {
    Migrations::new(steps.iter().map(|sql| M::up(*sql)).collect())
}

/// Opens (or creates) a SQLite database at `path` with WAL mode, foreign keys,
/// and `steps` applied.
pub fn open_database(path: &str, steps: &[&str]) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    // WAL is reported back by the pragma; an in-memory database ignores it.
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(path, journal_mode = %mode, "opened sqlite database");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    configure_and_migrate(&mut conn, steps)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with foreign keys and `steps` applied.
pub fn open_in_memory(steps: &[&str]) -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_migrate(&mut conn, steps)?;
    Ok(conn)
}

/// Enables foreign keys and applies pending migrations.
fn configure_and_migrate(conn: &mut Connection, steps: &[&str]) -> Result<(), StorageError> {
    // Foreign key enforcement is off by default in SQLite.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    if steps.is_empty() {
        return Ok(());
    }
    migrations(steps)
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &[&str] = &[
        "CREATE TABLE simulation (id INTEGER PRIMARY KEY, name TEXT);",
        "ALTER TABLE simulation ADD COLUMN started INTEGER;",
    ];

    #[test]
    fn test_migrations_applied_in_memory() {
        let conn = open_in_memory(STEPS).unwrap();
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
        conn.execute("INSERT INTO simulation (name, started) VALUES ('s', 1)", [])
            .unwrap();
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_in_memory(&[]).unwrap();
        let on: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn test_file_database_uses_wal_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uow.db");
        let path = path.to_str().unwrap();
        {
            let conn = open_database(path, STEPS).unwrap();
            let mode: String = conn
                .pragma_query_value(None, "journal_mode", |row| row.get(0))
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");
        }
        // Reopening with the same steps is a no-op migration.
        open_database(path, STEPS).unwrap();
    }

    #[test]
    fn test_broken_migration_is_reported() {
        let err = open_in_memory(&["CREATE TABL broken"]).unwrap_err();
        assert!(matches!(err, StorageError::Migration(_)));
    }
}
