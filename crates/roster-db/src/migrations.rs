//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run on startup in
//! lexicographic order of their names, tracked by the `migrations` table.
//! Each migration runs exactly once, inside its own transaction — if it has
//! already been recorded, it is skipped; if it fails, its effects roll back
//! and startup aborts with the failing migration's name.

use rusqlite::Connection;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All embedded migrations. Declaration order does not matter: names are
/// sorted lexicographically before application, so a file's name *is* its
/// position in the sequence.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_create_users",
        sql: include_str!("migrations/000_create_users.sql"),
    },
    Migration {
        name: "001_users_name_index",
        sql: include_str!("migrations/001_users_name_index.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Idempotent: migrations already recorded in the `migrations` table are
/// skipped, so calling this on every startup is safe. Returns the number of
/// migrations that were newly applied.
///
/// # Errors
///
/// Returns `MigrationError` on the first migration that fails to execute or
/// record, without attempting subsequent migrations. Prior committed
/// migrations remain applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    // The tracking table must exist before we can check what's been applied.
    conn.execute_batch("CREATE TABLE IF NOT EXISTS migrations (name TEXT PRIMARY KEY);")
        .map_err(|e| MigrationError::ExecutionFailed {
            name: "migrations_bootstrap".to_string(),
            source: e,
        })?;

    // Lexicographic order of names is the application order. Callers name
    // migration files so that this matches dependency order.
    let mut ordered: Vec<&Migration> = migrations.iter().collect();
    ordered.sort_by_key(|m| m.name);

    let mut applied = 0;

    for migration in ordered {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(
                migration = migration.name,
                "migration already applied, skipping"
            );
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.execute_batch(migration.sql)
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.execute("INSERT INTO migrations (name) VALUES (?1)", [migration.name])
            .map_err(|e| MigrationError::ExecutionFailed {
                name: migration.name.to_string(),
                source: e,
            })?;

        tx.commit().map_err(|e| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        })?;

        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 2, "should apply every embedded migration");

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .expect("should query migration count");
        assert_eq!(count, 2);

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'users')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(exists, "users table should exist");
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");

        let first = run_migrations(&conn).expect("first run should succeed");
        assert_eq!(first, 2);

        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[test]
    fn migrations_apply_in_lexicographic_order_regardless_of_declaration() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        // Declared backwards: the second entry must still run first because
        // its name sorts first.
        let migrations = [
            Migration {
                name: "001_add_column",
                sql: "ALTER TABLE probe ADD COLUMN extra TEXT;",
            },
            Migration {
                name: "000_create_probe",
                sql: "CREATE TABLE probe (id INTEGER PRIMARY KEY);",
            },
        ];

        let applied = run_migrations_from_list(&conn, &migrations)
            .expect("out-of-order declarations should still apply cleanly");
        assert_eq!(applied, 2);

        let recorded: Vec<String> = conn
            .prepare("SELECT name FROM migrations ORDER BY rowid")
            .expect("should prepare")
            .query_map([], |row| row.get(0))
            .expect("should query")
            .map(|r| r.expect("should read name"))
            .collect();
        assert_eq!(recorded, vec!["000_create_probe", "001_add_column"]);
    }

    #[test]
    fn failure_aborts_without_running_later_migrations() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let migrations = [
            Migration {
                name: "000_ok",
                sql: "CREATE TABLE survivor (id INTEGER PRIMARY KEY);",
            },
            Migration {
                name: "001_broken",
                sql: "THIS IS NOT SQL;",
            },
            Migration {
                name: "002_never_runs",
                sql: "CREATE TABLE unreachable (id INTEGER PRIMARY KEY);",
            },
        ];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("broken migration should fail the run");
        match err {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "001_broken"),
            other => panic!("unexpected error type: {other:?}"),
        }

        // The migration before the failure stays applied.
        let survivor: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'survivor')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(survivor, "committed prior migration should remain applied");

        // The migration after the failure never ran.
        let unreachable: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'unreachable')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert!(!unreachable, "migrations after the failure must not run");
    }

    #[test]
    fn migration_side_effects_rollback_when_tracking_insert_fails() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let migrations = [Migration {
            name: "001_tracking_insert_conflict",
            sql: "
                CREATE TABLE rollback_probe (id INTEGER PRIMARY KEY);
                INSERT INTO migrations (name) VALUES ('001_tracking_insert_conflict');
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("tracking insert conflict should fail migration");

        match err {
            MigrationError::ExecutionFailed { name, .. } => {
                assert_eq!(name, "001_tracking_insert_conflict")
            }
            other => panic!("unexpected error type: {other:?}"),
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'rollback_probe')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");

        assert!(
            !exists,
            "schema side effects should be rolled back when tracking insert fails"
        );
    }

    #[test]
    fn partially_applied_sequence_resumes_where_it_left_off() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let first_half = [Migration {
            name: "000_create_probe",
            sql: "CREATE TABLE probe (id INTEGER PRIMARY KEY);",
        }];
        let full = [
            Migration {
                name: "000_create_probe",
                sql: "CREATE TABLE probe (id INTEGER PRIMARY KEY);",
            },
            Migration {
                name: "001_add_column",
                sql: "ALTER TABLE probe ADD COLUMN extra TEXT;",
            },
        ];

        let applied = run_migrations_from_list(&conn, &first_half).expect("first half");
        assert_eq!(applied, 1);

        // Re-running the full sequence applies only the new migration; the
        // recorded one is not re-executed (a second CREATE TABLE would fail).
        let applied = run_migrations_from_list(&conn, &full).expect("full sequence");
        assert_eq!(applied, 1);
    }
}
