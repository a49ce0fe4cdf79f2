// src/db/schema.rs

//! SQLite schema and forward-only migrations
//!
//! Each migration runs once; the applied versions are recorded in
//! `schema_version`.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Version a fresh database is migrated to
pub const SCHEMA_VERSION: i32 = 2;

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Highest applied migration, 0 for an empty database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    ensure_version_table(conn)?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Run every migration newer than the recorded version
pub fn migrate(conn: &Connection) -> Result<()> {
    let from = get_schema_version(conn)?;
    if from >= SCHEMA_VERSION {
        debug!("Schema is current (version {})", from);
        return Ok(());
    }

    for version in (from + 1)..=SCHEMA_VERSION {
        debug!("Migrating schema {} -> {}", version - 1, version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Database schema migrated from version {} to {}", from, SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        other => Err(Error::InitError(format!("no migration for schema version {}", other))),
    }
}

/// Installed set: packages, their dependency edges and the changeset history
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per committed transaction
        CREATE TABLE changesets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'applied')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            applied_at TEXT
        );

        CREATE INDEX idx_changesets_status ON changesets(status);

        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            version TEXT NOT NULL,
            architecture TEXT,
            description TEXT,
            installed_size INTEGER,
            license TEXT,
            homepage TEXT,
            repository TEXT,
            reason TEXT NOT NULL DEFAULT 'explicit' CHECK(reason IN ('explicit', 'automatic')),
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            installed_by_changeset_id INTEGER,
            FOREIGN KEY (installed_by_changeset_id) REFERENCES changesets(id)
        );

        CREATE INDEX idx_packages_name ON packages(name);

        -- depends_on_name is a bare name; the target need not be installed
        CREATE TABLE dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            depends_on_name TEXT NOT NULL,
            version_constraint TEXT,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dependencies_package_id ON dependencies(package_id);
        CREATE INDEX idx_dependencies_depends_on ON dependencies(depends_on_name);
        ",
    )?;
    Ok(())
}

/// Repository pool: configured repositories and their synced indexes
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            priority INTEGER NOT NULL DEFAULT 0,
            metadata_expire INTEGER NOT NULL DEFAULT 3600,
            last_sync TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_repositories_enabled ON repositories(enabled);
        CREATE INDEX idx_repositories_priority ON repositories(priority);

        CREATE TABLE repository_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repository_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            architecture TEXT,
            description TEXT,
            installed_size INTEGER,
            license TEXT,
            homepage TEXT,
            dependencies TEXT,
            synced_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_repo_packages_name ON repository_packages(name);
        CREATE INDEX idx_repo_packages_repo ON repository_packages(repository_id);
        CREATE UNIQUE INDEX idx_repo_packages_unique ON repository_packages(repository_id, name, version, architecture);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn scratch_db() -> (NamedTempFile, Connection) {
        let file = NamedTempFile::new().unwrap();
        let conn = Connection::open(file.path()).unwrap();
        (file, conn)
    }

    #[test]
    fn test_version_starts_at_zero() {
        let (_file, conn) = scratch_db();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        set_schema_version(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_file, conn) = scratch_db();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "packages",
            "dependencies",
            "changesets",
            "repositories",
            "repository_packages",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_second_migrate_is_noop() {
        let (_file, conn) = scratch_db();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, i64::from(SCHEMA_VERSION));
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_installed_name_is_unique() {
        let (_file, conn) = scratch_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO packages (name, version, architecture) VALUES (?1, ?2, ?3)",
            ["test-package", "1.0.0", "x86_64"],
        )
        .unwrap();

        // A second version of the same name cannot be installed side by side
        let result = conn.execute(
            "INSERT INTO packages (name, version, architecture) VALUES (?1, ?2, ?3)",
            ["test-package", "2.0.0", "x86_64"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dependency_requires_package() {
        let (_file, conn) = scratch_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO dependencies (package_id, depends_on_name) VALUES (?1, ?2)",
            ["999", "libfoo"],
        );
        assert!(result.is_err());
    }
}
