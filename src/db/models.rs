// src/db/models.rs

//! Data models for pkcore database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;
use tracing::warn;

/// Why a package is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    /// Requested by the user
    Explicit,
    /// Pulled in to satisfy a dependency
    Automatic,
}

impl InstallReason {
    pub fn as_str(&self) -> &str {
        match self {
            InstallReason::Explicit => "explicit",
            InstallReason::Automatic => "automatic",
        }
    }
}

impl FromStr for InstallReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "explicit" => Ok(InstallReason::Explicit),
            "automatic" => Ok(InstallReason::Automatic),
            _ => Err(format!("Invalid install reason: {}", s)),
        }
    }
}

fn invalid_text(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// Collect rows, skipping the ones that fail to convert
fn readable_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    table: &str,
) -> Vec<T> {
    rows.filter_map(|row| match row {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping unreadable row in {}: {}", table, e);
            None
        }
    })
    .collect()
}

const PACKAGE_COLUMNS: &str = "id, name, version, architecture, description, installed_size, license, \
     homepage, repository, reason, installed_at, installed_by_changeset_id";

/// A package in the installed set
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub description: Option<String>,
    pub installed_size: Option<i64>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    /// URL of the repository the package was installed from
    pub repository: Option<String>,
    pub reason: InstallReason,
    pub installed_at: Option<String>,
    pub installed_by_changeset_id: Option<i64>,
}

impl InstalledPackage {
    pub fn new(name: String, version: String) -> Self {
        Self {
            id: None,
            name,
            version,
            architecture: None,
            description: None,
            installed_size: None,
            license: None,
            homepage: None,
            repository: None,
            reason: InstallReason::Explicit,
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (name, version, architecture, description, installed_size, license,
                                   homepage, repository, reason, installed_by_changeset_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.name,
                &self.version,
                &self.architecture,
                &self.description,
                &self.installed_size,
                &self.license,
                &self.homepage,
                &self.repository,
                self.reason.as_str(),
                &self.installed_by_changeset_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages WHERE name = ?1",
            PACKAGE_COLUMNS
        ))?;

        let package = stmt.query_row([name], Self::from_row).optional()?;

        Ok(package)
    }

    /// List all installed packages, skipping unreadable rows
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages ORDER BY name",
            PACKAGE_COLUMNS
        ))?;

        let rows = stmt.query_map([], Self::from_row)?;
        Ok(readable_rows(rows, "packages"))
    }

    /// Replace version and metadata of an installed package in place
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update package without ID".to_string()))?;

        conn.execute(
            "UPDATE packages SET version = ?1, architecture = ?2, description = ?3, installed_size = ?4,
                    license = ?5, homepage = ?6, repository = ?7, reason = ?8,
                    installed_by_changeset_id = ?9, installed_at = CURRENT_TIMESTAMP
             WHERE id = ?10",
            params![
                &self.version,
                &self.architecture,
                &self.description,
                &self.installed_size,
                &self.license,
                &self.homepage,
                &self.repository,
                self.reason.as_str(),
                &self.installed_by_changeset_id,
                id,
            ],
        )?;

        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let reason_str: String = row.get(9)?;
        let reason = reason_str
            .parse::<InstallReason>()
            .map_err(|e| invalid_text(9, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            architecture: row.get(3)?,
            description: row.get(4)?,
            installed_size: row.get(5)?,
            license: row.get(6)?,
            homepage: row.get(7)?,
            repository: row.get(8)?,
            reason,
            installed_at: row.get(10)?,
            installed_by_changeset_id: row.get(11)?,
        })
    }
}

/// Changeset status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset records one committed transaction
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
}

impl Changeset {
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// List all changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at
             FROM changesets ORDER BY id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    pub fn update_status(&mut self, conn: &Connection, new_status: ChangesetStatus) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update changeset without ID".to_string()))?;

        if new_status == ChangesetStatus::Applied {
            conn.execute(
                "UPDATE changesets SET status = ?1, applied_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        } else {
            conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        }

        self.status = new_status;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str
            .parse::<ChangesetStatus>()
            .map_err(|e| invalid_text(2, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
        })
    }
}

/// Runtime dependency of an installed package
#[derive(Debug, Clone)]
pub struct DependencyEntry {
    pub id: Option<i64>,
    pub package_id: i64,
    pub depends_on_name: String,
    pub version_constraint: Option<String>,
}

impl DependencyEntry {
    pub fn new(package_id: i64, depends_on_name: String, version_constraint: Option<String>) -> Self {
        Self {
            id: None,
            package_id,
            depends_on_name,
            version_constraint,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO dependencies (package_id, depends_on_name, version_constraint)
             VALUES (?1, ?2, ?3)",
            params![&self.package_id, &self.depends_on_name, &self.version_constraint],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all dependencies of an installed package
    pub fn find_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, depends_on_name, version_constraint
             FROM dependencies WHERE package_id = ?1",
        )?;

        let deps = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Names of installed packages that depend on `package_name` (reverse dependencies)
    pub fn find_dependents(conn: &Connection, package_name: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT p.name FROM dependencies d
             JOIN packages p ON p.id = d.package_id
             WHERE d.depends_on_name = ?1
             ORDER BY p.name",
        )?;

        let names = stmt
            .query_map([package_name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    /// Delete all dependencies of a package (called when replacing or removing it)
    pub fn delete_by_package(conn: &Connection, package_id: i64) -> Result<()> {
        conn.execute("DELETE FROM dependencies WHERE package_id = ?1", [package_id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            depends_on_name: row.get(2)?,
            version_constraint: row.get(3)?,
        })
    }
}

const REPOSITORY_COLUMNS: &str =
    "id, name, url, enabled, priority, metadata_expire, last_sync, created_at";

/// Repository represents a configured package source
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub priority: i32,
    /// Seconds before the index is considered stale
    pub metadata_expire: i32,
    pub last_sync: Option<String>,
    pub created_at: Option<String>,
}

impl Repository {
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            name,
            url,
            enabled: true,
            priority: 0,
            metadata_expire: 3600, // Default: 1 hour
            last_sync: None,
            created_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories (name, url, enabled, priority, metadata_expire)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.name,
                &self.url,
                self.enabled as i32,
                &self.priority,
                &self.metadata_expire,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories WHERE name = ?1",
            REPOSITORY_COLUMNS
        ))?;

        let repo = stmt.query_row([name], Self::from_row).optional()?;

        Ok(repo)
    }

    /// List all repositories in pool order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories ORDER BY priority DESC, name",
            REPOSITORY_COLUMNS
        ))?;

        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    /// List enabled repositories in pool order
    pub fn list_enabled(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories WHERE enabled = 1 ORDER BY priority DESC, name",
            REPOSITORY_COLUMNS
        ))?;

        let repos = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(repos)
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update repository without ID".to_string()))?;

        conn.execute(
            "UPDATE repositories SET name = ?1, url = ?2, enabled = ?3, priority = ?4,
             metadata_expire = ?5, last_sync = ?6 WHERE id = ?7",
            params![
                &self.name,
                &self.url,
                self.enabled as i32,
                &self.priority,
                &self.metadata_expire,
                &self.last_sync,
                id,
            ],
        )?;

        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            url: row.get(2)?,
            enabled: row.get::<_, i32>(3)? != 0,
            priority: row.get(4)?,
            metadata_expire: row.get(5)?,
            last_sync: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

const REPOSITORY_PACKAGE_COLUMNS: &str = "rp.id, rp.repository_id, rp.name, rp.version, rp.architecture, \
     rp.description, rp.installed_size, rp.license, rp.homepage, rp.dependencies, rp.synced_at";

/// RepositoryPackage represents a package offered by a repository
#[derive(Debug, Clone)]
pub struct RepositoryPackage {
    pub id: Option<i64>,
    pub repository_id: i64,
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub description: Option<String>,
    pub installed_size: Option<i64>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    /// JSON array of dependency names, optionally with a constraint (`libfoo>=1.2`)
    pub dependencies: Option<String>,
    pub synced_at: Option<String>,
}

impl RepositoryPackage {
    pub fn new(repository_id: i64, name: String, version: String) -> Self {
        Self {
            id: None,
            repository_id,
            name,
            version,
            architecture: None,
            description: None,
            installed_size: None,
            license: None,
            homepage: None,
            dependencies: None,
            synced_at: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repository_packages
             (repository_id, name, version, architecture, description, installed_size, license,
              homepage, dependencies)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.repository_id,
                &self.name,
                &self.version,
                &self.architecture,
                &self.description,
                &self.installed_size,
                &self.license,
                &self.homepage,
                &self.dependencies,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find repository packages by repository ID, in index order
    pub fn find_by_repository(conn: &Connection, repository_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repository_packages rp WHERE rp.repository_id = ?1 ORDER BY rp.id",
            REPOSITORY_PACKAGE_COLUMNS
        ))?;

        let rows = stmt.query_map([repository_id], Self::from_row)?;
        Ok(readable_rows(rows, "repository_packages"))
    }

    /// Every copy of `name` in enabled repositories, paired with the repository URL
    ///
    /// Results follow pool order (priority, then repository name).
    pub fn find_available(conn: &Connection, name: &str) -> Result<Vec<(Self, String)>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, r.url FROM repository_packages rp
             JOIN repositories r ON r.id = rp.repository_id
             WHERE rp.name = ?1 AND r.enabled = 1
             ORDER BY r.priority DESC, r.name, rp.id",
            REPOSITORY_PACKAGE_COLUMNS
        ))?;

        let rows = stmt.query_map([name], |row| Ok((Self::from_row(row)?, row.get(11)?)))?;
        Ok(readable_rows(rows, "repository_packages"))
    }

    /// Delete all packages for a repository (used when syncing)
    pub fn delete_by_repository(conn: &Connection, repository_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM repository_packages WHERE repository_id = ?1",
            [repository_id],
        )?;
        Ok(())
    }

    /// Store the dependency list as JSON
    pub fn set_dependencies(&mut self, deps: &[String]) -> Result<()> {
        self.dependencies = if deps.is_empty() {
            None
        } else {
            Some(serde_json::to_string(deps).map_err(|e| Error::ParseError(e.to_string()))?)
        };
        Ok(())
    }

    /// Parsed dependency list as (name, constraint) pairs
    pub fn dependency_specs(&self) -> Result<Vec<(String, Option<String>)>> {
        let Some(json) = self.dependencies.as_deref() else {
            return Ok(Vec::new());
        };
        let raw: Vec<String> = serde_json::from_str(json).map_err(|e| {
            Error::ParseError(format!("Invalid dependency list for {}: {}", self.name, e))
        })?;

        raw.iter().map(|dep| parse_dependency(dep)).collect()
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            repository_id: row.get(1)?,
            name: row.get(2)?,
            version: row.get(3)?,
            architecture: row.get(4)?,
            description: row.get(5)?,
            installed_size: row.get(6)?,
            license: row.get(7)?,
            homepage: row.get(8)?,
            dependencies: row.get(9)?,
            synced_at: row.get(10)?,
        })
    }
}

/// Split `libfoo>=1.2` into (`libfoo`, `>=1.2`)
fn parse_dependency(spec: &str) -> Result<(String, Option<String>)> {
    let spec = spec.trim();
    let split = spec.find(['<', '>', '=']).unwrap_or(spec.len());
    let name = spec[..split].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(Error::ParseError(format!("Invalid dependency: {:?}", spec)));
    }
    let constraint = spec[split..].trim();
    Ok((
        name.to_string(),
        (!constraint.is_empty()).then(|| constraint.to_string()),
    ))
}
