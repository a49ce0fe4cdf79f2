// src/repository/mod.rs

//! Repository management and index synchronization
//!
//! This module provides functionality for:
//! - Managing configured package repositories
//! - Synchronizing repository indexes into the database
//!
//! A repository is a directory holding an `index.json`. Its URL is either a
//! plain filesystem path or a `file://` URL.

use crate::db::models::{Repository, RepositoryPackage};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// File name of a repository index
pub const INDEX_FILE: &str = "index.json";

/// Repository index format (simple JSON index)
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub packages: Vec<PackageMetadata>,
}

/// Package entry in a repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub installed_size: Option<i64>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

/// Directory a repository URL points at
pub fn repository_dir(url: &str) -> Result<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        return Err(Error::SourceUnavailable(format!(
            "Unsupported repository URL: {}",
            url
        )));
    }
    Ok(PathBuf::from(url))
}

/// Read and parse the index of the repository at `url`
pub fn fetch_metadata(url: &str) -> Result<RepositoryMetadata> {
    let index_path = repository_dir(url)?.join(INDEX_FILE);
    debug!("Reading repository index {}", index_path.display());

    let content = fs::read_to_string(&index_path).map_err(|e| {
        Error::SourceUnavailable(format!("Failed to read {}: {}", index_path.display(), e))
    })?;

    let metadata: RepositoryMetadata = serde_json::from_str(&content).map_err(|e| {
        Error::ParseError(format!("Invalid index {}: {}", index_path.display(), e))
    })?;

    debug!("Index {} lists {} packages", metadata.name, metadata.packages.len());
    Ok(metadata)
}

/// Synchronize repository metadata with the database
///
/// Replaces every indexed package of the repository atomically.
pub fn sync_repository(conn: &Connection, repo: &mut Repository) -> Result<usize> {
    info!("Synchronizing repository: {}", repo.name);

    let repo_id = repo
        .id
        .ok_or_else(|| Error::InitError("Cannot sync repository without ID".to_string()))?;
    let metadata = fetch_metadata(&repo.url)?;

    let tx = conn.unchecked_transaction()?;
    RepositoryPackage::delete_by_repository(&tx, repo_id)?;

    let mut count = 0;
    for pkg_meta in metadata.packages {
        let mut repo_pkg = RepositoryPackage::new(repo_id, pkg_meta.name, pkg_meta.version);
        repo_pkg.architecture = pkg_meta.architecture;
        repo_pkg.description = pkg_meta.description;
        repo_pkg.installed_size = pkg_meta.installed_size;
        repo_pkg.license = pkg_meta.license;
        repo_pkg.homepage = pkg_meta.homepage;
        repo_pkg.set_dependencies(pkg_meta.dependencies.as_deref().unwrap_or_default())?;

        repo_pkg.insert(&tx)?;
        count += 1;
    }

    repo.last_sync = Some(current_timestamp());
    repo.update(&tx)?;
    tx.commit()?;

    info!("Synchronized {} packages from repository {}", count, repo.name);
    Ok(count)
}

/// Synchronize every enabled repository whose index is stale, or all of them with `force`
///
/// Returns the number of packages indexed during this run. A repository that
/// fails to sync does not stop the others; the first failure is returned
/// once every repository has been tried.
pub fn sync_all(conn: &Connection, force: bool) -> Result<usize> {
    let repos = Repository::list_enabled(conn)?;
    if repos.is_empty() {
        return Err(Error::SourceUnavailable("No repositories set up".to_string()));
    }

    let mut total = 0;
    let mut first_error = None;
    for mut repo in repos {
        if !force && !needs_sync(&repo) {
            debug!("Repository {} is up to date", repo.name);
            continue;
        }
        match sync_repository(conn, &mut repo) {
            Ok(count) => total += count,
            Err(e) => {
                warn!("Failed to sync repository {}: {}", repo.name, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total),
    }
}

/// Check if repository metadata needs refresh
pub fn needs_sync(repo: &Repository) -> bool {
    match &repo.last_sync {
        None => true,
        Some(last_sync) => match parse_timestamp(last_sync) {
            Ok(last_sync_time) => {
                let age_seconds = Utc::now().timestamp().saturating_sub(last_sync_time);
                age_seconds > i64::from(repo.metadata_expire)
            }
            // Unparseable timestamp forces a sync
            Err(_) => true,
        },
    }
}

/// Get current timestamp as RFC 3339 string
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp to Unix seconds
pub fn parse_timestamp(timestamp: &str) -> Result<i64> {
    let dt = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::ParseError(format!("Invalid timestamp: {}", e)))?;

    Ok(dt.timestamp())
}

/// Add a new repository to the database
pub fn add_repository(
    conn: &Connection,
    name: String,
    url: String,
    enabled: bool,
    priority: i32,
) -> Result<Repository> {
    if Repository::find_by_name(conn, &name)?.is_some() {
        return Err(Error::ConflictError(format!(
            "Repository '{}' already exists",
            name
        )));
    }
    repository_dir(&url)?;

    let mut repo = Repository::new(name, url);
    repo.enabled = enabled;
    repo.priority = priority;

    repo.insert(conn)?;

    info!("Added repository: {} ({})", repo.name, repo.url);
    Ok(repo)
}

fn find_repository(conn: &Connection, name: &str) -> Result<Repository> {
    Repository::find_by_name(conn, name)?
        .ok_or_else(|| Error::NotFoundError(format!("Repository '{}' not found", name)))
}

/// Remove a repository and its indexed packages
pub fn remove_repository(conn: &Connection, name: &str) -> Result<()> {
    let repo = find_repository(conn, name)?;
    if let Some(id) = repo.id {
        Repository::delete(conn, id)?;
    }
    info!("Removed repository: {}", name);
    Ok(())
}

/// Enable or disable a repository
pub fn set_repository_enabled(conn: &Connection, name: &str, enabled: bool) -> Result<()> {
    let mut repo = find_repository(conn, name)?;

    repo.enabled = enabled;
    repo.update(conn)?;

    info!(
        "Repository '{}' {}",
        name,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
