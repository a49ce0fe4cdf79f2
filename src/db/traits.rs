// src/db/traits.rs

//! Interface between the query/transaction engine and the package database
//!
//! Everything the engine knows about installed packages, repositories,
//! locking and staging goes through `PackageDatabase`. The engine never
//! holds a global handle: every operation takes the database by reference.

use crate::error::Result;
use crate::version;
use std::cmp::Ordering;
use std::fmt;

/// A package record as the database stores it
///
/// Only `key` is guaranteed. Missing fields stay `None` and are turned into
/// empty strings by the package view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPackage {
    /// Dictionary key: the bare package name
    pub key: String,
    /// Version-qualified name, `name-version`
    pub pkgver: Option<String>,
    pub architecture: Option<String>,
    /// Source URI the package was installed from or is offered by
    pub repository: Option<String>,
    pub short_desc: Option<String>,
    pub installed_size: Option<u64>,
    pub license: Option<String>,
    pub homepage: Option<String>,
}

/// One configured repository in the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySource {
    pub id: i64,
    pub name: String,
    pub uri: String,
    /// False until the index has been fetched at least once
    pub synced: bool,
}

/// Lazy sequence of records
pub type Records<'a> = Box<dyn Iterator<Item = RawPackage> + 'a>;

/// Low-level failure codes returned by staging, prepare and commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnCode {
    /// The package manager itself has a pending update
    Busy,
    /// Target already installed / already current / still required
    Exists,
    NotFound,
    /// No repositories configured
    Unsupported,
    /// Dependency metadata cannot be interpreted
    Unresolvable,
    /// Staged packages conflict
    Again,
    Invalid,
    /// A dependency cannot be satisfied
    MissingDependency,
    NoSpace,
    /// Storage failure with a message
    Failed(String),
    /// Any other raw code
    Other(i32),
}

impl ReturnCode {
    /// errno-style value of this code
    pub fn raw(&self) -> i32 {
        match self {
            ReturnCode::NotFound => 2,
            ReturnCode::Unresolvable => 6,
            ReturnCode::Again => 11,
            ReturnCode::Busy => 16,
            ReturnCode::Exists => 17,
            ReturnCode::MissingDependency => 19,
            ReturnCode::Invalid => 22,
            ReturnCode::NoSpace => 28,
            ReturnCode::Unsupported => 95,
            ReturnCode::Failed(_) => -1,
            ReturnCode::Other(code) => *code,
        }
    }

    /// Map an errno-style value back to a code
    pub fn from_raw(code: i32) -> Self {
        match code {
            2 => ReturnCode::NotFound,
            6 => ReturnCode::Unresolvable,
            11 => ReturnCode::Again,
            16 => ReturnCode::Busy,
            17 => ReturnCode::Exists,
            // ENOEXEC and ENODEV both mean unsatisfiable dependencies
            8 | 19 => ReturnCode::MissingDependency,
            22 => ReturnCode::Invalid,
            28 => ReturnCode::NoSpace,
            95 => ReturnCode::Unsupported,
            other => ReturnCode::Other(other),
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnCode::Failed(msg) => write!(f, "{}", msg),
            other => write!(f, "code {}", other.raw()),
        }
    }
}

/// Outcome of a staging or transaction primitive
pub type Status = std::result::Result<(), ReturnCode>;

/// The package database and repository pool
pub trait PackageDatabase {
    /// Architecture of the running system
    fn native_arch(&self) -> &str;

    /// Every installed package, in database order
    fn installed(&self) -> Result<Records<'_>>;

    /// The configured repository pool, in pool order
    fn repositories(&self) -> Result<Vec<RepositorySource>>;

    /// Every package in one repository's index, in index order
    fn repository_index(&self, source: &RepositorySource) -> Result<Records<'_>>;

    /// Installed package with this exact name
    fn installed_package(&self, name: &str) -> Result<Option<RawPackage>>;

    /// Best (highest version) package with this name across the pool
    fn repository_package(&self, name: &str) -> Result<Option<RawPackage>>;

    /// Whether `pattern` (a name or a `name-version`) is installed
    fn is_installed(&self, pattern: &str) -> Result<bool>;

    /// Package version ordering
    fn compare_versions(&self, left: &str, right: &str) -> Ordering {
        version::compare(left, right)
    }

    /// Names of installed packages that directly depend on `name`
    fn reverse_dependencies(&self, name: &str) -> Result<Vec<String>>;

    /// Refresh repository indexes, returning the number of packages indexed
    fn sync_repositories(&mut self, force: bool) -> std::result::Result<usize, ReturnCode>;

    /// Take the exclusive database lock without waiting
    fn lock(&mut self) -> std::io::Result<()>;

    /// Release the database lock
    fn unlock(&mut self);

    /// Stage installation of exactly `name-version`
    fn stage_install(&mut self, pkgver: &str) -> Status;

    /// Stage an update of `name` to the newest repository version
    fn stage_update(&mut self, name: &str) -> Status;

    /// Stage removal of `name`
    fn stage_remove(&mut self, name: &str, autoremove: bool) -> Status;

    /// Resolve staged intents into a complete plan without touching the system
    fn prepare(&mut self) -> Status;

    /// Execute the prepared plan
    fn commit(&mut self) -> Status;

    /// Drop staged intents and any prepared plan
    fn discard(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_raw_round_trip() {
        let codes = [
            ReturnCode::NotFound,
            ReturnCode::Unresolvable,
            ReturnCode::Again,
            ReturnCode::Busy,
            ReturnCode::Exists,
            ReturnCode::MissingDependency,
            ReturnCode::Invalid,
            ReturnCode::NoSpace,
            ReturnCode::Unsupported,
            ReturnCode::Other(42),
        ];
        for code in codes {
            assert_eq!(ReturnCode::from_raw(code.raw()), code);
        }
        assert_eq!(ReturnCode::from_raw(8), ReturnCode::MissingDependency);
    }

    #[test]
    fn test_return_code_display() {
        assert_eq!(ReturnCode::Exists.to_string(), "code 17");
        assert_eq!(ReturnCode::Failed("disk error".into()).to_string(), "disk error");
    }
}
