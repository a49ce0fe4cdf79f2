// src/config.rs

//! Engine configuration

use std::path::PathBuf;

/// Default location of the package database
pub const DEFAULT_DB_PATH: &str = "/var/lib/pkcore/pkcore.db";

/// Architecture this binary was built for
pub fn native_arch() -> &'static str {
    std::env::consts::ARCH
}

/// Where the database lives and how the system identifies itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub db_path: String,
    /// Advisory lock file, `<db_path>.lock` unless overridden
    pub lock_path: PathBuf,
    pub native_arch: String,
    /// The package manager's own package; its updates block other installs
    pub core_package: Option<String>,
}

impl EngineConfig {
    pub fn new(db_path: impl Into<String>) -> Self {
        let db_path = db_path.into();
        let lock_path = PathBuf::from(format!("{}.lock", db_path));
        Self {
            db_path,
            lock_path,
            native_arch: native_arch().to_string(),
            core_package: None,
        }
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.native_arch = arch.into();
        self
    }

    pub fn with_core_package(mut self, name: Option<String>) -> Self {
        self.core_package = name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DB_PATH)
    }
}
