// src/package/id.rs

//! Package identity tuple and its wire form
//!
//! The host exchanges packages as `name;version;arch;repository`. Building
//! and parsing use the same separator so `parse(build(x)) == x` for any
//! fields that do not themselves contain `;`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Separator between the four identity fields
pub const ID_SEPARATOR: char = ';';

/// (name, version, architecture, repository label) naming one package instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub repository: String,
}

impl PackageId {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
            repository: repository.into(),
        }
    }

    /// Version-qualified name (`name-version`) used by the database
    pub fn pkgver(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Replace the repository label
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.name,
            self.version,
            self.arch,
            self.repository,
            sep = ID_SEPARATOR
        )
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(ID_SEPARATOR).collect();
        match fields.as_slice() {
            [name, version, arch, repository] if !name.is_empty() => {
                Ok(Self::new(*name, *version, *arch, *repository))
            }
            _ => Err(Error::InvalidPackageId(s.to_string())),
        }
    }
}
