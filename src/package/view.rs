// src/package/view.rs

//! Normalized view over a raw database record

use super::id::PackageId;
use crate::db::traits::RawPackage;

/// Label of a repository: the last path segment of its URI
///
/// `https://repo.example.org/current/nonfree` gives `nonfree`. A missing URI,
/// or one without any `/`, gives an empty label.
pub fn repository_label(uri: Option<&str>) -> &str {
    uri.and_then(|uri| uri.rfind('/').map(|idx| &uri[idx + 1..]))
        .unwrap_or("")
}

/// Split a version-qualified name into (name, version)
///
/// The boundary is the last `-` whose suffix looks like a version (contains
/// a digit). Without such a boundary the whole string is the name.
pub fn split_pkgver(pkgver: &str) -> (&str, &str) {
    match pkgver.rfind('-') {
        Some(idx) if pkgver[idx + 1..].chars().any(|c| c.is_ascii_digit()) => {
            (&pkgver[..idx], &pkgver[idx + 1..])
        }
        _ => (pkgver, ""),
    }
}

/// Build the identity of a raw record
///
/// The bare name is `known_name` when given, otherwise derived from the
/// record's `pkgver`. The repository label comes from the record's own source
/// URI. Never fails: missing fields become empty strings.
pub fn normalize(raw: &RawPackage, known_name: Option<&str>) -> PackageId {
    let pkgver = raw.pkgver.as_deref().unwrap_or("");
    let (derived_name, version) = split_pkgver(pkgver);
    let name = known_name.unwrap_or(derived_name);

    PackageId::new(
        name,
        version,
        raw.architecture.as_deref().unwrap_or(""),
        repository_label(raw.repository.as_deref()),
    )
}

/// A normalized record, borrowed for one enumeration step
#[derive(Debug, Clone)]
pub struct PackageRecord<'a> {
    pub id: PackageId,
    raw: &'a RawPackage,
}

impl<'a> PackageRecord<'a> {
    pub fn new(id: PackageId, raw: &'a RawPackage) -> Self {
        Self { id, raw }
    }

    pub fn summary(&self) -> &'a str {
        self.raw.short_desc.as_deref().unwrap_or("")
    }
}
