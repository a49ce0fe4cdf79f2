// src/query/updates.rs

//! Installed packages with a strictly newer repository version

use super::{Info, PackageEvent};
use crate::db::traits::{PackageDatabase, RawPackage};
use crate::error::Result;
use crate::package::{normalize, repository_label, split_pkgver};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Pair every installed package with its best repository counterpart
///
/// The candidate carries the repository package's metadata but the installed
/// package's origin label. Local-only packages never produce candidates.
pub fn detect_updates<'a, D>(db: &'a D) -> Result<impl Iterator<Item = PackageEvent> + 'a>
where
    D: PackageDatabase + ?Sized,
{
    Ok(db
        .installed()?
        .filter_map(move |local| update_candidate(db, &local)))
}

fn update_candidate<D>(db: &D, local: &RawPackage) -> Option<PackageEvent>
where
    D: PackageDatabase + ?Sized,
{
    let remote = match db.repository_package(&local.key) {
        Ok(Some(remote)) => remote,
        Ok(None) => return None,
        Err(err) => {
            warn!("Failed to look up {} in repositories: {}", local.key, err);
            return None;
        }
    };

    let (_, installed_version) = split_pkgver(local.pkgver.as_deref()?);
    let (_, remote_version) = split_pkgver(remote.pkgver.as_deref()?);
    if db.compare_versions(installed_version, remote_version) != Ordering::Less {
        return None;
    }

    debug!(
        "Update for {}: {} -> {}",
        local.key, installed_version, remote_version
    );
    let id = normalize(&remote, Some(local.key.as_str()))
        .with_repository(repository_label(local.repository.as_deref()));
    let summary = remote.short_desc.clone().unwrap_or_default();
    Some(PackageEvent::new(Info::Normal, id, summary))
}
