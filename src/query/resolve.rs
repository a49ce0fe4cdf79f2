// src/query/resolve.rs

//! Direct lookup of package names, bypassing a full scan

use super::{Info, PackageEvent};
use crate::db::traits::{PackageDatabase, RawPackage};
use crate::error::Result;
use crate::filter::{FilterChain, FilterSpec};
use crate::package::{PackageRecord, normalize};
use tracing::{debug, warn};

/// Resolve each name against the installed set or the repository pool
///
/// Names are processed in order and independently. A name is looked up in
/// the installed set when `installed` is requested, or when no installed bit
/// is requested and the name is installed; otherwise in the pool. Misses are
/// skipped silently. Hits must pass the architecture filters.
pub fn resolve<'a, D>(
    db: &'a D,
    names: &'a [String],
    spec: FilterSpec,
) -> impl Iterator<Item = PackageEvent> + 'a
where
    D: PackageDatabase + ?Sized,
{
    let chain = FilterChain::new(spec, db.native_arch());
    names
        .iter()
        .filter_map(move |name| resolve_one(db, name, &chain))
}

fn resolve_one<D>(db: &D, name: &str, chain: &FilterChain<'_>) -> Option<PackageEvent>
where
    D: PackageDatabase + ?Sized,
{
    let spec = chain.spec();
    let installed = db.is_installed(name).unwrap_or_else(|err| {
        warn!("Failed to check installed state of {}: {}", name, err);
        false
    });

    let (info, lookup): (Info, Result<Option<RawPackage>>) =
        if spec.installed || (!spec.not_installed && installed) {
            (Info::Installed, db.installed_package(name))
        } else {
            (Info::Available, db.repository_package(name))
        };

    let raw = match lookup {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("{} not found as {}, skipping", name, info);
            return None;
        }
        Err(err) => {
            warn!("Failed to look up {}: {}", name, err);
            return None;
        }
    };
    raw.pkgver.as_ref()?;

    // Name comes from the record's pkgver, label from its own origin
    let record = PackageRecord::new(normalize(&raw, None), &raw);
    chain
        .admits(&record)
        .then(|| PackageEvent::from_record(info, record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageId;
    use crate::test_support::{FakeDatabase, raw};

    const REPO: &str = "https://repo.example.org/current";

    fn db() -> FakeDatabase {
        FakeDatabase::new("x86_64")
            .with_installed(raw("foo", "1.0_1", "x86_64", "https://old.example.org/legacy", "foo"))
            .with_repository(
                REPO,
                vec![
                    raw("foo", "1.1_1", "x86_64", REPO, "foo"),
                    raw("bar-utils", "2.0_1", "noarch", REPO, "bar"),
                ],
            )
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_prefers_installed_by_default() {
        let db = db();
        let names = names(&["foo", "bar-utils"]);
        let events: Vec<_> = resolve(&db, &names, FilterSpec::NONE).collect();

        assert_eq!(
            events,
            vec![
                PackageEvent::new(
                    Info::Installed,
                    PackageId::new("foo", "1.0_1", "x86_64", "legacy"),
                    "foo"
                ),
                PackageEvent::new(
                    Info::Available,
                    PackageId::new("bar-utils", "2.0_1", "noarch", "current"),
                    "bar"
                ),
            ]
        );
    }

    #[test]
    fn test_resolve_not_installed_uses_pool() {
        let db = db();
        let names = names(&["foo"]);
        let spec: FilterSpec = "~installed".parse().unwrap();
        let events: Vec<_> = resolve(&db, &names, spec).collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].info, Info::Available);
        assert_eq!(events[0].id.version, "1.1_1");
    }

    #[test]
    fn test_resolve_installed_filter_misses_are_skipped() {
        let db = db();
        let names = names(&["bar-utils", "foo"]);
        let spec: FilterSpec = "installed".parse().unwrap();
        let events: Vec<_> = resolve(&db, &names, spec).collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.name, "foo");
    }

    #[test]
    fn test_resolve_skips_unknown_names() {
        let db = db();
        let names = names(&["nope", "foo", "also-nope"]);
        let events: Vec<_> = resolve(&db, &names, FilterSpec::NONE).collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_resolve_arch_filter_drops_without_substitution() {
        let db = db();
        let names = names(&["bar-utils"]);
        let spec: FilterSpec = "arch".parse().unwrap();
        assert_eq!(resolve(&db, &names, spec).count(), 0);
    }
}
