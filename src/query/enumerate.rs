// src/query/enumerate.rs

//! Full scan of the installed set followed by the repository pool
//!
//! Installed packages are always emitted before available ones. A package
//! identity is emitted at most once per call.

use super::{Info, PackageEvent};
use crate::db::traits::{PackageDatabase, RawPackage, RepositorySource};
use crate::error::Result;
use crate::filter::{FilterChain, FilterSpec, SearchTerms};
use crate::package::{PackageRecord, normalize, repository_label};
use std::collections::HashSet;
use std::iter;
use tracing::{debug, warn};

type Events<'a> = Box<dyn Iterator<Item = PackageEvent> + 'a>;

/// Identities already emitted during one enumeration
#[derive(Debug, Default)]
struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    /// Returns true the first time an identity is offered
    fn insert(&mut self, event: &PackageEvent) -> bool {
        self.seen.insert(event.id.to_string())
    }
}

/// Enumerate packages matching `spec` and the optional search terms
///
/// Setup failures (the pool cannot be listed) are returned as errors before
/// anything is produced. Failures reading a single repository index are
/// logged and that repository is skipped.
pub fn enumerate<'a, D>(
    db: &'a D,
    spec: FilterSpec,
    search: Option<&'a SearchTerms>,
) -> Result<impl Iterator<Item = PackageEvent> + 'a>
where
    D: PackageDatabase + ?Sized,
{
    let chain = FilterChain::new(spec, db.native_arch()).with_search(search);

    let installed: Events<'a> = if spec.wants_installed() {
        Box::new(
            db.installed()?
                .filter_map(move |raw| installed_event(&raw, &chain)),
        )
    } else {
        Box::new(iter::empty())
    };

    let available: Events<'a> = if spec.wants_available() {
        let sources = db.repositories()?;
        Box::new(
            sources
                .into_iter()
                .filter(|source| {
                    if !source.synced {
                        debug!("Skipping repository {} without an index", source.name);
                    }
                    source.synced
                })
                .flat_map(move |source| available_events(db, source, chain)),
        )
    } else {
        Box::new(iter::empty())
    };

    let mut dedup = DedupSet::default();
    Ok(installed
        .chain(available)
        .filter(move |event| dedup.insert(event)))
}

fn installed_event(raw: &RawPackage, chain: &FilterChain<'_>) -> Option<PackageEvent> {
    if raw.pkgver.is_none() {
        debug!("Skipping installed record {} without pkgver", raw.key);
        return None;
    }

    // Installed packages keep the origin they were installed from
    let record = PackageRecord::new(normalize(raw, Some(raw.key.as_str())), raw);
    chain
        .admits(&record)
        .then(|| PackageEvent::from_record(Info::Installed, record))
}

fn available_events<'a, D>(db: &'a D, source: RepositorySource, chain: FilterChain<'a>) -> Events<'a>
where
    D: PackageDatabase + ?Sized,
{
    let records = match db.repository_index(&source) {
        Ok(records) => records,
        Err(err) => {
            warn!("Failed to read index of repository {}: {}", source.name, err);
            return Box::new(iter::empty());
        }
    };

    let label = repository_label(Some(source.uri.as_str())).to_string();
    let explicit_installed = chain.spec().installed;

    Box::new(records.filter_map(move |raw| {
        let pkgver = raw.pkgver.as_deref()?;

        let id = normalize(&raw, Some(raw.key.as_str())).with_repository(label.as_str());
        let record = PackageRecord::new(id, &raw);
        if !chain.admits(&record) {
            return None;
        }

        // An installed package is not also offered as available
        if !explicit_installed && is_installed(db, pkgver) {
            return None;
        }

        Some(PackageEvent::from_record(Info::Available, record))
    }))
}

fn is_installed<D>(db: &D, pkgver: &str) -> bool
where
    D: PackageDatabase + ?Sized,
{
    db.is_installed(pkgver).unwrap_or_else(|err| {
        warn!("Failed to check installed state of {}: {}", pkgver, err);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageId;
    use crate::test_support::{FakeDatabase, raw};

    const REPO: &str = "https://repo.example.org/current";

    fn collect(db: &FakeDatabase, spec: FilterSpec, search: Option<&SearchTerms>) -> Vec<PackageEvent> {
        enumerate(db, spec, search).unwrap().collect()
    }

    fn scenario_db() -> FakeDatabase {
        FakeDatabase::new("x86_64")
            .with_installed(raw("A", "1.0", "x86_64", REPO, "package a"))
            .with_repository(
                REPO,
                vec![
                    raw("A", "1.0", "x86_64", REPO, "package a"),
                    raw("B", "2.0", "x86_64", REPO, "package b"),
                ],
            )
    }

    #[test]
    fn test_default_filters_installed_then_available() {
        let events = collect(&scenario_db(), FilterSpec::NONE, None);

        assert_eq!(
            events,
            vec![
                PackageEvent::new(
                    Info::Installed,
                    PackageId::new("A", "1.0", "x86_64", "current"),
                    "package a"
                ),
                PackageEvent::new(
                    Info::Available,
                    PackageId::new("B", "2.0", "x86_64", "current"),
                    "package b"
                ),
            ]
        );
    }

    #[test]
    fn test_installed_precede_available() {
        let db = scenario_db()
            .with_installed(raw("C", "3.0", "x86_64", REPO, ""))
            .with_repository("https://mirror.example.org/extra", vec![raw("D", "1.0", "x86_64", "", "")]);
        let events = collect(&db, FilterSpec::NONE, None);

        let first_available = events
            .iter()
            .position(|e| e.info == Info::Available)
            .unwrap();
        assert!(events[..first_available].iter().all(|e| e.info == Info::Installed));
        assert!(events[first_available..].iter().all(|e| e.info == Info::Available));
    }

    #[test]
    fn test_duplicate_identities_are_suppressed() {
        // The same package listed by two repositories with the same label
        let db = FakeDatabase::new("x86_64")
            .with_repository(REPO, vec![raw("B", "2.0", "x86_64", REPO, "")])
            .with_repository("https://mirror.example.org/current", vec![raw("B", "2.0", "x86_64", "", "")]);
        let events = collect(&db, FilterSpec::NONE, None);

        assert_eq!(events.len(), 1);
        let ids: HashSet<String> = events.iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids.len(), events.len());
    }

    #[test]
    fn test_installed_only() {
        let spec: FilterSpec = "installed".parse().unwrap();
        let events = collect(&scenario_db(), spec, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].info, Info::Installed);
    }

    #[test]
    fn test_not_installed_only() {
        let spec: FilterSpec = "~installed".parse().unwrap();
        let events = collect(&scenario_db(), spec, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.name, "B");
        assert_eq!(events[0].info, Info::Available);
    }

    #[test]
    fn test_explicit_installed_keeps_available_copy() {
        // With INSTALLED requested explicitly the repository copy is not hidden;
        // it only collapses when its identity matches the installed one exactly.
        let db = FakeDatabase::new("x86_64")
            .with_installed(raw("A", "1.0", "x86_64", "https://old.example.org/legacy", ""))
            .with_repository(REPO, vec![raw("A", "1.0", "x86_64", REPO, "")]);
        let spec: FilterSpec = "installed;~installed".parse().unwrap();
        let events = collect(&db, spec, None);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.repository, "legacy");
        assert_eq!(events[1].id.repository, "current");
        assert_eq!(events[1].info, Info::Available);
    }

    #[test]
    fn test_repository_label_taken_from_pool_entry() {
        let db = FakeDatabase::new("x86_64")
            .with_repository(REPO, vec![raw("B", "2.0", "x86_64", "https://elsewhere/other", "")]);
        let events = collect(&db, FilterSpec::NONE, None);
        assert_eq!(events[0].id.repository, "current");
    }

    #[test]
    fn test_search_names_applied_to_both_phases() {
        let db = scenario_db().with_installed(raw("libfoo", "1.0", "x86_64", REPO, ""));
        let terms = SearchTerms::names(["LIB"]);
        let events = collect(&db, FilterSpec::NONE, Some(&terms));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.name, "libfoo");
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut broken = raw("broken", "1.0", "x86_64", REPO, "");
        broken.pkgver = None;
        let db = scenario_db().with_installed(broken);
        let events = collect(&db, FilterSpec::NONE, None);
        assert!(events.iter().all(|e| e.id.name != "broken"));
    }

    #[test]
    fn test_unsynced_repository_is_skipped() {
        let mut db = scenario_db();
        db.repositories[0].0.synced = false;
        let events = collect(&db, FilterSpec::NONE, None);
        assert!(events.iter().all(|e| e.info == Info::Installed));
    }

    #[test]
    fn test_contradictory_arch_filter_yields_nothing() {
        let spec: FilterSpec = "arch;~arch".parse().unwrap();
        assert!(collect(&scenario_db(), spec, None).is_empty());
    }
}
