// src/backend.rs

//! Operations exposed to the host runtime
//!
//! Each operation reports through a `JobSink`: package notifications, at most
//! one error, then exactly one finished signal. Queries never take the
//! database lock; install, remove and update run a full transaction.

use crate::db::traits::PackageDatabase;
use crate::error::{ErrorKind, JobError, Result};
use crate::filter::{FilterSpec, SearchTerms};
use crate::job::{Job, JobSink};
use crate::package::PackageId;
use crate::query::{self, PackageEvent};
use crate::transaction::{self, Intent, codes};
use tracing::{debug, info};

fn report<S, I>(job: &mut Job<'_, S>, operation: &str, events: Result<I>)
where
    S: JobSink + ?Sized,
    I: Iterator<Item = PackageEvent>,
{
    match events {
        Ok(events) => {
            let count = job.packages(events);
            debug!("{}: {} packages", operation, count);
        }
        Err(e) => job.error(&JobError::new(
            ErrorKind::InternalError,
            format!("Failed to read package database: {}", e),
        )),
    }
}

fn run_transaction<D, S>(db: &mut D, intents: &[Intent], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let mut job = Job::new(sink);
    match transaction::execute(db, intents) {
        Ok(()) => info!("Transaction of {} intents completed", intents.len()),
        Err(e) => job.error(&e),
    }
    job.finish();
}

/// Every package matching `spec`, installed ones first
pub fn get_packages<D, S>(db: &D, spec: FilterSpec, sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let mut job = Job::new(sink);
    report(&mut job, "get-packages", query::enumerate(db, spec, None));
    job.finish();
}

/// Packages whose name contains every term
pub fn search_names<D, S>(db: &D, spec: FilterSpec, terms: &[String], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let terms = SearchTerms::names(terms);
    let mut job = Job::new(sink);
    report(&mut job, "search-name", query::enumerate(db, spec, Some(&terms)));
    job.finish();
}

/// Packages whose name or description contains every term
pub fn search_details<D, S>(db: &D, spec: FilterSpec, terms: &[String], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let terms = SearchTerms::details(terms);
    let mut job = Job::new(sink);
    report(&mut job, "search-details", query::enumerate(db, spec, Some(&terms)));
    job.finish();
}

pub fn resolve<D, S>(db: &D, spec: FilterSpec, names: &[String], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let mut job = Job::new(sink);
    report(&mut job, "resolve", Ok(query::resolve(db, names, spec)));
    job.finish();
}

/// Installed packages with a newer repository version
///
/// Filters are accepted for interface compatibility and not applied.
pub fn get_updates<D, S>(db: &D, spec: FilterSpec, sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    debug!("get-updates ignores filters ({})", spec);
    let mut job = Job::new(sink);
    report(&mut job, "get-updates", query::detect_updates(db));
    job.finish();
}

/// Synchronize repository indexes
pub fn refresh_cache<D, S>(db: &mut D, force: bool, sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let mut job = Job::new(sink);
    match db.sync_repositories(force) {
        Ok(count) => info!("Repository indexes refreshed ({} packages)", count),
        Err(code) => job.error(&codes::sync_error(&code)),
    }
    job.finish();
}

/// Install exactly the given package versions
pub fn install_packages<D, S>(db: &mut D, ids: &[PackageId], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let intents: Vec<Intent> = ids.iter().cloned().map(Intent::Install).collect();
    run_transaction(db, &intents, sink);
}

/// Remove packages, optionally together with everything that depends on them
pub fn remove_packages<D, S>(
    db: &mut D,
    ids: &[PackageId],
    allow_dependents: bool,
    autoremove: bool,
    sink: &mut S,
) where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let intents: Vec<Intent> = ids
        .iter()
        .map(|id| Intent::Remove {
            name: id.name.clone(),
            autoremove,
            allow_dependents,
        })
        .collect();
    run_transaction(db, &intents, sink);
}

/// Update packages to their newest repository version
pub fn update_packages<D, S>(db: &mut D, ids: &[PackageId], sink: &mut S)
where
    D: PackageDatabase + ?Sized,
    S: JobSink + ?Sized,
{
    let intents: Vec<Intent> = ids
        .iter()
        .map(|id| Intent::Update(id.name.clone()))
        .collect();
    run_transaction(db, &intents, sink);
}
