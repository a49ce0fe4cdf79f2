// src/db/store.rs

//! SQLite implementation of `PackageDatabase`
//!
//! Staging only records intents in memory. `prepare` turns them into a plan
//! by reading the database, and `commit` applies the plan inside a single
//! SQLite transaction together with an applied changeset.

use super::lock::DatabaseLock;
use super::models::{
    Changeset, ChangesetStatus, DependencyEntry, InstallReason, InstalledPackage, Repository,
    RepositoryPackage,
};
use super::traits::{PackageDatabase, RawPackage, Records, RepositorySource, ReturnCode, Status};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::package::split_pkgver;
use crate::{repository, version};
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A staged intent
#[derive(Debug, Clone)]
enum PendingOp {
    Install(Candidate),
    Update(Candidate),
    Remove { name: String, autoremove: bool },
}

/// A repository package together with the URL of the repository offering it
#[derive(Debug, Clone)]
struct Candidate {
    package: RepositoryPackage,
    url: String,
}

#[derive(Debug, Clone)]
struct PlannedInstall {
    candidate: Candidate,
    /// Requested by the user rather than pulled in
    explicit: bool,
}

/// Result of `prepare`: what `commit` will do
#[derive(Debug, Default)]
struct Plan {
    installs: Vec<PlannedInstall>,
    removals: Vec<String>,
}

impl Plan {
    fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .installs
            .iter()
            .map(|i| format!("install {}-{}", i.candidate.package.name, i.candidate.package.version))
            .collect();
        parts.extend(self.removals.iter().map(|name| format!("remove {}", name)));
        parts.join(", ")
    }
}

fn failed(e: Error) -> ReturnCode {
    ReturnCode::Failed(e.to_string())
}

/// Package database stored in SQLite
pub struct SqliteDatabase {
    conn: Connection,
    native_arch: String,
    core_package: Option<String>,
    lock: DatabaseLock,
    pending: Vec<PendingOp>,
    plan: Option<Plan>,
}

impl SqliteDatabase {
    /// Open the database described by `config`, creating it if needed
    pub fn open(config: &EngineConfig) -> Result<Self> {
        super::init(&config.db_path)?;
        let conn = super::open(&config.db_path)?;
        Ok(Self::with_connection(conn, config))
    }

    pub fn with_connection(conn: Connection, config: &EngineConfig) -> Self {
        Self {
            conn,
            native_arch: config.native_arch.clone(),
            core_package: config.core_package.clone(),
            lock: DatabaseLock::new(config.lock_path.clone()),
            pending: Vec::new(),
            plan: None,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn has_repositories(&self) -> std::result::Result<bool, ReturnCode> {
        Ok(!Repository::list_enabled(&self.conn).map_err(failed)?.is_empty())
    }

    /// Highest version of `name` in enabled repositories; ties go to the first in pool order
    fn best_available(&self, name: &str) -> Result<Option<Candidate>> {
        let mut best: Option<Candidate> = None;
        for (package, url) in RepositoryPackage::find_available(&self.conn, name)? {
            let newer = best.as_ref().is_none_or(|current| {
                version::compare(&package.version, &current.package.version) == Ordering::Greater
            });
            if newer {
                best = Some(Candidate { package, url });
            }
        }
        Ok(best)
    }

    /// Refuse to touch other packages while the core package has a pending update
    fn check_core(&self, target: &str) -> Status {
        let Some(core) = self.core_package.as_deref() else {
            return Ok(());
        };
        if core == target {
            return Ok(());
        }
        let Some(installed) = InstalledPackage::find_by_name(&self.conn, core).map_err(failed)? else {
            return Ok(());
        };
        if let Some(best) = self.best_available(core).map_err(failed)?
            && version::compare(&installed.version, &best.package.version) == Ordering::Less
        {
            info!(
                "{} {} must be updated to {} first",
                core, installed.version, best.package.version
            );
            return Err(ReturnCode::Busy);
        }
        Ok(())
    }

    fn pending_removals(&self) -> HashSet<&str> {
        self.pending
            .iter()
            .filter_map(|op| match op {
                PendingOp::Remove { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn build_plan(&self) -> std::result::Result<Plan, ReturnCode> {
        let mut plan = Plan::default();
        let mut planned: HashMap<String, usize> = HashMap::new();
        let mut removing: HashSet<String> = HashSet::new();

        for op in &self.pending {
            match op {
                PendingOp::Install(candidate) | PendingOp::Update(candidate) => {
                    let explicit = matches!(op, PendingOp::Install(_));
                    let name = &candidate.package.name;
                    if let Some(&idx) = planned.get(name) {
                        let existing = &plan.installs[idx].candidate.package;
                        if existing.version != candidate.package.version {
                            warn!(
                                "Conflicting versions staged for {}: {} and {}",
                                name, existing.version, candidate.package.version
                            );
                            return Err(ReturnCode::Again);
                        }
                        continue;
                    }
                    planned.insert(name.clone(), plan.installs.len());
                    plan.installs.push(PlannedInstall {
                        candidate: candidate.clone(),
                        explicit,
                    });
                }
                PendingOp::Remove { name, autoremove } => {
                    if removing.insert(name.clone()) {
                        plan.removals.push(name.clone());
                    }
                    if *autoremove {
                        self.expand_autoremove(name, &mut removing, &mut plan.removals)
                            .map_err(failed)?;
                    }
                }
            }
        }

        if let Some(name) = plan.removals.iter().find(|name| planned.contains_key(*name)) {
            warn!("{} is staged for both installation and removal", name);
            return Err(ReturnCode::Again);
        }

        self.resolve_dependencies(&mut plan, &mut planned, &removing)?;
        self.check_stranded(&plan, &removing)?;
        Ok(plan)
    }

    /// Add automatically installed dependencies of `name` left without users
    fn expand_autoremove(
        &self,
        name: &str,
        removing: &mut HashSet<String>,
        removals: &mut Vec<String>,
    ) -> Result<()> {
        let mut worklist = vec![name.to_string()];
        while let Some(current) = worklist.pop() {
            let Some(package) = InstalledPackage::find_by_name(&self.conn, &current)? else {
                continue;
            };
            let Some(package_id) = package.id else {
                continue;
            };
            for dep in DependencyEntry::find_by_package(&self.conn, package_id)? {
                let dep_name = dep.depends_on_name;
                if removing.contains(&dep_name) {
                    continue;
                }
                let Some(installed) = InstalledPackage::find_by_name(&self.conn, &dep_name)? else {
                    continue;
                };
                if installed.reason != InstallReason::Automatic {
                    continue;
                }
                let users = DependencyEntry::find_dependents(&self.conn, &dep_name)?;
                if users.iter().all(|user| removing.contains(user)) {
                    debug!("Autoremoving {} (no longer required)", dep_name);
                    removing.insert(dep_name.clone());
                    removals.push(dep_name.clone());
                    worklist.push(dep_name);
                }
            }
        }
        Ok(())
    }

    /// Pull runtime dependencies of planned installs from the pool
    fn resolve_dependencies(
        &self,
        plan: &mut Plan,
        planned: &mut HashMap<String, usize>,
        removing: &HashSet<String>,
    ) -> Status {
        let mut next = 0;
        while next < plan.installs.len() {
            let package = plan.installs[next].candidate.package.clone();
            next += 1;

            let specs = package.dependency_specs().map_err(|e| {
                warn!("{}", e);
                ReturnCode::Unresolvable
            })?;

            for (dep_name, constraint) in specs {
                let accepts = |version: &str| match constraint.as_deref() {
                    None => Ok(true),
                    Some(c) => version::satisfies(version, c).ok_or(ReturnCode::Unresolvable),
                };

                if let Some(&idx) = planned.get(&dep_name) {
                    if accepts(&plan.installs[idx].candidate.package.version)? {
                        continue;
                    }
                    warn!("{} requires {}{}", package.name, dep_name, constraint.as_deref().unwrap_or(""));
                    return Err(ReturnCode::MissingDependency);
                }

                if removing.contains(&dep_name) {
                    warn!("{} requires {}, which is being removed", package.name, dep_name);
                    return Err(ReturnCode::MissingDependency);
                }

                if let Some(installed) =
                    InstalledPackage::find_by_name(&self.conn, &dep_name).map_err(failed)?
                    && accepts(&installed.version)?
                {
                    continue;
                }

                match self.best_available(&dep_name).map_err(failed)? {
                    Some(candidate) if accepts(&candidate.package.version)? => {
                        debug!("Pulling in {} {} for {}", dep_name, candidate.package.version, package.name);
                        planned.insert(dep_name, plan.installs.len());
                        plan.installs.push(PlannedInstall {
                            candidate,
                            explicit: false,
                        });
                    }
                    _ => {
                        warn!(
                            "{} requires {}{}, which is not available",
                            package.name,
                            dep_name,
                            constraint.as_deref().unwrap_or("")
                        );
                        return Err(ReturnCode::MissingDependency);
                    }
                }
            }
        }
        Ok(())
    }

    /// Fail if a removal would leave a remaining package without a dependency
    fn check_stranded(&self, plan: &Plan, removing: &HashSet<String>) -> Status {
        for name in &plan.removals {
            let dependents = DependencyEntry::find_dependents(&self.conn, name).map_err(failed)?;
            if let Some(user) = dependents.iter().find(|user| !removing.contains(*user)) {
                warn!("Removing {} would break {}", name, user);
                return Err(ReturnCode::MissingDependency);
            }
        }
        Ok(())
    }

    fn apply_plan(&mut self, plan: &Plan) -> Result<()> {
        let description = plan.describe();
        super::transaction(&mut self.conn, |tx| {
            let mut changeset = Changeset::new(description);
            let changeset_id = changeset.insert(tx)?;

            for name in &plan.removals {
                if let Some(package) = InstalledPackage::find_by_name(tx, name)?
                    && let Some(id) = package.id
                {
                    InstalledPackage::delete(tx, id)?;
                    debug!("Removed {} {}", name, package.version);
                }
            }

            for planned in &plan.installs {
                let source = &planned.candidate.package;
                let existing = InstalledPackage::find_by_name(tx, &source.name)?;

                let mut package = match &existing {
                    Some(current) => current.clone(),
                    None => InstalledPackage::new(source.name.clone(), source.version.clone()),
                };
                package.version = source.version.clone();
                package.architecture = source.architecture.clone();
                package.description = source.description.clone();
                package.installed_size = source.installed_size;
                package.license = source.license.clone();
                package.homepage = source.homepage.clone();
                package.repository = Some(planned.candidate.url.clone());
                package.installed_by_changeset_id = Some(changeset_id);
                if planned.explicit {
                    package.reason = InstallReason::Explicit;
                } else if existing.is_none() {
                    package.reason = InstallReason::Automatic;
                }

                let package_id = match package.id {
                    Some(id) => {
                        package.update(tx)?;
                        DependencyEntry::delete_by_package(tx, id)?;
                        id
                    }
                    None => package.insert(tx)?,
                };
                for (dep_name, constraint) in source.dependency_specs()? {
                    DependencyEntry::new(package_id, dep_name, constraint).insert(tx)?;
                }
                debug!("Installed {} {}", package.name, package.version);
            }

            changeset.update_status(tx, ChangesetStatus::Applied)?;
            Ok(())
        })
    }
}

fn installed_raw(package: InstalledPackage) -> RawPackage {
    RawPackage {
        pkgver: Some(format!("{}-{}", package.name, package.version)),
        key: package.name,
        architecture: package.architecture,
        repository: package.repository,
        short_desc: package.description,
        installed_size: package.installed_size.and_then(|s| u64::try_from(s).ok()),
        license: package.license,
        homepage: package.homepage,
    }
}

fn repository_raw(package: RepositoryPackage, url: &str) -> RawPackage {
    RawPackage {
        pkgver: Some(format!("{}-{}", package.name, package.version)),
        key: package.name,
        architecture: package.architecture,
        repository: Some(url.to_string()),
        short_desc: package.description,
        installed_size: package.installed_size.and_then(|s| u64::try_from(s).ok()),
        license: package.license,
        homepage: package.homepage,
    }
}

impl PackageDatabase for SqliteDatabase {
    fn native_arch(&self) -> &str {
        &self.native_arch
    }

    fn installed(&self) -> Result<Records<'_>> {
        let packages = InstalledPackage::list_all(&self.conn)?;
        Ok(Box::new(packages.into_iter().map(installed_raw)))
    }

    fn repositories(&self) -> Result<Vec<RepositorySource>> {
        Ok(Repository::list_enabled(&self.conn)?
            .into_iter()
            .filter_map(|repo| {
                Some(RepositorySource {
                    id: repo.id?,
                    synced: repo.last_sync.is_some(),
                    name: repo.name,
                    uri: repo.url,
                })
            })
            .collect())
    }

    fn repository_index(&self, source: &RepositorySource) -> Result<Records<'_>> {
        let packages = RepositoryPackage::find_by_repository(&self.conn, source.id)?;
        let url = source.uri.clone();
        Ok(Box::new(
            packages
                .into_iter()
                .map(move |package| repository_raw(package, &url)),
        ))
    }

    fn installed_package(&self, name: &str) -> Result<Option<RawPackage>> {
        Ok(InstalledPackage::find_by_name(&self.conn, name)?.map(installed_raw))
    }

    fn repository_package(&self, name: &str) -> Result<Option<RawPackage>> {
        Ok(self
            .best_available(name)?
            .map(|c| repository_raw(c.package, &c.url)))
    }

    fn is_installed(&self, pattern: &str) -> Result<bool> {
        if InstalledPackage::find_by_name(&self.conn, pattern)?.is_some() {
            return Ok(true);
        }
        let (name, version) = split_pkgver(pattern);
        if version.is_empty() {
            return Ok(false);
        }
        Ok(InstalledPackage::find_by_name(&self.conn, name)?
            .is_some_and(|package| package.version == version))
    }

    fn reverse_dependencies(&self, name: &str) -> Result<Vec<String>> {
        DependencyEntry::find_dependents(&self.conn, name)
    }

    fn sync_repositories(&mut self, force: bool) -> std::result::Result<usize, ReturnCode> {
        if !self.has_repositories()? {
            return Err(ReturnCode::Unsupported);
        }
        repository::sync_all(&self.conn, force).map_err(failed)
    }

    fn lock(&mut self) -> std::io::Result<()> {
        self.lock.acquire()
    }

    fn unlock(&mut self) {
        self.lock.release();
    }

    fn stage_install(&mut self, pkgver: &str) -> Status {
        if !self.has_repositories()? {
            return Err(ReturnCode::Unsupported);
        }
        let (name, version) = split_pkgver(pkgver);
        if version.is_empty() {
            return Err(ReturnCode::NotFound);
        }
        self.check_core(name)?;
        if self.is_installed(pkgver).map_err(failed)? {
            return Err(ReturnCode::Exists);
        }

        let candidate = RepositoryPackage::find_available(&self.conn, name)
            .map_err(failed)?
            .into_iter()
            .find(|(package, _)| package.version == version)
            .map(|(package, url)| Candidate { package, url })
            .ok_or(ReturnCode::NotFound)?;
        if let Err(e) = candidate.package.dependency_specs() {
            warn!("{}", e);
            return Err(ReturnCode::Unresolvable);
        }

        debug!("Staged install of {}", pkgver);
        self.plan = None;
        self.pending.push(PendingOp::Install(candidate));
        Ok(())
    }

    fn stage_update(&mut self, name: &str) -> Status {
        if !self.has_repositories()? {
            return Err(ReturnCode::Unsupported);
        }
        let installed = InstalledPackage::find_by_name(&self.conn, name)
            .map_err(failed)?
            .ok_or(ReturnCode::NotFound)?;
        self.check_core(name)?;

        let candidate = self
            .best_available(name)
            .map_err(failed)?
            .ok_or(ReturnCode::NotFound)?;
        if version::compare(&installed.version, &candidate.package.version) != Ordering::Less {
            return Err(ReturnCode::Exists);
        }
        if let Err(e) = candidate.package.dependency_specs() {
            warn!("{}", e);
            return Err(ReturnCode::Unresolvable);
        }

        debug!(
            "Staged update of {} {} -> {}",
            name, installed.version, candidate.package.version
        );
        self.plan = None;
        self.pending.push(PendingOp::Update(candidate));
        Ok(())
    }

    fn stage_remove(&mut self, name: &str, autoremove: bool) -> Status {
        if InstalledPackage::find_by_name(&self.conn, name)
            .map_err(failed)?
            .is_none()
        {
            return Err(ReturnCode::NotFound);
        }

        let dependents = DependencyEntry::find_dependents(&self.conn, name).map_err(failed)?;
        let removals = self.pending_removals();
        if let Some(user) = dependents.iter().find(|d| !removals.contains(d.as_str())) {
            debug!("{} is still required by {}", name, user);
            return Err(ReturnCode::Exists);
        }

        debug!("Staged removal of {}", name);
        self.plan = None;
        self.pending.push(PendingOp::Remove {
            name: name.to_string(),
            autoremove,
        });
        Ok(())
    }

    fn prepare(&mut self) -> Status {
        let plan = self.build_plan()?;
        info!(
            "Prepared transaction: {} to install, {} to remove",
            plan.installs.len(),
            plan.removals.len()
        );
        self.plan = Some(plan);
        Ok(())
    }

    fn commit(&mut self) -> Status {
        if !self.lock.is_held() {
            warn!("Commit attempted without holding the database lock");
            return Err(ReturnCode::Invalid);
        }
        let plan = self.plan.take().ok_or(ReturnCode::Invalid)?;
        self.apply_plan(&plan).map_err(failed)?;
        self.pending.clear();
        info!("Committed: {}", plan.describe());
        Ok(())
    }

    fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!("Discarding {} staged operations", self.pending.len());
        }
        self.pending.clear();
        self.plan = None;
    }
}
