// src/test_support.rs

//! In-memory `PackageDatabase` used by unit tests

use crate::db::traits::{PackageDatabase, RawPackage, Records, RepositorySource, ReturnCode, Status};
use crate::error::Result;
use crate::package::split_pkgver;
use crate::version;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Build a raw record
pub fn raw(name: &str, version: &str, arch: &str, repo_uri: &str, desc: &str) -> RawPackage {
    RawPackage {
        key: name.to_string(),
        pkgver: Some(format!("{}-{}", name, version)),
        architecture: Some(arch.to_string()),
        repository: Some(repo_uri.to_string()),
        short_desc: Some(desc.to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct FakeDatabase {
    pub native_arch: String,
    pub installed: Vec<RawPackage>,
    pub repositories: Vec<(RepositorySource, Vec<RawPackage>)>,
    pub revdeps: HashMap<String, Vec<String>>,

    /// Another process holds the lock
    pub lock_contended: bool,
    pub lock_calls: usize,
    pub unlock_calls: usize,
    pub discard_calls: usize,

    /// Staging failures keyed by the pkgver or name passed in
    pub stage_failures: HashMap<String, ReturnCode>,
    pub prepare_result: Option<ReturnCode>,
    pub commit_result: Option<ReturnCode>,
    pub sync_result: Option<ReturnCode>,

    /// Every successful staging call, in order (`install:foo-1.0`, ...)
    pub staged: Vec<String>,
    pub prepared: bool,
    /// Staged entries that reached a successful commit
    pub committed: Vec<String>,
}

impl FakeDatabase {
    pub fn new(native_arch: &str) -> Self {
        Self {
            native_arch: native_arch.to_string(),
            ..Default::default()
        }
    }

    pub fn with_installed(mut self, package: RawPackage) -> Self {
        self.installed.push(package);
        self
    }

    pub fn with_repository(mut self, uri: &str, packages: Vec<RawPackage>) -> Self {
        let id = self.repositories.len() as i64 + 1;
        let source = RepositorySource {
            id,
            name: format!("repo{}", id),
            uri: uri.to_string(),
            synced: true,
        };
        self.repositories.push((source, packages));
        self
    }

    pub fn with_revdeps(mut self, name: &str, dependents: &[&str]) -> Self {
        self.revdeps.insert(
            name.to_string(),
            dependents.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    fn stage(&mut self, action: &str, target: &str) -> Status {
        if let Some(code) = self.stage_failures.get(target) {
            return Err(code.clone());
        }
        self.staged.push(format!("{}:{}", action, target));
        Ok(())
    }
}

impl PackageDatabase for FakeDatabase {
    fn native_arch(&self) -> &str {
        &self.native_arch
    }

    fn installed(&self) -> Result<Records<'_>> {
        Ok(Box::new(self.installed.iter().cloned()))
    }

    fn repositories(&self) -> Result<Vec<RepositorySource>> {
        Ok(self.repositories.iter().map(|(s, _)| s.clone()).collect())
    }

    fn repository_index(&self, source: &RepositorySource) -> Result<Records<'_>> {
        let packages = self
            .repositories
            .iter()
            .find(|(s, _)| s.id == source.id)
            .map(|(_, p)| p.clone())
            .unwrap_or_default();
        Ok(Box::new(packages.into_iter()))
    }

    fn installed_package(&self, name: &str) -> Result<Option<RawPackage>> {
        Ok(self.installed.iter().find(|p| p.key == name).cloned())
    }

    fn repository_package(&self, name: &str) -> Result<Option<RawPackage>> {
        let mut best: Option<&RawPackage> = None;
        for package in self.repositories.iter().flat_map(|(_, p)| p.iter()) {
            if package.key != name {
                continue;
            }
            let newer = match best {
                None => true,
                Some(current) => {
                    let (_, v) = split_pkgver(package.pkgver.as_deref().unwrap_or(""));
                    let (_, cur) = split_pkgver(current.pkgver.as_deref().unwrap_or(""));
                    version::compare(v, cur) == Ordering::Greater
                }
            };
            if newer {
                best = Some(package);
            }
        }
        Ok(best.cloned())
    }

    fn is_installed(&self, pattern: &str) -> Result<bool> {
        Ok(self
            .installed
            .iter()
            .any(|p| p.key == pattern || p.pkgver.as_deref() == Some(pattern)))
    }

    fn reverse_dependencies(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.revdeps.get(name).cloned().unwrap_or_default())
    }

    fn sync_repositories(&mut self, _force: bool) -> std::result::Result<usize, ReturnCode> {
        if let Some(code) = self.sync_result.clone() {
            return Err(code);
        }
        if self.repositories.is_empty() {
            return Err(ReturnCode::Unsupported);
        }
        Ok(self.repositories.iter().map(|(_, p)| p.len()).sum())
    }

    fn lock(&mut self) -> std::io::Result<()> {
        self.lock_calls += 1;
        if self.lock_contended {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "held by another process",
            ));
        }
        Ok(())
    }

    fn unlock(&mut self) {
        self.unlock_calls += 1;
    }

    fn stage_install(&mut self, pkgver: &str) -> Status {
        self.stage("install", pkgver)
    }

    fn stage_update(&mut self, name: &str) -> Status {
        self.stage("update", name)
    }

    fn stage_remove(&mut self, name: &str, _autoremove: bool) -> Status {
        self.stage("remove", name)
    }

    fn prepare(&mut self) -> Status {
        if let Some(code) = self.prepare_result.clone() {
            return Err(code);
        }
        self.prepared = true;
        Ok(())
    }

    fn commit(&mut self) -> Status {
        if let Some(code) = self.commit_result.clone() {
            return Err(code);
        }
        self.committed.append(&mut self.staged);
        Ok(())
    }

    fn discard(&mut self) {
        self.discard_calls += 1;
        self.staged.clear();
        self.prepared = false;
    }
}
