// src/transaction/mod.rs

//! Transaction controller
//!
//! A transaction moves through `Idle -> Locked -> Staged -> Prepared ->
//! Committed`. Any staging, prepare or commit failure moves it to `Aborted`.
//! Once the lock is taken it is released exactly once, on every path,
//! either by `release` or when the transaction is dropped.

pub mod closure;
pub mod codes;

use crate::db::traits::{PackageDatabase, ReturnCode};
use crate::error::{Error, ErrorKind, JobError};
use crate::package::PackageId;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Locked,
    Staged,
    Prepared,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "idle",
            TransactionState::Locked => "locked",
            TransactionState::Staged => "staged",
            TransactionState::Prepared => "prepared",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One requested change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Install exactly this version
    Install(PackageId),
    /// Remove a package, optionally together with everything depending on it
    Remove {
        name: String,
        autoremove: bool,
        allow_dependents: bool,
    },
    /// Update to the newest repository version
    Update(String),
}

pub struct Transaction<'a, D: PackageDatabase + ?Sized> {
    db: &'a mut D,
    state: TransactionState,
    locked: bool,
    /// Human readable log of staged actions, in staging order
    staged: Vec<String>,
    removals: HashSet<String>,
}

impl<'a, D: PackageDatabase + ?Sized> Transaction<'a, D> {
    pub fn new(db: &'a mut D) -> Self {
        Self {
            db,
            state: TransactionState::Idle,
            locked: false,
            staged: Vec::new(),
            removals: HashSet::new(),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Take the database lock without waiting
    pub fn acquire(&mut self) -> Result<(), JobError> {
        self.expect_state(TransactionState::Idle)?;
        if let Err(err) = self.db.lock() {
            self.state = TransactionState::Aborted;
            return Err(JobError::new(
                ErrorKind::LockUnavailable,
                format!("Failed to lock package database: {}", err),
            ));
        }
        debug!("Package database locked");
        self.locked = true;
        self.state = TransactionState::Locked;
        Ok(())
    }

    /// Stage a batch of intents; the first failure aborts the whole batch
    pub fn stage(&mut self, intents: &[Intent]) -> Result<(), JobError> {
        self.expect_state(TransactionState::Locked)?;
        for intent in intents {
            if let Err(err) = self.stage_one(intent) {
                warn!("Staging failed: {}", err);
                self.abort();
                return Err(err);
            }
        }
        self.state = TransactionState::Staged;
        Ok(())
    }

    fn stage_one(&mut self, intent: &Intent) -> Result<(), JobError> {
        match intent {
            Intent::Install(id) => {
                let pkgver = id.pkgver();
                self.db
                    .stage_install(&pkgver)
                    .map_err(|code| codes::install_error(&pkgver, &code))?;
                self.staged.push(format!("install {}", pkgver));
            }
            Intent::Update(name) => match self.db.stage_update(name) {
                Ok(()) => self.staged.push(format!("update {}", name)),
                Err(ReturnCode::Exists) => debug!("{} is already up to date", name),
                Err(code) => return Err(codes::update_error(name, &code)),
            },
            Intent::Remove {
                name,
                autoremove,
                allow_dependents,
            } => {
                if *allow_dependents {
                    for target in self.removal_order(name)? {
                        self.stage_removal(&target, *autoremove)?;
                    }
                } else {
                    self.stage_removal(name, *autoremove)?;
                }
            }
        }
        Ok(())
    }

    fn removal_order(&self, name: &str) -> Result<Vec<String>, JobError> {
        let db = &*self.db;
        closure::removal_order(name, |pkg| db.reverse_dependencies(pkg)).map_err(|err| match err {
            Error::DependencyCycle(_) => JobError::new(ErrorKind::DependencyError, err.to_string()),
            other => JobError::new(
                ErrorKind::InternalError,
                format!("Failed to resolve dependents of {}: {}", name, other),
            ),
        })
    }

    fn stage_removal(&mut self, name: &str, autoremove: bool) -> Result<(), JobError> {
        if self.removals.contains(name) {
            return Ok(());
        }
        self.db
            .stage_remove(name, autoremove)
            .map_err(|code| codes::remove_error(name, &code))?;
        self.removals.insert(name.to_string());
        self.staged.push(format!("remove {}", name));
        Ok(())
    }

    /// Resolve the staged intents into a plan
    pub fn prepare(&mut self) -> Result<(), JobError> {
        self.expect_state(TransactionState::Staged)?;
        if let Err(code) = self.db.prepare() {
            self.abort();
            return Err(codes::prepare_error(&code));
        }
        self.state = TransactionState::Prepared;
        Ok(())
    }

    /// Execute the prepared plan and release the lock
    pub fn commit(&mut self) -> Result<(), JobError> {
        self.expect_state(TransactionState::Prepared)?;
        let result = self.db.commit();
        match result {
            Ok(()) => {
                info!("Transaction committed ({} actions)", self.staged.len());
                self.state = TransactionState::Committed;
                self.release();
                Ok(())
            }
            Err(code) => {
                self.abort();
                self.release();
                Err(codes::commit_error(&code))
            }
        }
    }

    /// Drop staged work and release the lock; safe to call more than once
    pub fn release(&mut self) {
        if !self.locked {
            return;
        }
        if self.state != TransactionState::Committed {
            self.db.discard();
        }
        self.db.unlock();
        self.locked = false;
        debug!("Package database unlocked ({})", self.state);
    }

    pub fn abort(&mut self) {
        if self.state != TransactionState::Committed {
            self.state = TransactionState::Aborted;
            self.staged.clear();
            self.removals.clear();
        }
    }

    fn expect_state(&mut self, expected: TransactionState) -> Result<(), JobError> {
        if self.state == expected {
            return Ok(());
        }
        let err = JobError::new(
            ErrorKind::InternalError,
            format!("Transaction is {}, expected {}", self.state, expected),
        );
        self.abort();
        Err(err)
    }
}

impl<D: PackageDatabase + ?Sized> Drop for Transaction<'_, D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run a complete transaction: lock, stage, prepare, commit, unlock
pub fn execute<D>(db: &mut D, intents: &[Intent]) -> Result<(), JobError>
where
    D: PackageDatabase + ?Sized,
{
    let mut transaction = Transaction::new(db);
    transaction.acquire()?;
    transaction.stage(intents)?;
    transaction.prepare()?;
    transaction.commit()
}
