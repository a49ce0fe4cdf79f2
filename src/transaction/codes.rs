// src/transaction/codes.rs

//! Failure code to `ErrorKind` mapping, one table per transaction phase

use crate::db::traits::ReturnCode;
use crate::error::{ErrorKind, JobError};

pub fn install_error(pkgver: &str, code: &ReturnCode) -> JobError {
    match code {
        ReturnCode::Busy => JobError::new(
            ErrorKind::SelfUpdateRequired,
            "The package manager must be updated first",
        ),
        ReturnCode::Exists => {
            JobError::new(ErrorKind::AlreadySatisfied, format!("{} is already installed", pkgver))
        }
        ReturnCode::NotFound => JobError::new(
            ErrorKind::NotFound,
            format!("{} not found in repository pool", pkgver),
        ),
        ReturnCode::Unsupported => no_repositories(),
        ReturnCode::Unresolvable => JobError::new(
            ErrorKind::DependencyError,
            format!("{} has invalid dependencies", pkgver),
        ),
        other => JobError::new(
            ErrorKind::Unknown,
            format!("{} failed to be queued for installation ({})", pkgver, other),
        ),
    }
}

pub fn update_error(name: &str, code: &ReturnCode) -> JobError {
    match code {
        ReturnCode::Busy => JobError::new(
            ErrorKind::SelfUpdateRequired,
            "The package manager must be updated first",
        ),
        ReturnCode::NotFound => JobError::new(
            ErrorKind::NotFound,
            format!("{} not found in repository pool", name),
        ),
        ReturnCode::Unsupported => no_repositories(),
        ReturnCode::Unresolvable => JobError::new(
            ErrorKind::DependencyError,
            format!("{} has invalid dependencies", name),
        ),
        other => JobError::new(
            ErrorKind::Unknown,
            format!("{} failed to be queued for update ({})", name, other),
        ),
    }
}

pub fn remove_error(name: &str, code: &ReturnCode) -> JobError {
    match code {
        ReturnCode::Exists => JobError::new(
            ErrorKind::DependencyError,
            format!("{} is a dependency of another package", name),
        ),
        ReturnCode::NotFound => {
            JobError::new(ErrorKind::NotInstalled, format!("{} is not installed", name))
        }
        other => JobError::new(
            ErrorKind::Unknown,
            format!("{} failed to be queued for removal ({})", name, other),
        ),
    }
}

pub fn prepare_error(code: &ReturnCode) -> JobError {
    match code {
        ReturnCode::Again => JobError::new(ErrorKind::ConflictError, "Packages conflict"),
        ReturnCode::Invalid => JobError::new(
            ErrorKind::InternalError,
            "Invalid transaction state",
        ),
        ReturnCode::Unresolvable | ReturnCode::MissingDependency => {
            JobError::new(ErrorKind::DependencyError, "Could not satisfy dependencies")
        }
        ReturnCode::NoSpace => {
            JobError::new(ErrorKind::ResourceExhausted, "Not enough free space")
        }
        other => JobError::new(
            ErrorKind::Unknown,
            format!("Failed to prepare transaction ({})", other),
        ),
    }
}

pub fn commit_error(code: &ReturnCode) -> JobError {
    JobError::new(
        ErrorKind::TransactionFailed,
        format!("Failed to commit transaction ({})", code),
    )
}

pub fn sync_error(code: &ReturnCode) -> JobError {
    match code {
        ReturnCode::Unsupported => no_repositories(),
        other => JobError::new(
            ErrorKind::SourceUnavailable,
            format!("Failed to refresh repositories ({})", other),
        ),
    }
}

fn no_repositories() -> JobError {
    JobError::new(ErrorKind::SourceUnavailable, "No repositories set up")
}
