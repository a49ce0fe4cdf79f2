// src/query/mod.rs

//! Read-only queries over the installed set and the repository pool
//!
//! Queries never take the database lock and never fail on a single record:
//! unreadable records are skipped. Each query yields a lazy sequence of
//! `PackageEvent`s that the caller drains into a job.

pub mod enumerate;
pub mod resolve;
pub mod updates;

use crate::package::{PackageId, PackageRecord};
use std::fmt;

pub use enumerate::enumerate;
pub use resolve::resolve;
pub use updates::detect_updates;

/// Status tag attached to every emitted package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Info {
    Installed,
    Available,
    /// An update candidate
    Normal,
}

impl Info {
    pub fn as_str(&self) -> &str {
        match self {
            Info::Installed => "installed",
            Info::Available => "available",
            Info::Normal => "normal",
        }
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One package notification: identity, status tag and short description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEvent {
    pub info: Info,
    pub id: PackageId,
    pub summary: String,
}

impl PackageEvent {
    pub fn new(info: Info, id: PackageId, summary: impl Into<String>) -> Self {
        Self {
            info,
            id,
            summary: summary.into(),
        }
    }

    pub fn from_record(info: Info, record: PackageRecord<'_>) -> Self {
        let summary = record.summary().to_string();
        Self::new(info, record.id, summary)
    }
}
