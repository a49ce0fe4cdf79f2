// src/lib.rs

//! pkcore package engine
//!
//! Query and transaction engine behind a package-manager backend. A host
//! runtime calls the operations in [`backend`]; each one streams package
//! notifications into a [`job::JobSink`], reports at most one error and
//! signals completion exactly once.
//!
//! # Architecture
//!
//! - Explicit database handle: every operation takes a [`db::PackageDatabase`]
//! - Queries are lazy, lock-free and skip unreadable records
//! - Mutations run through a locked [`transaction::Transaction`] that always
//!   releases the lock, whichever way it ends
//! - [`db::SqliteDatabase`] stores installed packages and indexed
//!   repositories in SQLite

pub mod backend;
pub mod config;
pub mod db;
mod error;
pub mod filter;
pub mod job;
pub mod package;
pub mod query;
pub mod repository;
pub mod transaction;
pub mod version;

#[cfg(test)]
mod test_support;

pub use error::{Error, ErrorKind, JobError, Result};
