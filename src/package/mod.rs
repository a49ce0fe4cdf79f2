// src/package/mod.rs

//! Package identity and the normalized record view

pub mod id;
pub mod view;

pub use id::PackageId;
pub use view::{PackageRecord, normalize, repository_label, split_pkgver};
