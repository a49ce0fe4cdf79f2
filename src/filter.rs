// src/filter.rs

//! Per-record predicates: architecture, installed state and free-text search

use crate::package::PackageRecord;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Selector bits requested by the host
///
/// `installed` and `not_installed` are independent. With neither set, both
/// installed and available packages are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub installed: bool,
    pub not_installed: bool,
    pub arch: bool,
    pub not_arch: bool,
}

impl FilterSpec {
    /// No filtering at all
    pub const NONE: FilterSpec = FilterSpec {
        installed: false,
        not_installed: false,
        arch: false,
        not_arch: false,
    };

    /// Whether the installed set should be scanned
    pub fn wants_installed(&self) -> bool {
        self.installed || !self.not_installed
    }

    /// Whether the repository pool should be scanned
    pub fn wants_available(&self) -> bool {
        self.not_installed || !self.installed
    }
}

impl FromStr for FilterSpec {
    type Err = std::convert::Infallible;

    /// Parse `installed;~arch` style filter text. Unknown tokens are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut spec = FilterSpec::NONE;
        for token in s.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                "installed" => spec.installed = true,
                "~installed" => spec.not_installed = true,
                "arch" => spec.arch = true,
                "~arch" => spec.not_arch = true,
                "none" => {}
                other => debug!("Ignoring unsupported filter: {}", other),
            }
        }
        Ok(spec)
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = [
            (self.installed, "installed"),
            (self.not_installed, "~installed"),
            (self.arch, "arch"),
            (self.not_arch, "~arch"),
        ]
        .into_iter()
        .filter_map(|(set, token)| set.then_some(token))
        .collect();

        if tokens.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&tokens.join(";"))
        }
    }
}

/// Free-text search; tokens are case-folded on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerms {
    /// Every token must occur in the name
    Names(Vec<String>),
    /// Every token must occur in the name or the short description
    Details(Vec<String>),
}

impl SearchTerms {
    pub fn names<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SearchTerms::Names(fold_all(values))
    }

    pub fn details<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SearchTerms::Details(fold_all(values))
    }

    pub fn matches(&self, record: &PackageRecord<'_>) -> bool {
        let name = record.id.name.to_lowercase();
        match self {
            SearchTerms::Names(tokens) => tokens.iter().all(|t| name.contains(t.as_str())),
            SearchTerms::Details(tokens) => {
                let summary = record.summary().to_lowercase();
                tokens
                    .iter()
                    .all(|t| name.contains(t.as_str()) || summary.contains(t.as_str()))
            }
        }
    }
}

fn fold_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().to_lowercase())
        .collect()
}

/// Filter spec bound to the native architecture and an optional search
#[derive(Debug, Clone, Copy)]
pub struct FilterChain<'a> {
    spec: FilterSpec,
    native_arch: &'a str,
    search: Option<&'a SearchTerms>,
}

impl<'a> FilterChain<'a> {
    pub fn new(spec: FilterSpec, native_arch: &'a str) -> Self {
        Self {
            spec,
            native_arch,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<&'a SearchTerms>) -> Self {
        self.search = search;
        self
    }

    pub fn spec(&self) -> FilterSpec {
        self.spec
    }

    /// Whether a record passes every active predicate
    ///
    /// `arch` and `not_arch` are checked independently, so setting both
    /// rejects every record.
    pub fn admits(&self, record: &PackageRecord<'_>) -> bool {
        let native = record.id.arch == self.native_arch;
        if self.spec.arch && !native {
            return false;
        }
        if self.spec.not_arch && native {
            return false;
        }

        match self.search {
            Some(terms) => terms.matches(record),
            None => true,
        }
    }
}
