//! Deduplication and canonical ordering of registry entries

use std::collections::BTreeSet;

use tracing::warn;

use crate::traits::RegistryList;

/// Whether `domain` can be placed inside a quoted Unbound string as-is
///
/// Rejects empty names and any name holding a quote, a backslash, whitespace
/// or a control character. Each of these either ends the quoted string early
/// or splits a rendered line in two.
pub fn is_renderable_domain(domain: &str) -> bool {
    !domain.is_empty()
        && !domain
            .chars()
            .any(|c| c == '"' || c == '\\' || c.is_whitespace() || c.is_control())
}

/// Unique domain names in ascending byte order
///
/// Built fresh every cycle from a [`RegistryList`]. Two lists holding the same
/// addresses, in any order and with any number of repeats, produce equal sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalDomainSet {
    domains: Vec<String>,
}

impl CanonicalDomainSet {
    /// Deduplicate and sort the addresses of `list`
    ///
    /// Comparison is exact: no case folding or trimming is applied, so
    /// `Example.com` and `example.com` are distinct domains. Addresses that
    /// fail [`is_renderable_domain`] are dropped with a warning.
    pub fn from_entries(list: RegistryList) -> Self {
        let unique: BTreeSet<String> = list
            .into_iter()
            .map(|entry| entry.address)
            .filter(|address| {
                let keep = is_renderable_domain(address);
                if !keep {
                    warn!("Dropping unrenderable registry address {:?}", address);
                }
                keep
            })
            .collect();
        Self {
            domains: unique.into_iter().collect(),
        }
    }

    /// Number of unique domains
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Iterate over the domains in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.domains
    }
}

/// Canonicalize a registry list
pub fn normalize(list: RegistryList) -> CanonicalDomainSet {
    CanonicalDomainSet::from_entries(list)
}
