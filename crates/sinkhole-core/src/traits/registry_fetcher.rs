// # Registry Fetcher Trait
//
// Defines the interface for retrieving the remote list of domains to sinkhole.
//
// ## Implementations
//
// - HTTP + XML: `sinkhole-registry-http` crate
//
// ## Usage
//
// ```rust,ignore
// use sinkhole_core::RegistryFetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* RegistryFetcher implementation */;
//
//     let list = fetcher.fetch().await?;
//     println!("{} entries from {}", list.len(), fetcher.endpoint());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::error::FetchError;

/// One record of the remote registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Domain name, exactly as published
    pub address: String,
}

impl RegistryEntry {
    /// Create a new registry entry
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Entries as returned by one fetch, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryList {
    entries: Vec<RegistryEntry>,
}

impl RegistryList {
    /// Create a list from entries
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries
    pub fn iter(&self) -> std::slice::Iter<'_, RegistryEntry> {
        self.entries.iter()
    }
}

impl FromIterator<RegistryEntry> for RegistryList {
    fn from_iter<I: IntoIterator<Item = RegistryEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for RegistryList {
    type Item = RegistryEntry;
    type IntoIter = std::vec::IntoIter<RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Trait for registry fetcher implementations
///
/// A fetcher performs exactly one retrieval per call. It must not retry on
/// its own: the retry policy belongs to the
/// [`SyncOrchestrator`](crate::SyncOrchestrator).
///
/// Implementations must report [`FetchError::EmptyResult`] instead of
/// returning an empty list. An empty blocklist cannot be told apart from a
/// broken upstream and must never replace a working configuration.
#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    /// Retrieve and parse the registry
    ///
    /// # Returns
    ///
    /// - `Ok(RegistryList)`: At least one entry
    /// - `Err(FetchError)`: Transport, read, parse or empty-result failure
    async fn fetch(&self) -> Result<RegistryList, FetchError>;

    /// Human-readable source location, for logging
    fn endpoint(&self) -> &str;
}
