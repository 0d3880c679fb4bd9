//! Core traits for the sinkhole synchronizer
//!
//! These are the I/O seams of a sync cycle:
//!
//! - [`RegistryFetcher`]: Retrieve the remote domain list
//! - [`ConfigWriter`]: Persist the rendered resolver configuration
//! - [`ResolverReloader`]: Make the resolver pick it up

pub mod config_writer;
pub mod registry_fetcher;
pub mod resolver_reloader;

pub use config_writer::ConfigWriter;
pub use registry_fetcher::{RegistryEntry, RegistryFetcher, RegistryList};
pub use resolver_reloader::ResolverReloader;
