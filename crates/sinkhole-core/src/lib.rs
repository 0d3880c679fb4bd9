// # sinkhole-core
//
// Core library for the registry-driven DNS sinkhole synchronizer.
//
// ## Architecture Overview
//
// This library keeps a resolver's blocklist in step with a remote registry:
// - **RegistryFetcher**: Trait for retrieving the remote domain list
// - **normalize**: Deduplicates and sorts the list into a canonical set
// - **render**: Turns the canonical set into Unbound local-zone/local-data rules
// - **ConfigWriter**: Trait for persisting the rendered configuration atomically
// - **ResolverReloader**: Trait for making the resolver pick up the new file
// - **SyncOrchestrator**: Runs the cycle on a schedule with retry and shutdown
//
// ## Design Principles
//
// 1. **Library-First**: The daemon is a thin wrapper around this crate
// 2. **Pure Core**: Normalizing and rendering do no I/O and cannot fail
// 3. **Engine-Owned Retry**: Fetchers and writers make one attempt per call
// 4. **Never Empty**: An empty registry is an error, never an empty blocklist
// 5. **Atomic Output**: Readers see the old or the new file, nothing between

pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod output;
pub mod reload;
pub mod render;
pub mod retry;
pub mod shutdown;
pub mod traits;

// Re-export core types for convenience
pub use config::{RegistrySchema, RetryPolicy, SyncConfig};
pub use engine::{ReloadOutcome, SyncEvent, SyncOrchestrator, SyncReport, Trigger};
pub use error::{Error, FetchError, ReloadError, Result, Stage, WriteError};
pub use normalize::{CanonicalDomainSet, is_renderable_domain, normalize};
pub use output::FileConfigWriter;
pub use reload::CommandReloader;
pub use render::{RenderedConfig, render};
pub use shutdown::{ShutdownHandle, ShutdownSignal, shutdown_channel};
pub use traits::{ConfigWriter, RegistryEntry, RegistryFetcher, RegistryList, ResolverReloader};
