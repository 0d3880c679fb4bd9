// # Resolver Reloader Trait
//
// Defines the interface for telling the DNS resolver to pick up the freshly
// written configuration.
//
// ## Implementations
//
// - External command (e.g. `systemctl reload unbound`):
//   [`crate::reload::CommandReloader`]

use async_trait::async_trait;

use crate::error::ReloadError;
use crate::shutdown::ShutdownSignal;

/// Trait for resolver reloader implementations
///
/// A reload is attempted once per cycle and never retried. Its failure does
/// not roll back the written configuration; the next cycle, or an operator,
/// recovers.
#[async_trait]
pub trait ResolverReloader: Send + Sync {
    /// Reload the resolver, giving up with [`ReloadError::Canceled`] when
    /// `shutdown` fires first
    async fn reload(&self, shutdown: &ShutdownSignal) -> Result<(), ReloadError>;

    /// Human-readable description of the reload mechanism, for logging
    fn describe(&self) -> String;
}
