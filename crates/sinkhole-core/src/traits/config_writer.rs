// # Config Writer Trait
//
// Defines the interface for persisting the rendered resolver configuration.
//
// ## Implementations
//
// - File-based with atomic replace: [`crate::output::FileConfigWriter`]

use async_trait::async_trait;

use crate::error::WriteError;
use crate::render::RenderedConfig;

/// Trait for configuration writer implementations
///
/// A writer replaces the previous configuration with exactly the given
/// content. A reader of the destination must see either the old or the new
/// content, never a mix of both.
///
/// The on-disk file is the only state that survives between cycles.
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    /// Replace the destination with `config`
    async fn write(&self, config: &RenderedConfig) -> Result<(), WriteError>;

    /// Human-readable destination, for logging
    fn destination(&self) -> String;
}
