// # File Config Writer
//
// File-based implementation of ConfigWriter with atomic replacement.
//
// ## Purpose
//
// The generated resolver configuration is included by the resolver at reload
// time. A resolver that reloads, or restarts, while the file is being written
// must never see a truncated blocklist.
//
// ## Crash Safety
//
// - Atomic writes: content goes to `<output>.tmp`, is fsynced, then renamed
//   over the destination
// - The parent directory is fsynced after the rename so the new name is
//   durable
// - A failed write removes the temporary file and leaves the previous
//   configuration in place

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::WriteError;
use crate::render::RenderedConfig;
use crate::traits::ConfigWriter;

/// Mode of the generated file (world-readable, owner-writable)
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o644;

/// File-based config writer with atomic replacement
///
/// # Example
///
/// ```rust,no_run
/// use sinkhole_core::output::FileConfigWriter;
/// use sinkhole_core::traits::ConfigWriter;
/// use sinkhole_core::{normalize, render, RegistryEntry, RegistryList};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let writer = FileConfigWriter::new("/etc/unbound/rsh.conf");
///
///     let list: RegistryList = vec![RegistryEntry::new("example.com")].into_iter().collect();
///     let config = render(&normalize(list), "10.0.0.1".parse()?);
///
///     writer.write(&config).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigWriter {
    path: PathBuf,
}

impl FileConfigWriter {
    /// Create a writer for `path`
    ///
    /// The parent directory must exist when [`write`](ConfigWriter::write) is
    /// called; it is not created.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_temp(&self, temp_path: &Path, content: &[u8]) -> Result<(), WriteError> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| WriteError::from_io(temp_path, e))?;

        file.write_all(content)
            .await
            .map_err(|e| WriteError::from_io(temp_path, e))?;

        file.sync_all()
            .await
            .map_err(|e| WriteError::from_io(temp_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp_path, std::fs::Permissions::from_mode(OUTPUT_FILE_MODE))
                .await
                .map_err(|e| WriteError::from_io(temp_path, e))?;
        }

        Ok(())
    }

    /// Fsync the parent directory so the rename survives a crash
    #[cfg(unix)]
    async fn sync_parent(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        match fs::File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    tracing::debug!("Failed to sync directory {}: {}", parent.display(), e);
                }
            }
            Err(e) => {
                tracing::debug!("Failed to open directory {}: {}", parent.display(), e);
            }
        }
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) {}
}

#[async_trait]
impl ConfigWriter for FileConfigWriter {
    async fn write(&self, config: &RenderedConfig) -> Result<(), WriteError> {
        let temp_path = self.temp_path();

        if let Err(e) = self.write_temp(&temp_path, config.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Atomic rename (temp -> actual)
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(WriteError::from_io(&self.path, e));
        }

        self.sync_parent().await;

        tracing::trace!(
            "Config written to file: {} ({} bytes)",
            self.path.display(),
            config.len()
        );
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}
