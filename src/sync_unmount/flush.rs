use crate::config::SyncMode;
use anyhow::{Context, Result};
use log::trace;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::Path;

pub trait Flush: Send + Sync {
    /// Blocks until everything buffered for `mount_point` has reached stable storage.
    fn flush(&self, mount_point: &Path) -> Result<()>;
}

/// Opens the mount point read-only and flushes through that handle. The handle is closed when
/// it drops, whichever way `flush` returns.
pub struct HandleFlush {
    pub mode: SyncMode,
}

impl Flush for HandleFlush {
    fn flush(&self, mount_point: &Path) -> Result<()> {
        let handle = File::open(mount_point).with_context(|| {
            format!("Failed to open {}", mount_point.display())
        })?;

        trace!("Issuing {} on {}", self.mode, mount_point.display());
        match self.mode {
            SyncMode::Fsync => handle.sync_all().with_context(|| {
                format!("fsync failed on {}", mount_point.display())
            })?,
            SyncMode::Syncfs => nix::unistd::syncfs(handle.as_raw_fd())
                .with_context(|| {
                    format!("syncfs failed on {}", mount_point.display())
                })?,
        }

        Ok(())
    }
}
