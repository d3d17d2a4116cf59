use std::path::PathBuf;
use std::time::Duration;

/// Terminal failures of a sync-unmount run. These travel inside
/// `anyhow::Error` and can be recovered with `downcast_ref`.
#[derive(Debug)]
pub enum SyncUnmountError {
    Unresolved {
        path: PathBuf,
    },
    TimedOut {
        mount_point: PathBuf,
        timeout: Duration,
    },
    FlushFailed {
        mount_point: PathBuf,
    },
    UnmountFailed {
        mount_point: PathBuf,
        reason: String,
    },
}

impl std::fmt::Display for SyncUnmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncUnmountError::Unresolved { path } => {
                write!(f, "No mount point found for {}", path.display())
            }
            SyncUnmountError::TimedOut {
                mount_point,
                timeout,
            } => write!(
                f,
                "fsync timed out after {}s on {}",
                timeout.as_secs_f64(),
                mount_point.display()
            ),
            SyncUnmountError::FlushFailed { mount_point } => {
                write!(f, "Failed to flush {}", mount_point.display())
            }
            SyncUnmountError::UnmountFailed {
                mount_point,
                reason,
            } => write!(
                f,
                "Failed to unmount {}: {}",
                mount_point.display(),
                reason
            ),
        }
    }
}

impl std::error::Error for SyncUnmountError {}
