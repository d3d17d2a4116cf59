use crate::util::{covering_mount_point, get_mount_targets};
use anyhow::{Context, Result};
use log::{debug, trace};
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait MountResolver: Send + Sync {
    /// Returns the mount point covering `path`, or `None` when the mount table has nothing for it.
    fn resolve_mount_point(&self, path: &Path) -> Result<Option<PathBuf>>;
}

/// Paths that don't exist can't be covered by anything we'd want to unmount.
fn canonical_target(path: &Path) -> Option<PathBuf> {
    match path.canonicalize() {
        Ok(canonical) => Some(canonical),
        Err(e) => {
            debug!("Unable to canonicalize {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolves against an fstab-format mount table, normally `/proc/self/mounts`.
pub struct MountTableFile {
    pub table: PathBuf,
}

impl MountResolver for MountTableFile {
    fn resolve_mount_point(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(target) = canonical_target(path) else {
            return Ok(None);
        };
        let targets = get_mount_targets(&self.table)?;
        trace!(
            "Read {} mount targets from {}",
            targets.len(),
            self.table.display()
        );
        Ok(covering_mount_point(&target, &targets))
    }
}

/// Resolves by asking `findmnt` which mount holds the path.
pub struct Findmnt {
    pub program: PathBuf,
}

impl Default for Findmnt {
    fn default() -> Self {
        Self {
            program: PathBuf::from("findmnt"),
        }
    }
}

impl MountResolver for Findmnt {
    fn resolve_mount_point(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(target) = canonical_target(path) else {
            return Ok(None);
        };

        let output = Command::new(&self.program)
            .args(["-n", "-o", "TARGET", "-T"])
            .arg(&target)
            .output()
            .with_context(|| {
                format!("Failed to run {}", self.program.display())
            })?;

        // findmnt exits non-zero when nothing matches, the listing is what we go by
        if !output.status.success() {
            debug!(
                "{} exited with {} for {}",
                self.program.display(),
                output.status,
                target.display()
            );
        }

        Ok(last_listed_target(&output.stdout))
    }
}

fn last_listed_target(listing: &[u8]) -> Option<PathBuf> {
    listing
        .split(|b| *b == b'\n')
        .map(|line| line.trim_ascii())
        .filter(|line| !line.is_empty())
        .last()
        .map(|line| PathBuf::from(OsString::from_vec(line.to_vec())))
}
