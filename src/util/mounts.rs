use anyhow::{Context, Result, anyhow};
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// getmntent hands back a pointer into one static buffer per process
static MNTENT_LOCK: Mutex<()> = Mutex::new(());

/// Reads the target column of an fstab-format mount table such as
/// `/proc/self/mounts`, in table order. getmntent undoes the kernel's octal
/// escaping (`\040` for a space and so on).
pub fn get_mount_targets(table: &Path) -> Result<Vec<PathBuf>> {
    let table_cstr = CString::new(table.as_os_str().as_bytes())
        .with_context(|| format!("Invalid mount table path {}", table.display()))?;

    let _guard = MNTENT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let mount_table =
        unsafe { libc::setmntent(table_cstr.as_ptr(), c"r".as_ptr()) };
    if mount_table.is_null() {
        return Err(anyhow!("Failed to open {}", table.display()));
    }

    let mut targets = Vec::new();
    loop {
        let mnt = unsafe { libc::getmntent(mount_table) };
        if mnt.is_null() {
            break;
        }

        let mnt_dir = unsafe { CStr::from_ptr((*mnt).mnt_dir) };
        targets.push(PathBuf::from(OsStr::from_bytes(mnt_dir.to_bytes())));
    }

    unsafe { libc::endmntent(mount_table) };

    Ok(targets)
}

/// Picks the mount target covering `path` with the most components. Stacked mounts on the same
/// target resolve to the one listed last, which is the one currently visible.
pub fn covering_mount_point(path: &Path, targets: &[PathBuf]) -> Option<PathBuf> {
    let mut best: Option<&PathBuf> = None;
    for target in targets.iter().filter(|t| path.starts_with(t)) {
        match best {
            Some(current)
                if current.components().count() > target.components().count() => {}
            _ => best = Some(target),
        }
    }
    best.cloned()
}
