use anyhow::{Context, Result, anyhow};
use log::debug;
use nix::mount::MntFlags;
use std::path::Path;
use std::process::Command;

pub trait Unmounter: Send + Sync {
    fn unmount(&self, mount_point: &Path) -> Result<()>;
}

/// Shells out to a privileged unmount helper, `sudo /bin/umount` unless configured otherwise.
/// The mount point is always the last argument.
pub struct UmountCommand {
    pub command: Vec<String>,
    pub lazy: bool,
    pub force: bool,
}

impl Unmounter for UmountCommand {
    fn unmount(&self, mount_point: &Path) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("Unmount command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if self.lazy {
            cmd.arg("-l");
        }
        if self.force {
            cmd.arg("-f");
        }
        cmd.arg(mount_point);

        debug!(
            "Running {} for {}",
            self.command.join(" "),
            mount_point.display()
        );
        let status = cmd
            .status()
            .with_context(|| format!("Failed to run {}", program))?;

        if !status.success() {
            return Err(anyhow!("{} exited with {}", program, status));
        }
        Ok(())
    }
}

/// Unmounts directly with umount2(2). Needs CAP_SYS_ADMIN.
pub struct Umount2 {
    pub lazy: bool,
    pub force: bool,
}

impl Umount2 {
    fn flags(&self) -> MntFlags {
        let mut flags = MntFlags::empty();
        if self.lazy {
            flags.insert(MntFlags::MNT_DETACH);
        }
        if self.force {
            flags.insert(MntFlags::MNT_FORCE);
        }
        flags
    }
}

impl Unmounter for Umount2 {
    fn unmount(&self, mount_point: &Path) -> Result<()> {
        debug!(
            "umount2 {} [flags={}]",
            mount_point.display(),
            self.flags().bits()
        );
        nix::mount::umount2(mount_point, self.flags()).with_context(|| {
            format!("umount2 failed on {}", mount_point.display())
        })
    }
}
