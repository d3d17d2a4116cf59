use anyhow::Result;
use rand::Rng;
use rstest::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn rid() -> String {
    let mut rng = rand::rng();
    let rid: String = (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect();
    rid
}

pub fn get_sync_unmount_bin() -> String {
    env!("CARGO_BIN_EXE_sync-unmount").to_string()
}

/**
 * Runs the binary against a private scratch directory. The scratch directory can stand in for a
 * mount point by listing it in a fake mount table, and `marker()` is what the fake unmount command
 * touches, so tests can tell whether the unmount step ran without needing root.
 */
pub struct SyncUnmountRunner {
    pub bin: String,
    pub scratch: PathBuf,
    pub last_stdout: String,
    pub last_stderr: String,
    pub last_code: Option<i32>,
}

impl SyncUnmountRunner {
    pub fn new() -> Self {
        let scratch = std::env::temp_dir().join(format!("sync-unmount-test-{}", rid()));

        #[allow(clippy::panic)]
        if let Err(e) = std::fs::create_dir_all(&scratch) {
            panic!("Failed to create {}: {}", scratch.display(), e);
        }
        let scratch = scratch.canonicalize().unwrap_or(scratch);

        Self {
            bin: get_sync_unmount_bin(),
            scratch,
            last_stdout: String::new(),
            last_stderr: String::new(),
            last_code: None,
        }
    }

    /// Where the fake unmount command leaves its mark
    pub fn marker(&self) -> PathBuf {
        self.scratch.join("unmounted")
    }

    pub fn unmount_ran(&self) -> bool {
        self.marker().exists()
    }

    /// `--umount-command` value that records the call instead of unmounting
    pub fn fake_umount_arg(&self) -> String {
        format!("--umount-command=touch,{}", self.marker().display())
    }

    /// Writes a mount table in which the scratch directory is a mount point, returning the
    /// `--mounts-file` argument for it.
    pub fn fake_mounts_arg(&self) -> Result<String> {
        let table = self.scratch.join("mounts");
        std::fs::write(
            &table,
            format!(
                "/dev/root / ext4 rw 0 0\n/dev/fake {} ext4 rw 0 0\n",
                escape_mount_field(&self.scratch)
            ),
        )?;
        Ok(format!("--mounts-file={}", table.display()))
    }

    pub fn run(&mut self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(&self.bin);
        cmd.env_remove("SYNC_UNMOUNT_LOG_LEVEL")
            .env_remove("SYNC_UNMOUNT_TIMEOUT")
            .env_remove("SYNC_UNMOUNT_RESOLVER")
            .env_remove("SYNC_UNMOUNT_MOUNTS_FILE")
            .env_remove("SYNC_UNMOUNT_UNMOUNT")
            .env_remove("SYNC_UNMOUNT_BEST_EFFORT")
            .env_remove("COMPLETE");
        if !args.iter().any(|arg| arg.starts_with("--config")) {
            cmd.arg("--no-config");
        }
        cmd.args(args);

        println!(
            "Running command: {} {}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args()
                .map(|c| c.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = cmd.output()?;
        self.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.last_code = output.status.code();
        Ok(output)
    }

    pub fn pass(&mut self, args: &[&str]) -> bool {
        match self.run(args) {
            Ok(output) if output.status.success() => true,
            _ => {
                println!("last_stderr: {}", self.last_stderr);
                println!("last_stdout: {}", self.last_stdout);
                false
            }
        }
    }

    /// Passes when the run exits with exactly `code`
    pub fn fail_with(&mut self, code: i32, args: &[&str]) -> bool {
        match self.run(args) {
            Ok(output) if output.status.code() == Some(code) => true,
            _ => {
                println!("last_stderr: {}", self.last_stderr);
                println!("last_stdout: {}", self.last_stdout);
                false
            }
        }
    }
}

fn escape_mount_field(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\134")
        .replace(' ', "\\040")
        .replace('\t', "\\011")
        .replace('\n', "\\012")
}

impl Drop for SyncUnmountRunner {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.scratch) {
            if e.kind() != std::io::ErrorKind::NotFound {
                println!("Failed to remove {}: {}", self.scratch.display(), e);
            }
        }
    }
}

#[fixture]
pub fn runner() -> SyncUnmountRunner {
    SyncUnmountRunner::new()
}
