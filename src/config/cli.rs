use super::{Resolver, SyncMode, UnmountMethod};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(short = 'v',
        long,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Seconds to wait for the flush before giving up. Defaults to 60.
    #[arg(long, require_equals = true, value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// How to find the mount point covering PATH. Defaults to `mounts`.
    #[arg(long, require_equals = true, value_enum)]
    pub resolver: Option<Resolver>,

    /// Mount table read by the `mounts` resolver. Defaults to `/proc/self/mounts`.
    #[arg(long, require_equals = true, value_hint = clap::ValueHint::FilePath)]
    pub mounts_file: Option<String>,

    /// How to flush the mount point. Defaults to `fsync`.
    #[arg(long, require_equals = true, value_enum)]
    pub sync_mode: Option<SyncMode>,

    /// How to unmount. Defaults to `command`.
    #[arg(long, require_equals = true, value_enum)]
    pub unmount: Option<UnmountMethod>,

    /// Program and leading arguments used by the `command` unmount method, comma separated.
    /// Defaults to `sudo,/bin/umount`. The mount point is appended last.
    #[arg(long, require_equals = true, value_delimiter = ',')]
    pub umount_command: Option<Vec<String>>,

    /// Detach the filesystem now and clean up references later (umount -l, MNT_DETACH)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub lazy: bool,

    /// Force the unmount (umount -f, MNT_FORCE)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,

    /// Succeed even if the unmount fails, as long as the flush succeeded
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub best_effort: bool,

    /// Only resolve and print the mount point, don't flush or unmount
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Formats output as a JSON blob.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Do not load config files.
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "config")]
    pub no_config: bool,

    /// Load these config files instead of the default locations. Can be specified multiple times
    /// or as a comma-separated list.
    #[arg(
        long,
        value_delimiter = ',',
        action = clap::ArgAction::Append,
        value_hint = clap::ValueHint::FilePath
    )]
    pub config: Option<Vec<String>>,

    /// Path whose backing mount should be flushed and unmounted
    #[arg(value_hint = clap::ValueHint::AnyPath)]
    pub path: PathBuf,
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}

pub(crate) fn parse_timeout(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err(String::from("Timeout must be at least one second")),
        Ok(secs) => Ok(secs),
        Err(e) => Err(format!("Invalid timeout '{}': {}", s, e)),
    }
}
