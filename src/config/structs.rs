use super::impls::deserialize_level_filter;
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Where mount points are looked up.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Resolver {
    /// Read the kernel mount table directly
    #[serde(rename = "mounts")]
    Mounts,
    /// Ask `findmnt`
    #[serde(rename = "findmnt")]
    Findmnt,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SyncMode {
    /// fsync(2) the mount point
    #[serde(rename = "fsync")]
    Fsync,
    /// syncfs(2) the whole filesystem
    #[serde(rename = "syncfs")]
    Syncfs,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum UnmountMethod {
    /// Run the unmount command (`sudo /bin/umount` by default)
    #[serde(rename = "command")]
    Command,
    /// Call umount2(2) directly, requires root
    #[serde(rename = "syscall")]
    Syscall,
}

#[derive(Deserialize, Default, Clone, Debug)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_level_filter", default)]
    pub log_level: Option<log::LevelFilter>,
    /// Seconds
    pub timeout: Option<u64>,
    pub resolver: Option<Resolver>,
    pub mounts_file: Option<String>,
    pub sync_mode: Option<SyncMode>,
    pub unmount: Option<UnmountMethod>,
    pub umount_command: Option<Vec<String>>,
    pub lazy: Option<bool>,
    pub force: Option<bool>,
    pub best_effort: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: log::LevelFilter,
    pub path: PathBuf,
    pub timeout: Duration,
    pub resolver: Resolver,
    pub mounts_file: PathBuf,
    pub sync_mode: SyncMode,
    pub unmount: UnmountMethod,
    pub umount_command: Vec<String>,
    pub lazy: bool,
    pub force: bool,
    pub best_effort: bool,
    pub dry_run: bool,
    pub json: bool,
    pub sources: HashMap<String, String>,
}
