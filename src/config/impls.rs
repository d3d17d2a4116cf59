use super::structs::{Resolver, SyncMode, UnmountMethod};

use serde::Deserialize;
use std::{
    fmt::{self, Display},
    str::FromStr,
};

impl FromStr for Resolver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mounts" => Ok(Resolver::Mounts),
            "findmnt" => Ok(Resolver::Findmnt),
            _ => Err(format!("Invalid resolver: {}", s)),
        }
    }
}

impl Display for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Mounts => write!(f, "mounts"),
            Resolver::Findmnt => write!(f, "findmnt"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fsync" => Ok(SyncMode::Fsync),
            "syncfs" => Ok(SyncMode::Syncfs),
            _ => Err(format!("Invalid sync mode: {}", s)),
        }
    }
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Fsync => write!(f, "fsync"),
            SyncMode::Syncfs => write!(f, "syncfs"),
        }
    }
}

impl FromStr for UnmountMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "command" => Ok(UnmountMethod::Command),
            "syscall" => Ok(UnmountMethod::Syscall),
            _ => Err(format!("Invalid unmount method: {}", s)),
        }
    }
}

impl Display for UnmountMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmountMethod::Command => write!(f, "command"),
            UnmountMethod::Syscall => write!(f, "syscall"),
        }
    }
}

pub(crate) fn deserialize_level_filter<'de, D>(
    deserializer: D,
) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map_or(Ok(None), |s| {
        log::LevelFilter::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    })
}
