use super::cli::{Args, parse_timeout};
use super::{Config, PartialConfig, Resolver, UnmountMethod};
use crate::sync_unmount::DEFAULT_TIMEOUT;
use anyhow::{Context, Result, anyhow};
use log::trace;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MOUNTS_FILE: &str = "/proc/self/mounts";
const DEFAULT_UMOUNT_COMMAND: [&str; 2] = ["sudo", "/bin/umount"];

pub fn resolve_config(cli: Args) -> Result<Config> {
    let (mut partial_config, mut sources) =
        load_partial(cli.no_config, cli.config.clone())?;

    apply_env_overrides(&mut partial_config, &mut sources, |key| {
        std::env::var(key).ok()
    })?;
    apply_cli_overrides(&mut partial_config, &mut sources, &cli);

    let config = finalize(partial_config, sources, cli)?;
    for (key, source) in config.sources.iter() {
        trace!("{} set from {}", key, source);
    }
    Ok(config)
}

pub fn load_partial(
    no_config: bool,
    explicit_paths: Option<Vec<String>>,
) -> Result<(PartialConfig, HashMap<String, String>)> {
    let config_paths = if no_config {
        vec![]
    } else if let Some(explicit_paths) = explicit_paths {
        let mut paths = Vec::new();
        for path in explicit_paths.into_iter().filter(|p| !p.is_empty()) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            paths.push(path);
        }
        paths
    } else {
        find_config_files()
    };

    let mut sources = HashMap::new();
    if config_paths.is_empty() {
        trace!("No config files found, using default config");
        return Ok((PartialConfig::default(), sources));
    }

    let mut merged_config = PartialConfig::default();
    for path in config_paths.iter() {
        let config_str = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read config file {}", path.display())
        })?;

        let config: PartialConfig =
            toml::from_str(&config_str).with_context(|| {
                format!("Failed to parse config file {}", path.display())
            })?;

        merge_configs(
            &mut merged_config,
            &mut sources,
            config,
            &path.to_string_lossy(),
        );
        trace!("Loaded config file: {}", path.display());
    }

    Ok((merged_config, sources))
}

/** Returns the existing config files, lowest precedence first */
fn find_config_files() -> Vec<PathBuf> {
    let mut paths_to_check = vec![PathBuf::from("/etc/sync-unmount.toml")];

    if let Some(home) = std::env::var_os("HOME") {
        paths_to_check
            .push(PathBuf::from(home).join(".config/sync-unmount/config.toml"));
    }

    paths_to_check
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
}

fn merge_configs(
    base: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    override_config: PartialConfig,
    source: &str,
) {
    if let Some(log_level) = override_config.log_level {
        base.log_level = Some(log_level);
        sources.insert("log_level".into(), source.into());
    }
    if let Some(timeout) = override_config.timeout {
        base.timeout = Some(timeout);
        sources.insert("timeout".into(), source.into());
    }
    if let Some(resolver) = override_config.resolver {
        base.resolver = Some(resolver);
        sources.insert("resolver".into(), source.into());
    }
    if let Some(mounts_file) = override_config.mounts_file {
        base.mounts_file = Some(mounts_file);
        sources.insert("mounts_file".into(), source.into());
    }
    if let Some(sync_mode) = override_config.sync_mode {
        base.sync_mode = Some(sync_mode);
        sources.insert("sync_mode".into(), source.into());
    }
    if let Some(unmount) = override_config.unmount {
        base.unmount = Some(unmount);
        sources.insert("unmount".into(), source.into());
    }
    // Later files replace the command wholesale, the arguments are not additive
    if let Some(umount_command) = override_config.umount_command {
        base.umount_command = Some(umount_command);
        sources.insert("umount_command".into(), source.into());
    }
    if let Some(lazy) = override_config.lazy {
        base.lazy = Some(lazy);
        sources.insert("lazy".into(), source.into());
    }
    if let Some(force) = override_config.force {
        base.force = Some(force);
        sources.insert("force".into(), source.into());
    }
    if let Some(best_effort) = override_config.best_effort {
        base.best_effort = Some(best_effort);
        sources.insert("best_effort".into(), source.into());
    }
}

fn apply_env_overrides<F>(
    partial_config: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    lookup: F,
) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(log_level) = non_empty("SYNC_UNMOUNT_LOG_LEVEL") {
        let log_level = log::LevelFilter::from_str(&log_level)
            .map_err(|_| anyhow!("Invalid log level: {}", log_level))?;
        partial_config.log_level = Some(log_level);
        sources.insert("log_level".into(), "environment".into());
    }
    if let Some(timeout) = non_empty("SYNC_UNMOUNT_TIMEOUT") {
        let timeout = parse_timeout(&timeout)
            .map_err(|e| anyhow!("SYNC_UNMOUNT_TIMEOUT: {}", e))?;
        partial_config.timeout = Some(timeout);
        sources.insert("timeout".into(), "environment".into());
    }
    if let Some(resolver) = non_empty("SYNC_UNMOUNT_RESOLVER") {
        partial_config.resolver =
            Some(Resolver::from_str(&resolver).map_err(|e| anyhow!(e))?);
        sources.insert("resolver".into(), "environment".into());
    }
    if let Some(mounts_file) = non_empty("SYNC_UNMOUNT_MOUNTS_FILE") {
        partial_config.mounts_file = Some(mounts_file);
        sources.insert("mounts_file".into(), "environment".into());
    }
    if let Some(unmount) = non_empty("SYNC_UNMOUNT_UNMOUNT") {
        partial_config.unmount =
            Some(UnmountMethod::from_str(&unmount).map_err(|e| anyhow!(e))?);
        sources.insert("unmount".into(), "environment".into());
    }
    if let Some(best_effort) = non_empty("SYNC_UNMOUNT_BEST_EFFORT") {
        let best_effort = bool::from_str(&best_effort).map_err(|_| {
            anyhow!("Invalid value for SYNC_UNMOUNT_BEST_EFFORT: {}", best_effort)
        })?;
        partial_config.best_effort = Some(best_effort);
        sources.insert("best_effort".into(), "environment".into());
    }

    Ok(())
}

fn apply_cli_overrides(
    partial_config: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    cli: &Args,
) {
    if let Some(log_level) = cli.log_level {
        partial_config.log_level = Some(log_level);
        sources.insert("log_level".into(), "cli".into());
    }
    if let Some(timeout) = cli.timeout {
        partial_config.timeout = Some(timeout);
        sources.insert("timeout".into(), "cli".into());
    }
    if let Some(resolver) = cli.resolver {
        partial_config.resolver = Some(resolver);
        sources.insert("resolver".into(), "cli".into());
    }
    if let Some(mounts_file) = &cli.mounts_file {
        partial_config.mounts_file = Some(mounts_file.clone());
        sources.insert("mounts_file".into(), "cli".into());
    }
    if let Some(sync_mode) = cli.sync_mode {
        partial_config.sync_mode = Some(sync_mode);
        sources.insert("sync_mode".into(), "cli".into());
    }
    if let Some(unmount) = cli.unmount {
        partial_config.unmount = Some(unmount);
        sources.insert("unmount".into(), "cli".into());
    }
    if let Some(umount_command) = &cli.umount_command {
        partial_config.umount_command = Some(umount_command.clone());
        sources.insert("umount_command".into(), "cli".into());
    }
    if cli.lazy {
        partial_config.lazy = Some(true);
        sources.insert("lazy".into(), "cli".into());
    }
    if cli.force {
        partial_config.force = Some(true);
        sources.insert("force".into(), "cli".into());
    }
    if cli.best_effort {
        partial_config.best_effort = Some(true);
        sources.insert("best_effort".into(), "cli".into());
    }
}

fn finalize(
    partial_config: PartialConfig,
    mut sources: HashMap<String, String>,
    cli: Args,
) -> Result<Config> {
    for key in [
        "log_level",
        "timeout",
        "resolver",
        "mounts_file",
        "sync_mode",
        "unmount",
        "umount_command",
        "lazy",
        "force",
        "best_effort",
    ] {
        sources
            .entry(key.to_string())
            .or_insert_with(|| "default".to_string());
    }

    let timeout = match partial_config.timeout {
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_TIMEOUT,
    };

    let config = Config {
        log_level: partial_config.log_level.unwrap_or(log::LevelFilter::Info),
        path: cli.path,
        timeout,
        resolver: partial_config.resolver.unwrap_or(Resolver::Mounts),
        mounts_file: PathBuf::from(
            partial_config
                .mounts_file
                .unwrap_or(DEFAULT_MOUNTS_FILE.to_string()),
        ),
        sync_mode: partial_config.sync_mode.unwrap_or(super::SyncMode::Fsync),
        unmount: partial_config.unmount.unwrap_or(UnmountMethod::Command),
        umount_command: partial_config.umount_command.unwrap_or_else(|| {
            DEFAULT_UMOUNT_COMMAND.iter().map(|s| s.to_string()).collect()
        }),
        lazy: partial_config.lazy.unwrap_or(false),
        force: partial_config.force.unwrap_or(false),
        best_effort: partial_config.best_effort.unwrap_or(false),
        dry_run: cli.dry_run,
        json: cli.json,
        sources,
    };

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.path.as_os_str().is_empty() {
        return Err(anyhow!("Path must not be empty"));
    }
    if config.timeout.is_zero() {
        return Err(anyhow!("Timeout must be at least one second"));
    }
    if config.unmount == UnmountMethod::Command
        && config.umount_command.first().is_none_or(|p| p.is_empty())
    {
        return Err(anyhow!("umount_command must name a program"));
    }
    Ok(())
}
