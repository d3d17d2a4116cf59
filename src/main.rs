#![allow(
    clippy::collapsible_else_if,
    clippy::collapsible_if,
    clippy::module_inception,
    clippy::result_map_unit_fn,
    clippy::useless_format
)]
#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::used_underscore_binding,
    clippy::used_underscore_items
)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::use_debug))]

mod actions;
mod config;
mod logger;
mod sync_unmount;
mod util;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;
use config::{cli, resolve_config};
use log::Log;
use serde_json::Value;
use util::{print_json_output, set_json_output, set_should_print_output};

pub fn main() -> Result<()> {
    // Returns straight away unless the shell asked for completions via COMPLETE
    CompleteEnv::with_factory(cli::Args::command).complete();

    let logger = logger::SyncUnmountLogger::new(log::LevelFilter::Trace)
        .init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
    let cli: cli::Args = cli::Args::parse();

    logger.set_level(cli.log_level.unwrap_or(log::LevelFilter::Info));

    let config = match resolve_config(cli) {
        Ok(config) => config,
        Err(e) => {
            // Whatever was logged before the failure is shown at the CLI level
            logger.print_deferred();
            logger.flush();
            return Err(e).context("Resolving config");
        }
    };

    // Replay anything logged while resolving the config at the level it settled on
    logger.set_level(config.log_level);
    logger.print_deferred();

    set_should_print_output(!config.json);

    let result = if config.dry_run {
        actions::dry_run(&config)
    } else {
        actions::run(&config)
    };

    if config.json {
        match &result {
            Ok(()) => {
                set_json_output("status", &Value::String("success".to_string()));
            }
            Err(e) => {
                set_json_output("status", &Value::String("error".to_string()));
                set_json_output("error", &Value::String(format!("{:#}", e)));
            }
        }
        print_json_output()?;
        if result.is_err() {
            logger.flush();
            std::process::exit(1);
        }
    }

    logger.flush();
    result
}
