use crate::{
    config::Config,
    outln,
    sync_unmount::SyncUnmount,
    util::set_json_output,
};
use anyhow::Result;
use serde_json::json;

pub fn run(config: &Config) -> Result<()> {
    set_json_output("path", &json!(config.path.to_string_lossy()));

    let outcome = SyncUnmount::from_config(config).run(&config.path)?;

    set_json_output("mount_point", &json!(outcome.mount_point.to_string_lossy()));
    set_json_output("synced", &json!(true));
    set_json_output("unmounted", &json!(outcome.unmounted));

    outln!("Synced {}", outcome.mount_point.display());
    if outcome.unmounted {
        outln!("Unmounted {}", outcome.mount_point.display());
    } else {
        outln!("Left {} mounted", outcome.mount_point.display());
    }
    Ok(())
}
