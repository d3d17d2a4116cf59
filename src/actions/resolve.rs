use crate::{
    config::Config,
    outln,
    sync_unmount::SyncUnmount,
    util::set_json_output,
};
use anyhow::Result;
use serde_json::json;

/// Resolves the mount point without flushing or unmounting anything.
pub fn dry_run(config: &Config) -> Result<()> {
    set_json_output("path", &json!(config.path.to_string_lossy()));

    let mount_point = SyncUnmount::from_config(config).resolve(&config.path)?;

    set_json_output("mount_point", &json!(mount_point.to_string_lossy()));
    set_json_output("synced", &json!(false));
    set_json_output("unmounted", &json!(false));
    outln!("{}", mount_point.display());
    Ok(())
}
