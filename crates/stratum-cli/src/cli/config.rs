//! `stratum config` -- print the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use stratum_infra::config::to_toml;
use stratum_types::config::BusConfig;

pub fn show(config: &BusConfig, path: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, defaults)", path.display())
    };
    println!("{}", style(format!("# source: {source}")).dim());
    print!("{}", to_toml(config)?);
    Ok(())
}
