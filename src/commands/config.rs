//! Config subcommands handler

use anyhow::Result;
use std::path::Path;

use logsift::Config;

/// Show the effective configuration (file plus environment overrides) as TOML.
#[cfg(not(tarpaulin_include))]
pub fn handle_show() -> Result<()> {
    let config = Config::load()?;
    println!("# {}", Config::config_path()?.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Write the default configuration file.
#[cfg(not(tarpaulin_include))]
pub fn handle_init(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init_at(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    Ok(())
}

/// Write defaults to `path`; returns false if a file exists and `force` is off.
pub(crate) fn init_at(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Config::default().save_to(path)?;
    Ok(true)
}
