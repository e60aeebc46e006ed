//! Show or initialize the configuration file.

use keyreel_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, init: bool, force: bool) -> anyhow::Result<()> {
    let path = config_file_path();

    if init {
        if path.exists() && !force {
            anyhow::bail!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
        AppConfig::default().save_to(&path)?;
        println!("Wrote default config: {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
