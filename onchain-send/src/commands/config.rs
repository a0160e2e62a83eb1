//! Show the effective configuration

use anyhow::Result;
use std::path::Path;

use onchain_send::config::SendConfig;

/// Run the show-config command
pub fn run(config: &SendConfig, path: Option<&Path>) -> Result<()> {
    let source = path
        .map(Path::to_path_buf)
        .or_else(SendConfig::default_path)
        .filter(|p| p.exists());

    match source {
        Some(p) => println!("# Loaded from {}", p.display()),
        None => println!("# Built-in defaults"),
    }

    let mut shown = config.clone();
    if shown.session.password_hash.is_some() {
        shown.session.password_hash = Some("[REDACTED]".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);

    Ok(())
}
