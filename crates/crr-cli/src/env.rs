use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Name of the dotenv file for `env`: `.env` or `.env.{env}`.
pub fn dotenv_file_name(env: Option<&str>) -> String {
    match env {
        Some(name) => format!(".env.{}", name),
        None => ".env".to_string(),
    }
}

/// Load the dotenv file from the current directory or the closest ancestor
/// that has one.
///
/// A missing `.env` is fine since credentials may come from the default
/// provider chain, but a named environment (`--env staging`) must exist.
pub fn load_dotenv_from_ancestors(env: Option<&str>) -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let file_name = dotenv_file_name(env);

    let mut current = cwd.as_path();
    loop {
        let env_path = current.join(&file_name);
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("Failed to load {}", env_path.display()))?;
            info!("Loaded {}", env_path.display());
            return Ok(Some(env_path));
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    if env.is_some() {
        anyhow::bail!(
            "No {} file found.\n\n\
            Searched from {} to filesystem root.",
            file_name,
            cwd.display()
        );
    }

    debug!("No .env file found, using the process environment");
    Ok(None)
}
