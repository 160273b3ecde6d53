use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use crr_config::SAMPLE_CONFIG;

const ENV_EXAMPLE: &str = r#"# crr environment variables
# Copy this file to .env and fill in your values.
# Leave the keys unset to use the default AWS credential provider chain.

# SOURCE_AWS_ACCESS_KEY_ID=
# SOURCE_AWS_SECRET_ACCESS_KEY=
# DESTINATION_AWS_ACCESS_KEY_ID=
# DESTINATION_AWS_SECRET_ACCESS_KEY=

# Log filter, e.g. crr=debug
# RUST_LOG=crr=info
"#;

/// Write a sample config to `config_path` and an `.env.example` next to it.
pub fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "{} already exists, skipping (use --force to overwrite)",
            config_path.display()
        );
    } else {
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(config_path, SAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Created {}", config_path.display());
    }

    let env_example_path = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".env.example");
    if !env_example_path.exists() {
        fs::write(&env_example_path, ENV_EXAMPLE)?;
        println!("Created {}", env_example_path.display());
    }

    println!("\n{}\n", "crr initialized!".green().bold());
    println!("Next steps:");
    println!("  1. Set the source and destination tables in {}", config_path.display());
    println!("  2. Copy .env.example to .env if you use static credentials");
    println!("  3. Run: crr check");
    println!("  4. Run: crr run\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crr_config::ReplicationFile;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_parseable_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("crr.toml");

        cmd_init(&config_path, false).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(ReplicationFile::parse(&content).is_ok());
        assert!(temp_dir.path().join(".env.example").exists());
    }

    #[test]
    fn test_init_keeps_existing_config_unless_forced() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("crr.toml");
        fs::write(&config_path, "# mine").unwrap();

        cmd_init(&config_path, false).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");

        cmd_init(&config_path, true).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), SAMPLE_CONFIG);
    }

    #[test]
    fn test_init_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tasks").join("orders.toml");

        cmd_init(&config_path, false).unwrap();
        assert!(config_path.exists());
    }
}
