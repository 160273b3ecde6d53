use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crr_config::ReplicationFile;

use crate::cli::Overrides;

/// Resolve environment variables in config text.
/// Supports ${VAR_NAME} syntax. Comment lines are left untouched.
pub fn resolve_env(content: &str) -> Result<String> {
    let mut resolved = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            resolved.push_str(line);
            continue;
        }

        let mut rest = line;
        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let var_name = &rest[start + 2..start + len];
            let value = std::env::var(var_name).with_context(|| {
                format!("Environment variable {} referenced in config is not set", var_name)
            })?;
            resolved.push_str(&rest[..start]);
            resolved.push_str(&value);
            rest = &rest[start + len + 1..];
        }
        resolved.push_str(rest);
    }

    Ok(resolved)
}

/// Command-line settings win over the file.
pub fn apply_overrides(config: &mut ReplicationFile, overrides: &Overrides) {
    if let Some(task_name) = &overrides.task_name {
        config.task_name = Some(task_name.clone());
    }
    if let Some(batch_size) = overrides.batch_size {
        config.worker.batch_size = batch_size;
    }
    if overrides.no_metrics {
        config.worker.publish_metrics = false;
    }
}

/// Read, resolve and parse the replication config at `path`.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<ReplicationFile> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\nRun `crr init` to create one.",
            path.display()
        )
    })?;

    let content = resolve_env(&content)?;
    let mut config = ReplicationFile::parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    apply_overrides(&mut config, overrides);
    Ok(config)
}
