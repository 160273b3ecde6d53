use crate::error::{ConfigError, ConfigResult};
use crate::file::{ReplicationFile, MAX_BATCH_SIZE};
use crate::region::is_known_region;

/// Validate a replication configuration before anything is resolved.
pub fn validate_replication(config: &ReplicationFile) -> ConfigResult<()> {
    validate_tables(config)?;
    validate_regions(config)?;
    validate_batch_size(config.worker.batch_size)?;
    validate_pipelines(config)?;
    Ok(())
}

fn validate_tables(config: &ReplicationFile) -> ConfigResult<()> {
    if config.source.table.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "source.table".into(),
        });
    }
    if config.destination.table.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "destination.table".into(),
        });
    }
    Ok(())
}

fn validate_regions(config: &ReplicationFile) -> ConfigResult<()> {
    let regions = [
        Some(&config.source.region),
        Some(&config.destination.region),
        config.lease.region.as_ref(),
    ];
    for region in regions.into_iter().flatten() {
        if !is_known_region(region) {
            return Err(ConfigError::UnknownRegion {
                region: region.clone(),
            });
        }
    }
    Ok(())
}

/// Batch size must fit a single `GetRecords` page.
pub fn validate_batch_size(batch_size: u32) -> ConfigResult<()> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::InvalidBatchSize {
            value: batch_size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

fn validate_pipelines(config: &ReplicationFile) -> ConfigResult<()> {
    if config.pipelines.is_empty() {
        return Err(crr_core::Error::NoPipelines.into());
    }

    if let Some(writer) = &config.checkpoint_writer {
        if !config.pipelines.contains(writer) {
            return Err(ConfigError::UnknownCheckpointWriter {
                writer: writer.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_validate(toml: &str) -> ConfigResult<()> {
        let config = ReplicationFile::parse(toml)?;
        validate_replication(&config)
    }

    const SIDES: &str = r#"
[source]
region = "us-east-1"
table = "orders"

[destination]
region = "eu-west-1"
table = "orders"
"#;

    #[test]
    fn test_validate_minimal_valid() {
        assert!(parse_and_validate(SIDES).is_ok());
    }

    #[test]
    fn test_validate_empty_table() {
        let toml = r#"
[source]
region = "us-east-1"
table = ""

[destination]
region = "eu-west-1"
table = "orders"
"#;
        let result = parse_and_validate(toml);
        assert!(
            matches!(result, Err(ConfigError::MissingField { ref field }) if field == "source.table")
        );
    }

    #[test]
    fn test_validate_unknown_lease_region() {
        let toml = format!("{}\n[lease]\nregion = \"moon-1\"\n", SIDES);
        let result = parse_and_validate(&toml);
        assert!(matches!(result, Err(ConfigError::UnknownRegion { .. })));
    }

    #[test]
    fn test_validate_batch_size_bounds() {
        assert!(validate_batch_size(1).is_ok());
        assert!(validate_batch_size(1000).is_ok());
        assert!(matches!(
            validate_batch_size(0),
            Err(ConfigError::InvalidBatchSize { value: 0, .. })
        ));
        assert!(matches!(
            validate_batch_size(1001),
            Err(ConfigError::InvalidBatchSize { value: 1001, .. })
        ));
    }

    #[test]
    fn test_validate_no_pipelines() {
        let toml = format!("pipelines = []\n{}", SIDES);
        let result = parse_and_validate(&toml);
        assert!(matches!(
            result,
            Err(ConfigError::Pipeline(crr_core::Error::NoPipelines))
        ));
    }

    #[test]
    fn test_validate_checkpoint_writer() {
        let toml = format!(
            "pipelines = [\"master-to-replicas\"]\ncheckpoint_writer = \"audit\"\n{}",
            SIDES
        );
        let result = parse_and_validate(&toml);
        assert!(
            matches!(result, Err(ConfigError::UnknownCheckpointWriter { ref writer }) if writer == "audit")
        );

        let toml = format!("checkpoint_writer = \"master-to-replicas\"\n{}", SIDES);
        assert!(parse_and_validate(&toml).is_ok());
    }
}
