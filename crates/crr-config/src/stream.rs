use crate::error::{ConfigError, ConfigResult};

/// The only stream view type replication can work from.
pub const DUAL_IMAGE_VIEW_TYPE: &str = "NEW_AND_OLD_IMAGES";

/// A change stream that has been checked to carry both item images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    stream_id: String,
    view_type: String,
}

impl StreamDescriptor {
    /// Accept a described stream if it records both old and new images.
    pub fn new(stream_id: String, view_type: Option<&str>) -> ConfigResult<Self> {
        match view_type {
            Some(DUAL_IMAGE_VIEW_TYPE) => Ok(Self {
                stream_id,
                view_type: DUAL_IMAGE_VIEW_TYPE.to_string(),
            }),
            other => Err(ConfigError::StreamNotReady {
                stream_id,
                view_type: other.unwrap_or("disabled").to_string(),
            }),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn view_type(&self) -> &str {
        &self.view_type
    }
}

/// The latest stream id of `table`, if it has one.
pub fn require_stream_id(table: &str, stream_id: Option<String>) -> ConfigResult<String> {
    stream_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::NoStreamFound {
            table: table.to_string(),
        })
}
