use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

type Constructor = Box<dyn Fn() -> Arc<dyn Pipeline> + Send + Sync>;

/// Maps symbolic pipeline names to their constructors.
#[derive(Default)]
pub struct PipelineRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Pipeline> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the pipeline registered under `name`.
    pub fn build(&self, name: &str) -> Result<Arc<dyn Pipeline>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| Error::UnknownPipeline {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Construct every named pipeline, preserving order.
    pub fn build_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Pipeline>>> {
        if names.is_empty() {
            return Err(Error::NoPipelines);
        }
        names.iter().map(|name| self.build(name.as_ref())).collect()
    }
}
