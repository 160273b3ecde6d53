use crate::error::Result;
use crate::types::ChangeRecord;

/// Trait for transforming stream records before they are buffered.
pub trait RecordTransformer: Send + Sync {
    /// Transform a record into the record that will be emitted.
    fn transform(&self, record: ChangeRecord) -> Result<ChangeRecord>;
}

/// Passes records through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl IdentityTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl RecordTransformer for IdentityTransformer {
    fn transform(&self, record: ChangeRecord) -> Result<ChangeRecord> {
        Ok(record)
    }
}

/// A transformer that wraps a function.
#[cfg(test)]
pub(crate) struct FnTransformer<F>
where
    F: Fn(ChangeRecord) -> Result<ChangeRecord> + Send + Sync,
{
    func: F,
}

#[cfg(test)]
impl<F> FnTransformer<F>
where
    F: Fn(ChangeRecord) -> Result<ChangeRecord> + Send + Sync,
{
    pub(crate) fn new(func: F) -> Self {
        Self { func }
    }
}

#[cfg(test)]
impl<F> RecordTransformer for FnTransformer<F>
where
    F: Fn(ChangeRecord) -> Result<ChangeRecord> + Send + Sync,
{
    fn transform(&self, record: ChangeRecord) -> Result<ChangeRecord> {
        (self.func)(record)
    }
}
