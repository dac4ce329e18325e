use crate::error::BuildError;
use model::records::record::Record;

/// Turns a group of records into one data-manipulation statement.
pub trait StatementBuilder: Send + Sync {
    /// Returns the statement and how many records it represents. A count of
    /// zero means every record was filtered out and nothing should be sent.
    fn build(&self, records: &[Record]) -> Result<(String, usize), BuildError>;
}

/// Adapts a closure into a [`StatementBuilder`].
pub struct FnStatementBuilder<F>(pub F);

impl<F> StatementBuilder for FnStatementBuilder<F>
where
    F: Fn(&[Record]) -> Result<(String, usize), BuildError> + Send + Sync,
{
    fn build(&self, records: &[Record]) -> Result<(String, usize), BuildError> {
        (self.0)(records)
    }
}
