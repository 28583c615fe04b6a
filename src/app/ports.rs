use crate::domain::Table;
use crate::error::Result;

/// Where raw source tables come from.
pub trait RawTableSource {
    /// Load the raw, uncleaned table for `source_id`.
    fn load(&self, source_id: &str) -> Result<Table>;
}
