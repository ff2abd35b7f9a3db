use std::path::Path;

use color_eyre::eyre::Result;

use crate::catalog::MetadataRecord;

/// Persists catalog metadata into a materialized audio file.
#[cfg_attr(test, mockall::automock)]
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, record: &MetadataRecord) -> Result<()>;
}
