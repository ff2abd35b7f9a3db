use color_eyre::eyre::Result;

use crate::catalog::MetadataRecord;

/// Read-only lookups against the vendor music catalog.
///
/// Implemented by `catalog::SqliteCatalog` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Find the record whose local copy is the given base filename.
    async fn lookup(&self, file_name: &str) -> Result<Option<MetadataRecord>>;

    /// Names of every list the track belongs to, once per membership.
    async fn playlist_names(&self, music_id: i64) -> Result<Vec<String>>;
}
