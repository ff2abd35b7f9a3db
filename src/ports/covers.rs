use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;

/// Retrieves album art into an album directory.
///
/// Implementations live in `covers::downloader` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CoverFetcher: Send + Sync {
    /// Download the image at `uri` and store it as `cover.jpg` or `cover.png`
    /// inside `directory`, returning the written path.
    async fn fetch_cover(&self, uri: &str, directory: &Path) -> Result<PathBuf>;
}
