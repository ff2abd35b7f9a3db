use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Context, eyre};

use crate::catalog::MetadataRecord;
use crate::config::DecryptSettings;
use crate::container::{self, CachedObject, ContainerError, ContainerKind, DecodeStats};
use crate::covers;
use crate::library_path::LibraryPath;
use crate::playlist::{PlaylistAggregator, PlaylistEntry};
use crate::ports::catalog::Catalog;
use crate::ports::covers::CoverFetcher;
use crate::ports::tagging::TagWriter;

/// Extension of the cached objects on the device.
pub const SOURCE_EXTENSION: &str = "mp3";

/// Conditions that make the whole run pointless.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("No files found in {path}")]
    NoObjectsFound { path: String },

    #[error("Catalog unavailable at {path}: {error_message}")]
    CatalogUnavailable { path: String, error_message: String },

    #[error("Cannot read source directory {path}: {error_message}")]
    SourceUnreadable { path: String, error_message: String },

    #[error("Cannot create destination directory {path}: {error_message}")]
    DestinationUnwritable { path: String, error_message: String },

    #[error("Failed to write playlists: {error_message}")]
    PlaylistWrite { error_message: String },
}

/// Errors that end processing of a single object. The batch carries on.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("No catalog record for {file_name}")]
    MissingMetadata { file_name: String },

    #[error("Catalog error during {operation}: {error_message}")]
    CatalogError {
        operation: String,
        error_message: String,
    },

    #[error("Cannot decode {path}: {source}")]
    Container {
        path: String,
        #[source]
        source: ContainerError,
    },

    #[error("File system error during {operation} on {path}: {error_message}")]
    FileSystemError {
        operation: String,
        path: String,
        error_message: String,
    },
}

impl DecryptError {
    /// Missing metadata is an expected skip rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, DecryptError::MissingMetadata { .. })
    }

    fn file_system(operation: &str, path: &Path, error: impl std::fmt::Display) -> Self {
        DecryptError::FileSystemError {
            operation: operation.to_string(),
            path: path.display().to_string(),
            error_message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    Present,
    Fetched,
    Failed,
    Unavailable,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    /// The destination was (re)materialized from the cached object.
    Decoded {
        destination: PathBuf,
        kind: ContainerKind,
        tagged: bool,
        cover: CoverOutcome,
    },
    /// An existing destination was kept because skip-existing is on.
    Reused {
        destination: PathBuf,
        cover: CoverOutcome,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub decrypted: usize,
    pub copied: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
    pub untagged: usize,
    pub covers_fetched: usize,
    pub cover_failures: usize,
    pub playlists_written: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn record(&mut self, result: &Result<ObjectOutcome, DecryptError>) {
        let cover = match result {
            Ok(ObjectOutcome::Decoded {
                kind, tagged, cover, ..
            }) => {
                match kind {
                    ContainerKind::Encrypted => self.decrypted += 1,
                    ContainerKind::Plain => self.copied += 1,
                }
                if !tagged {
                    self.untagged += 1;
                }
                *cover
            }
            Ok(ObjectOutcome::Reused { cover, .. }) => {
                self.reused += 1;
                *cover
            }
            Err(e) if e.is_skip() => {
                self.skipped += 1;
                return;
            }
            Err(_) => {
                self.failed += 1;
                return;
            }
        };

        match cover {
            CoverOutcome::Fetched => self.covers_fetched += 1,
            CoverOutcome::Failed => self.cover_failures += 1,
            _ => {}
        }
    }
}

/// Find every cached object directly inside `source_dir`, in file name order.
pub fn discover_objects(source_dir: &Path) -> Result<Vec<CachedObject>, BatchError> {
    if !source_dir.is_dir() {
        return Err(BatchError::SourceUnreadable {
            path: source_dir.display().to_string(),
            error_message: "not a directory".to_string(),
        });
    }

    let mut objects = Vec::new();
    for entry in walkdir::WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Cannot read directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
            continue;
        }

        match CachedObject::open(entry.path()) {
            Ok(object) => objects.push(object),
            Err(e) => log::warn!("Cannot open {}: {}", entry.path().display(), e),
        }
    }

    if objects.is_empty() {
        return Err(BatchError::NoObjectsFound {
            path: source_dir.display().to_string(),
        });
    }

    log::debug!(
        "Found {} cached objects in {}",
        objects.len(),
        source_dir.display()
    );
    Ok(objects)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// Drives the catalog, codec, tagger and cover fetcher over a whole source
/// directory.
pub struct LibraryDecrypter<C, T, F> {
    settings: DecryptSettings,
    catalog: Arc<C>,
    tag_writer: T,
    cover_fetcher: F,
}

impl<C, T, F> LibraryDecrypter<C, T, F>
where
    C: Catalog,
    T: TagWriter,
    F: CoverFetcher,
{
    pub fn new(settings: DecryptSettings, catalog: Arc<C>, tag_writer: T, cover_fetcher: F) -> Self {
        Self {
            settings,
            catalog,
            tag_writer,
            cover_fetcher,
        }
    }

    /// Process every cached object. Per-object problems are logged and
    /// counted; only batch-level conditions return an error.
    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        let start = Instant::now();
        log::info!(
            "Decrypting files from {} into {}",
            self.settings.source_dir.display(),
            self.settings.destination_dir.display()
        );

        let objects = discover_objects(&self.settings.source_dir)?;

        std::fs::create_dir_all(&self.settings.destination_dir).map_err(|e| {
            BatchError::DestinationUnwritable {
                path: self.settings.destination_dir.display().to_string(),
                error_message: e.to_string(),
            }
        })?;

        let mut playlists = PlaylistAggregator::new();
        let mut summary = BatchSummary {
            total: objects.len(),
            ..Default::default()
        };

        for (index, object) in objects.iter().enumerate() {
            log::debug!(
                "Processing file {}/{}: {} ({} bytes)",
                index + 1,
                objects.len(),
                object.path.display(),
                object.len
            );

            let result = self.process_object(object, &mut playlists).await;
            match &result {
                Ok(ObjectOutcome::Decoded { destination, .. }) => {
                    log::debug!("Completed {}", destination.display());
                }
                Ok(ObjectOutcome::Reused { destination, .. }) => {
                    log::debug!("Reused {}", destination.display());
                }
                Err(e) if e.is_skip() => {
                    log::warn!("Skipping file {} ({})", object.path.display(), e);
                }
                Err(e) => {
                    log::warn!("Failed to process {}: {}", object.path.display(), e);
                }
            }
            summary.record(&result);
        }

        if self.settings.write_playlists {
            let written = playlists.flush(&self.settings.destination_dir).map_err(|e| {
                BatchError::PlaylistWrite {
                    error_message: format!("{:#}", e),
                }
            })?;
            summary.playlists_written = written.len();
        } else if !playlists.is_empty() {
            log::debug!(
                "Discarding {} playlists, playlist writing is off",
                playlists.len()
            );
        }

        summary.elapsed = start.elapsed();
        log::info!(
            "Decryption finished ({:.1}s)! {} decrypted, {} copied, {} reused, {} skipped, {} failed",
            summary.elapsed.as_secs_f64(),
            summary.decrypted,
            summary.copied,
            summary.reused,
            summary.skipped,
            summary.failed
        );
        if summary.untagged > 0 {
            log::warn!("{} files could not be tagged", summary.untagged);
        }

        Ok(summary)
    }

    async fn process_object(
        &self,
        object: &CachedObject,
        playlists: &mut PlaylistAggregator,
    ) -> Result<ObjectOutcome, DecryptError> {
        let file_name = object.file_name();
        let record = self
            .catalog
            .lookup(&file_name)
            .await
            .map_err(|e| DecryptError::CatalogError {
                operation: format!("lookup of {}", file_name),
                error_message: format!("{:#}", e),
            })?
            .ok_or_else(|| DecryptError::MissingMetadata {
                file_name: file_name.clone(),
            })?;

        let library_path = LibraryPath::resolve(&record);
        let root = &self.settings.destination_dir;
        let destination = library_path.absolute(root);
        let album_dir = library_path.album_dir(root);

        let action = if object.kind.is_encrypted() {
            "Decrypting"
        } else {
            "Copying"
        };
        log::info!(
            "{} file {} -> {}",
            action,
            object.path.display(),
            library_path.relative().display()
        );

        std::fs::create_dir_all(&album_dir)
            .map_err(|e| DecryptError::file_system("create directory", &album_dir, e))?;

        remove_if_older(object, &destination)?;

        let outcome = if destination.is_file() && self.settings.skip_existing_decrypted {
            log::debug!(
                "Skipping {}, {} already exists",
                object.path.display(),
                destination.display()
            );
            ObjectOutcome::Reused {
                cover: self.ensure_cover(&record, &album_dir).await,
                destination,
            }
        } else {
            if destination.exists() {
                log::debug!(
                    "Removing previous file {}, skip existing is off",
                    destination.display()
                );
                std::fs::remove_file(&destination)
                    .map_err(|e| DecryptError::file_system("remove file", &destination, e))?;
            }

            let stats = decode_to_file(object, &record, &destination)?;
            log::debug!(
                "Wrote {} bytes ({} frames) to {}",
                stats.bytes_written,
                stats.frames,
                destination.display()
            );

            let tagged = match self.tag_writer.write_tags(&destination, &record) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Failed to tag {}: {:#}", destination.display(), e);
                    false
                }
            };

            ObjectOutcome::Decoded {
                kind: stats.kind,
                tagged,
                cover: self.ensure_cover(&record, &album_dir).await,
                destination,
            }
        };

        self.register_playlists(&record, &library_path, playlists)
            .await;
        self.cleanup_source(object);

        Ok(outcome)
    }

    async fn ensure_cover(&self, record: &MetadataRecord, album_dir: &Path) -> CoverOutcome {
        if !self.settings.fetch_covers {
            return CoverOutcome::Disabled;
        }
        if covers::has_cover(album_dir) {
            return CoverOutcome::Present;
        }
        let Some(uri) = record.album_art_location.as_deref() else {
            return CoverOutcome::Unavailable;
        };

        match self.cover_fetcher.fetch_cover(uri, album_dir).await {
            Ok(path) => {
                log::debug!("Fetched cover {}", path.display());
                CoverOutcome::Fetched
            }
            Err(e) => {
                log::warn!("Failed to fetch cover {}: {:#}", uri, e);
                CoverOutcome::Failed
            }
        }
    }

    async fn register_playlists(
        &self,
        record: &MetadataRecord,
        library_path: &LibraryPath,
        playlists: &mut PlaylistAggregator,
    ) {
        let names = match self.catalog.playlist_names(record.id).await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Failed to look up playlists for track {}: {:#}", record.id, e);
                return;
            }
        };

        for name in names {
            playlists.register(
                &name,
                PlaylistEntry {
                    duration_secs: record.duration_secs(),
                    display_name: format!("{} - {}", record.album_artist, record.title),
                    file_path: library_path.playlist_reference(),
                },
            );
        }
    }

    fn cleanup_source(&self, object: &CachedObject) {
        if self.settings.keep_encrypted_files {
            log::debug!("Keeping {}", object.path.display());
            return;
        }

        log::debug!("Removing {}", object.path.display());
        if let Err(e) = std::fs::remove_file(&object.path) {
            log::warn!("Failed to remove {}: {}", object.path.display(), e);
        }
    }
}

/// A destination older than its source is stale and must be regenerated,
/// whatever the skip-existing setting says.
fn remove_if_older(object: &CachedObject, destination: &Path) -> Result<(), DecryptError> {
    let Ok(metadata) = std::fs::metadata(destination) else {
        return Ok(());
    };
    if !metadata.is_file() {
        return Ok(());
    }

    let modified = metadata
        .modified()
        .map_err(|e| DecryptError::file_system("read modification time", destination, e))?;

    if modified < object.modified {
        log::debug!(
            "Removing previous file {}, it is older than {}",
            destination.display(),
            object.path.display()
        );
        std::fs::remove_file(destination)
            .map_err(|e| DecryptError::file_system("remove file", destination, e))?;
    }
    Ok(())
}

/// Decode into `destination`, removing whatever was written if decoding fails.
fn decode_to_file(
    object: &CachedObject,
    record: &MetadataRecord,
    destination: &Path,
) -> Result<DecodeStats, DecryptError> {
    let source = File::open(&object.path)
        .map_err(|e| DecryptError::file_system("open file", &object.path, e))?;
    let dest = File::create(destination)
        .map_err(|e| DecryptError::file_system("create file", destination, e))?;

    match container::decode(
        BufReader::new(source),
        BufWriter::new(dest),
        record.cp_data.as_deref(),
    ) {
        Ok(stats) => Ok(stats),
        Err(source) => {
            if let Err(e) = std::fs::remove_file(destination) {
                log::warn!(
                    "Failed to remove partial file {}: {}",
                    destination.display(),
                    e
                );
            }
            Err(DecryptError::Container {
                path: object.path.display().to_string(),
                source,
            })
        }
    }
}

/// Decode one cached object to `output`, or to stdout when `output` is
/// `None`. No tags are written.
pub async fn decode_single<C: Catalog>(
    catalog: &C,
    input: &Path,
    output: Option<&Path>,
) -> color_eyre::Result<DecodeStats> {
    let object =
        CachedObject::open(input).wrap_err_with(|| format!("Failed to open {}", input.display()))?;
    let file_name = object.file_name();
    let record = catalog
        .lookup(&file_name)
        .await?
        .ok_or_else(|| eyre!("No catalog record for {}", file_name))?;

    log::info!(
        "{} - {} ({})",
        record.album_artist,
        record.title,
        LibraryPath::resolve(&record).playlist_reference()
    );

    let source = BufReader::new(File::open(input)?);
    let key = record.cp_data.as_deref();
    let stats = match output {
        Some(path) => {
            let dest = File::create(path)
                .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
            container::decode(source, BufWriter::new(dest), key)
        }
        None => container::decode(source, std::io::stdout().lock(), key),
    }
    .wrap_err_with(|| format!("Failed to decode {}", input.display()))?;

    Ok(stats)
}
