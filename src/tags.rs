use std::path::Path;

use color_eyre::eyre::{Context, OptionExt, Result};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};

use crate::catalog::MetadataRecord;
use crate::ports::tagging::TagWriter;

/// Writes catalog metadata into the primary tag of the decoded file,
/// creating an ID3v2 tag when the file has none.
pub struct LoftyTagWriter;

impl TagWriter for LoftyTagWriter {
    fn write_tags(&self, path: &Path, record: &MetadataRecord) -> Result<()> {
        log::debug!("Writing tags to {}", path.display());

        let mut tagged_file = Probe::open(path)
            .wrap_err_with(|| format!("Failed to open {}", path.display()))?
            .read()
            .wrap_err_with(|| format!("Failed to read audio file {}", path.display()))?;

        if tagged_file.primary_tag().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .primary_tag_mut()
            .ok_or_eyre("Audio file has no writable tag")?;
        apply_record(tag, record);

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .wrap_err_with(|| format!("Failed to save tags to {}", path.display()))?;

        Ok(())
    }
}

fn apply_record(tag: &mut Tag, record: &MetadataRecord) {
    tag.set_title(record.title.clone());
    tag.set_album(record.album.clone());
    tag.set_artist(record.artist.clone());
    tag.set_genre(record.genre.clone());
    tag.insert_text(ItemKey::AlbumArtist, record.album_artist.clone());
    tag.insert_text(ItemKey::Composer, record.composer.clone());
    tag.insert_text(
        ItemKey::FlagCompilation,
        if record.compilation { "1" } else { "0" }.to_string(),
    );

    if let Ok(year) = u32::try_from(record.year)
        && year > 0
    {
        tag.set_year(year);
    }
    if let Ok(track) = u32::try_from(record.track_number) {
        tag.set_track(track);
    }
    if let Ok(total) = u32::try_from(record.track_count)
        && total > 0
    {
        tag.set_track_total(total);
    }
    if let Ok(disc) = u32::try_from(record.disc_number)
        && disc > 0
    {
        tag.set_disk(disc);
    }
    if let Ok(total) = u32::try_from(record.disc_count)
        && total > 0
    {
        tag.set_disk_total(total);
    }
}
