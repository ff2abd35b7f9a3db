use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use color_eyre::{Result, eyre::Context};

use crate::library_path::normalize_component;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub duration_secs: i64,
    pub display_name: String,
    /// Path relative to the destination root
    pub file_path: String,
}

/// Collects list memberships seen during one batch and writes them out as
/// M3U files at the end.
#[derive(Debug, Default)]
pub struct PlaylistAggregator {
    lists: BTreeMap<String, Vec<PlaylistEntry>>,
}

impl PlaylistAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to a list. Entries keep the order they were registered in.
    pub fn register(&mut self, list_name: &str, entry: PlaylistEntry) {
        self.lists
            .entry(list_name.to_string())
            .or_default()
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    #[cfg(test)]
    pub fn entries(&self, list_name: &str) -> Option<&[PlaylistEntry]> {
        self.lists.get(list_name).map(Vec::as_slice)
    }

    /// Write one `<name>.m3u` per list into `directory` and return the
    /// written paths. Names that normalize to the same file name, ignoring
    /// case, get a ` (2)`, ` (3)`, ... suffix.
    pub fn flush(self, directory: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.lists.len());
        let mut used_stems = HashSet::new();

        for (name, entries) in &self.lists {
            let base_stem = normalize_component(name);
            if base_stem.is_empty() {
                log::warn!("Skipping playlist with unusable name: {:?}", name);
                continue;
            }

            let mut file_stem = base_stem.clone();
            let mut suffix = 2;
            while !used_stems.insert(file_stem.to_lowercase()) {
                file_stem = format!("{} ({})", base_stem, suffix);
                suffix += 1;
            }
            if file_stem != base_stem {
                log::warn!(
                    "Playlist '{}' collides with another list, writing it as {}.m3u",
                    name,
                    file_stem
                );
            }

            let path = directory.join(format!("{}.m3u", file_stem));
            log::debug!(
                "Writing playlist '{}' ({} entries) to {}",
                name,
                entries.len(),
                path.display()
            );
            std::fs::write(&path, render_m3u(entries))
                .context(format!("Failed to write playlist: {}", path.display()))?;
            written.push(path);
        }

        log::info!("Wrote {} playlists", written.len());
        Ok(written)
    }
}

pub fn render_m3u(entries: &[PlaylistEntry]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for entry in entries {
        out.push_str(&format!(
            "#EXTINFO:{},{}\n{}\n",
            entry.duration_secs,
            single_line(&entry.display_name),
            single_line(&entry.file_path)
        ));
    }
    out
}

/// Each record is exactly two lines, so embedded line breaks become spaces.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
