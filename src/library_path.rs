use std::path::{Path, PathBuf};

use crate::catalog::MetadataRecord;

/// Characters that are illegal in file names on common filesystems.
pub const ILLEGAL_CHARACTERS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const UNKNOWN_ARTIST: &str = "unknown artist";
const UNKNOWN_ALBUM: &str = "unknown album";
const UNTITLED: &str = "untitled";

/// Remove illegal and control characters, surrounding whitespace and any
/// trailing dots. Case is preserved.
pub fn normalize_component(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARACTERS.contains(c) && !c.is_control())
        .collect();

    stripped
        .trim()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Where a track lives inside the destination tree:
/// `<album artist>/<album>/<NN> - <title>.mp3`, all lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryPath {
    pub artist: String,
    pub album: String,
    pub file_name: String,
}

impl LibraryPath {
    pub fn resolve(record: &MetadataRecord) -> Self {
        let artist = [&record.album_artist, &record.artist]
            .into_iter()
            .map(|name| normalize_component(name))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let title = or_default(normalize_component(&record.title), UNTITLED);

        Self {
            artist: artist.to_lowercase(),
            album: or_default(normalize_component(&record.album), UNKNOWN_ALBUM).to_lowercase(),
            file_name: format!("{:02} - {}.mp3", record.track_number, title).to_lowercase(),
        }
    }

    /// Path relative to the destination root.
    pub fn relative(&self) -> PathBuf {
        PathBuf::from(&self.artist)
            .join(&self.album)
            .join(&self.file_name)
    }

    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(self.relative())
    }

    pub fn album_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.artist).join(&self.album)
    }

    /// Relative reference as written into playlists.
    pub fn playlist_reference(&self) -> String {
        format!("{}/{}/{}", self.artist, self.album, self.file_name)
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(album_artist: &str, album: &str, title: &str, track_number: i32) -> MetadataRecord {
        MetadataRecord {
            album_artist: album_artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
            track_number,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_component_table() {
        let cases = [
            ("Plain Name", "Plain Name"),
            ("AC/DC", "ACDC"),
            ("What?", "What"),
            ("<Live>", "Live"),
            ("a:b\"c|d*e\\f", "abcdef"),
            ("  padded  ", "padded"),
            ("Trailing...", "Trailing"),
            ("Dots. . .", "Dots"),
            ("St. Anger", "St. Anger"),
            ("...", ""),
            ("..", ""),
            ("tab\tand\nnewline", "tabandnewline"),
            ("Björk", "Björk"),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_component(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_resolve_layout() {
        let path = LibraryPath::resolve(&record("Radiohead", "OK Computer", "Airbag", 1));
        assert_eq!(
            path.relative(),
            PathBuf::from("radiohead").join("ok computer").join("01 - airbag.mp3")
        );
        assert_eq!(path.playlist_reference(), "radiohead/ok computer/01 - airbag.mp3");
    }

    #[test]
    fn test_resolve_strips_illegal_characters() {
        let path = LibraryPath::resolve(&record("AC/DC", "Who Made Who?", "D.T.", 12));
        assert_eq!(path.artist, "acdc");
        assert_eq!(path.album, "who made who");
        assert_eq!(path.file_name, "12 - d.t.mp3");

        for component in [&path.artist, &path.album, &path.file_name] {
            assert!(!component.contains(ILLEGAL_CHARACTERS));
            assert!(!component.ends_with('.'));
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let r = record("Sigur Rós", "( )", "Untitled #1", 3);
        assert_eq!(LibraryPath::resolve(&r), LibraryPath::resolve(&r));
    }

    #[test]
    fn test_resolve_track_padding() {
        assert_eq!(LibraryPath::resolve(&record("a", "b", "c", 0)).file_name, "00 - c.mp3");
        assert_eq!(LibraryPath::resolve(&record("a", "b", "c", 7)).file_name, "07 - c.mp3");
        assert_eq!(LibraryPath::resolve(&record("a", "b", "c", 123)).file_name, "123 - c.mp3");
    }

    #[test]
    fn test_resolve_falls_back_for_empty_components() {
        let mut r = record("", "..", "???", 1);
        r.artist = "Track Artist".to_string();
        let path = LibraryPath::resolve(&r);
        assert_eq!(path.artist, "track artist");
        assert_eq!(path.album, UNKNOWN_ALBUM);
        assert_eq!(path.file_name, "01 - untitled.mp3");

        let path = LibraryPath::resolve(&MetadataRecord::default());
        assert_eq!(path.artist, UNKNOWN_ARTIST);
    }

    #[test]
    fn test_album_dir_is_shared_by_siblings() {
        let root = Path::new("/music");
        let one = LibraryPath::resolve(&record("Artist", "Album", "One", 1));
        let two = LibraryPath::resolve(&record("Artist", "Album", "Two", 2));
        assert_eq!(one.album_dir(root), two.album_dir(root));
        assert_eq!(one.absolute(root).parent(), Some(one.album_dir(root).as_path()));
    }
}
