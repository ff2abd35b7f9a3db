use std::path::Path;

pub mod downloader;

/// File names recognised as an album directory's cover image.
pub const COVER_FILE_NAMES: [&str; 2] = ["cover.jpg", "cover.png"];

pub fn has_cover(directory: &Path) -> bool {
    COVER_FILE_NAMES
        .iter()
        .any(|name| directory.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_cover() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_cover(dir.path()));

        std::fs::write(dir.path().join("folder.jpg"), b"x").unwrap();
        assert!(!has_cover(dir.path()));

        std::fs::write(dir.path().join("cover.png"), b"x").unwrap();
        assert!(has_cover(dir.path()));
    }

    #[test]
    fn test_has_cover_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_cover(&dir.path().join("absent")));
    }
}
