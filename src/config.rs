use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{Result, eyre::Context};
use serde::{Deserialize, Serialize};

const DEFAULT_COVER_TIMEOUT_SECS: u64 = 30;

const DEFAULT_CONFIG: &str = r#"# gpm-decrypt configuration

# Directory with the cached objects pulled from the device
# library = "~/gpm/encrypted"

# Where the decrypted library is written
# destination = "~/Music"

# The device's music database
# database = "~/gpm/music.db"

# Reuse already decrypted files instead of regenerating them
skip_existing_decrypted = false

# Keep cached objects after they have been processed
keep_encrypted_files = false

# Write one .m3u file per playlist into the destination directory
write_playlists = false

# Download album art into each album directory
fetch_covers = true
cover_timeout_secs = 30
"#;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    library: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    skip_existing_decrypted: bool,
    #[serde(default)]
    keep_encrypted_files: bool,
    #[serde(default)]
    write_playlists: bool,
    #[serde(default)]
    fetch_covers: Option<bool>,
    #[serde(default)]
    cover_timeout_secs: Option<u64>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub destination: Option<PathBuf>,
    pub library: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub skip_existing: bool,
    pub keep_encrypted: bool,
    pub write_playlists: bool,
    pub no_covers: bool,
}

/// Immutable settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptSettings {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub database: PathBuf,
    pub skip_existing_decrypted: bool,
    pub keep_encrypted_files: bool,
    pub write_playlists: bool,
    pub fetch_covers: bool,
    pub cover_timeout: Duration,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("gpm-decrypt").join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when it does
    /// not exist.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the commented default config, unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| color_eyre::eyre::eyre!("No config directory available"))?;

        if path.exists() {
            log::info!("Config already exists at: {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create config directory: {}",
                parent.display()
            ))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG)
            .context(format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Merge the file with command-line overrides into the settings for a run.
    pub fn settings(&self, overrides: &Overrides) -> DecryptSettings {
        let destination_dir = overrides
            .destination
            .clone()
            .or_else(|| self.destination.as_deref().map(Self::expand_path))
            .unwrap_or_else(|| PathBuf::from("."));

        let source_dir = overrides
            .library
            .clone()
            .or_else(|| self.library.as_deref().map(Self::expand_path))
            .unwrap_or_else(|| destination_dir.join("encrypted"));

        let database = overrides
            .database
            .clone()
            .or_else(|| self.database.as_deref().map(Self::expand_path))
            .unwrap_or_else(|| destination_dir.join("music.db"));

        DecryptSettings {
            source_dir,
            database,
            skip_existing_decrypted: overrides.skip_existing || self.skip_existing_decrypted,
            keep_encrypted_files: overrides.keep_encrypted || self.keep_encrypted_files,
            write_playlists: overrides.write_playlists || self.write_playlists,
            fetch_covers: !overrides.no_covers && self.fetch_covers.unwrap_or(true),
            cover_timeout: Duration::from_secs(
                self.cover_timeout_secs
                    .unwrap_or(DEFAULT_COVER_TIMEOUT_SECS),
            ),
            destination_dir,
        }
    }
}
