mod catalog;
mod config;
mod container;
mod covers;
mod decrypt_library;
mod entities;
mod library_path;
mod logging;
mod playlist;
mod ports;
mod tags;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    catalog::SqliteCatalog,
    config::{Config, Overrides},
    covers::downloader::HttpCoverFetcher,
    decrypt_library::{BatchError, LibraryDecrypter, decode_single},
    logging::setup_logging,
    tags::LoftyTagWriter,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "GPM_DECRYPT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "GPM_DECRYPT_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn is_directory(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_dir() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing directory", s))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decrypt a cached library into an organized music folder
    Decrypt {
        /// Where the decrypted library is written
        destination_dir: Option<PathBuf>,

        /// Directory with the cached objects (default: <destination>/encrypted)
        #[arg(short, long, value_parser = is_directory)]
        library: Option<PathBuf>,

        /// The music database (default: <destination>/music.db)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Reuse files that were already decrypted
        #[arg(short, long)]
        skip_existing: bool,

        /// Keep cached objects after processing
        #[arg(short, long)]
        keep_encrypted: bool,

        /// Write one .m3u file per playlist
        #[arg(short = 'p', long)]
        write_playlists: bool,

        /// Do not download album art
        #[arg(long)]
        no_covers: bool,
    },
    /// Decrypt a single cached object without tagging it
    File {
        /// The cached object
        input: PathBuf,

        /// The music database
        #[arg(short, long)]
        database: PathBuf,

        /// Output file, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

async fn open_catalog(path: &std::path::Path) -> Result<SqliteCatalog, BatchError> {
    SqliteCatalog::open(path)
        .await
        .map_err(|e| BatchError::CatalogUnavailable {
            path: path.display().to_string(),
            error_message: format!("{:#}", e),
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("gpm-decrypt starting");
    log::debug!("Loading configuration");

    let config = {
        if let Some(config) = args.config {
            Config::from_file(&config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load gpm-decrypt config")?;

    match args.command {
        Commands::Decrypt {
            destination_dir,
            library,
            database,
            skip_existing,
            keep_encrypted,
            write_playlists,
            no_covers,
        } => {
            let settings = config.settings(&Overrides {
                destination: destination_dir,
                library,
                database,
                skip_existing,
                keep_encrypted,
                write_playlists,
                no_covers,
            });
            log::debug!("Settings: {:?}", settings);

            let catalog = Arc::new(
                open_catalog(&settings.database)
                    .await
                    .inspect_err(|e| log::error!("{}", e))?,
            );
            let cover_fetcher = HttpCoverFetcher::new(settings.cover_timeout)?;
            let decrypter = LibraryDecrypter::new(settings, catalog, LoftyTagWriter, cover_fetcher);

            let summary = decrypter
                .run()
                .await
                .inspect_err(|e| log::error!("{}", e))?;
            log::debug!("Summary: {:?}", summary);
        }
        Commands::File {
            input,
            database,
            output,
        } => {
            let catalog = open_catalog(&database).await?;
            let output = (output.as_os_str() != "-").then_some(output);
            let stats = decode_single(&catalog, &input, output.as_deref()).await?;
            log::info!(
                "Wrote {} bytes ({} frames) from {}",
                stats.bytes_written,
                stats.frames,
                input.display()
            );
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                log::info!("Default config created at: {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}
