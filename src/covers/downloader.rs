use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, Result, bail, eyre};
use futures_util::StreamExt;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use tempfile::NamedTempFile;
use url::Url;

use crate::ports::covers::CoverFetcher;

/// Bytes kept from the start of the download for format sniffing.
const SNIFF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverFormat {
    Jpeg,
    Png,
    Webp,
}

impl CoverFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match infer::get(bytes)?.mime_type() {
            "image/jpeg" => Some(CoverFormat::Jpeg),
            "image/png" => Some(CoverFormat::Png),
            "image/webp" => Some(CoverFormat::Webp),
            _ => None,
        }
    }

    /// WebP is not widely understood by players, so it is stored as PNG.
    pub fn stored_file_name(self) -> &'static str {
        match self {
            CoverFormat::Jpeg => "cover.jpg",
            CoverFormat::Png | CoverFormat::Webp => "cover.png",
        }
    }
}

pub struct HttpCoverFetcher {
    client: Client,
}

impl HttpCoverFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl CoverFetcher for HttpCoverFetcher {
    async fn fetch_cover(&self, uri: &str, directory: &Path) -> Result<PathBuf> {
        let url = parse_cover_url(uri)?;
        log::debug!("Fetching cover {} into {}", url, directory.display());

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .wrap_err_with(|| format!("Failed to request cover {}", url))?
            .error_for_status()
            .wrap_err_with(|| format!("Cover request failed for {}", url))?;

        let mut download = NamedTempFile::new_in(directory)
            .wrap_err("Failed to create temporary cover file")?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.wrap_err("Failed to read cover body")?;
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            download
                .write_all(&chunk)
                .wrap_err("Failed to write temporary cover file")?;
        }

        let format =
            CoverFormat::sniff(&head).ok_or_else(|| eyre!("cannot determine file format"))?;
        let destination = directory.join(format.stored_file_name());

        match format {
            CoverFormat::Jpeg | CoverFormat::Png => {
                download
                    .persist(&destination)
                    .wrap_err_with(|| format!("Failed to store {}", destination.display()))?;
            }
            CoverFormat::Webp => {
                let webp = std::fs::read(download.path())
                    .wrap_err("Failed to read downloaded cover")?;
                let png = transcode_to_png(&webp)?;
                let mut converted = NamedTempFile::new_in(directory)
                    .wrap_err("Failed to create temporary cover file")?;
                converted
                    .write_all(&png)
                    .wrap_err("Failed to write converted cover")?;
                converted
                    .persist(&destination)
                    .wrap_err_with(|| format!("Failed to store {}", destination.display()))?;
            }
        }

        log::info!("Stored cover {}", destination.display());
        Ok(destination)
    }
}

fn parse_cover_url(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).wrap_err_with(|| format!("Invalid cover URI: {}", uri))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Unsupported cover URI scheme: {}", url.scheme());
    }
    Ok(url)
}

/// Decode a WebP image and re-encode it as PNG.
pub fn transcode_to_png(webp: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(webp, ImageFormat::WebP)
        .wrap_err("Failed to decode WebP cover")?;

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .wrap_err("Failed to encode PNG cover")?;
    Ok(png)
}
