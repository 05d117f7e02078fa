//! On-disk cover cache backed by remote image sources

use crate::{CoverError, CoverKind, RetryPolicy};
use echogl_config::CoverSettings;
use futures_util::StreamExt;
use image::ImageFormat;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

/// Subdirectory holding covers that came from the catalog
const CATALOG_DIR: &str = "catalog";

/// Resolves cover images to local files, fetching each at most once
#[derive(Debug, Clone)]
pub struct CoverCache {
    covers_dir: PathBuf,
    settings: CoverSettings,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl CoverCache {
    /// Create a cache rooted at `covers_dir`
    pub fn new(covers_dir: impl Into<PathBuf>, settings: &CoverSettings) -> Result<Self, CoverError> {
        let covers_dir = covers_dir.into();
        std::fs::create_dir_all(covers_dir.join(CATALOG_DIR))?;

        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(format!("EchoGL/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            covers_dir,
            settings: settings.clone(),
            retry: RetryPolicy::from(settings),
            client,
        })
    }

    pub fn covers_dir(&self) -> &Path {
        &self.covers_dir
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Deterministic cache location for a Steam cover
    pub fn cached_path(&self, app_id: u32, kind: CoverKind) -> PathBuf {
        self.covers_dir.join(kind.file_name(app_id))
    }

    /// Deterministic cache location for a catalog cover
    pub fn catalog_path(&self, display_name: &str) -> Option<PathBuf> {
        let stem = sanitize_title(display_name);
        if stem.is_empty() {
            return None;
        }
        Some(
            self.covers_dir
                .join(CATALOG_DIR)
                .join(format!("{stem}.jpg")),
        )
    }

    /// Resolve a Steam cover, downloading it on a cache miss
    pub async fn resolve(&self, app_id: u32, kind: CoverKind) -> Option<PathBuf> {
        let target = self.cached_path(app_id, kind);
        if target.is_file() {
            tracing::debug!("Cover cache hit: {}", target.display());
            return Some(target);
        }

        match self.download_cover(app_id, kind, &target).await {
            Ok(()) => {
                tracing::debug!("Cached {} cover for {} at {}", kind, app_id, target.display());
                Some(target)
            }
            Err(e) => {
                tracing::warn!("No {} cover for app {}: {}", kind, app_id, e);
                None
            }
        }
    }

    /// Download a catalog-supplied cover under a name derived from the title.
    ///
    /// Titles that sanitize to the same string share one file; the last
    /// download wins.
    pub async fn resolve_catalog_cover(&self, remote_url: &str, display_name: &str) -> Option<PathBuf> {
        let Some(target) = self.catalog_path(display_name) else {
            tracing::warn!("Cannot derive a cover filename from {:?}", display_name);
            return None;
        };
        let url = normalize_remote_url(remote_url);

        let label = format!("catalog cover {}", url);
        let result = self
            .retry
            .run(&label, || self.stream_to_file(&url, &target))
            .await;

        match result {
            Ok(()) => {
                tracing::debug!("Cached catalog cover for {:?} at {}", display_name, target.display());
                Some(target)
            }
            Err(e) => {
                tracing::warn!("Catalog cover download failed for {:?}: {}", display_name, e);
                None
            }
        }
    }

    async fn download_cover(&self, app_id: u32, kind: CoverKind, target: &Path) -> Result<(), CoverError> {
        let candidates = kind.candidate_urls(app_id, &self.settings);
        let label = format!("{} cover for {}", kind, app_id);

        let bytes = self
            .retry
            .run(&label, || self.fetch_first(&candidates))
            .await?;

        let resize = kind.resize_to(&self.settings);
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || store_image(&bytes, resize, &target))
            .await
            .map_err(|e| CoverError::Task(e.to_string()))?
    }

    /// One sweep over the candidates; the first success wins
    async fn fetch_first(&self, candidates: &[String]) -> Result<Vec<u8>, CoverError> {
        let mut last_error = CoverError::NoCandidates;

        for url in candidates {
            match self.fetch_bytes(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    tracing::debug!("Candidate {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CoverError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(CoverError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }

    async fn stream_to_file(&self, url: &str, target: &Path) -> Result<(), CoverError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(CoverError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let (file, temp_path) = temp_sibling(target)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        write_body(&mut file, response).await?;

        drop(file);
        persist(temp_path, target)
    }
}

async fn write_body(file: &mut tokio::fs::File, response: reqwest::Response) -> Result<(), CoverError> {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.sync_all().await?;
    Ok(())
}

/// Lower-case a title and keep only alphanumeric characters
pub fn sanitize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Catalog image URLs are usually protocol-relative
pub fn normalize_remote_url(url: &str) -> String {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

/// Uniquely named temporary file next to `target`, removed unless persisted
fn temp_sibling(target: &Path) -> Result<NamedTempFile, CoverError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".partial")
        .tempfile_in(dir)?;
    Ok(temp)
}

/// Move a finished download into place.
///
/// Concurrent fetches of one cover race to the same target; losing that
/// race still leaves a complete file behind.
fn persist(temp: TempPath, target: &Path) -> Result<(), CoverError> {
    match temp.persist(target) {
        Ok(()) => Ok(()),
        Err(_) if target.is_file() => {
            tracing::debug!("{} was written by a concurrent fetch", target.display());
            Ok(())
        }
        Err(e) => Err(CoverError::Io(e.error)),
    }
}

/// Decode, optionally resize, and atomically write a JPEG
fn store_image(bytes: &[u8], resize: Option<(u32, u32)>, target: &Path) -> Result<(), CoverError> {
    let mut image = image::load_from_memory(bytes)?;

    if let Some((width, height)) = resize {
        image = image.resize_exact(width, height, FilterType::Lanczos3);
    }

    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());

    let temp = temp_sibling(target)?.into_temp_path();
    rgb.save_with_format(&temp, ImageFormat::Jpeg)
        .map_err(CoverError::Encode)?;
    persist(temp, target)
}
